use std::{future::Future, pin::Pin, sync::Arc};

use shared::{
    domain::OrderMessageId,
    error::TriggerError,
    mail::{MailMessage, MailSource},
};
use tracing::{debug, error, info, warn};

use crate::alarm::{AlarmController, TriggerOutcome};

/// In-flight inbox fetch, detached from the watcher so the caller can keep
/// handling other events while it runs.
pub type PendingFetch =
    Pin<Box<dyn Future<Output = anyhow::Result<Option<MailMessage>>> + Send + 'static>>;

#[derive(Debug)]
pub enum TickOutcome {
    NewOrder {
        id: OrderMessageId,
        trigger: Result<TriggerOutcome, TriggerError>,
    },
    NoMessage,
    NotAnOrder,
    AlreadySeen,
    FetchFailed,
}

/// Remembers the newest order notification seen and raises the alarm once
/// per new one.
pub struct OrderWatcher {
    mail: Arc<dyn MailSource>,
    last_seen: Option<OrderMessageId>,
}

impl OrderWatcher {
    pub fn new(mail: Arc<dyn MailSource>) -> Self {
        Self {
            mail,
            last_seen: None,
        }
    }

    pub fn last_seen(&self) -> Option<&OrderMessageId> {
        self.last_seen.as_ref()
    }

    pub fn fetch(&self) -> PendingFetch {
        let mail = Arc::clone(&self.mail);
        Box::pin(async move { mail.fetch_most_recent().await })
    }

    /// Classifies a finished fetch and triggers the alarm for a new order.
    pub fn handle(
        &mut self,
        fetched: anyhow::Result<Option<MailMessage>>,
        alarm: &mut AlarmController,
    ) -> TickOutcome {
        let message = match fetched {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("inbox is empty");
                return TickOutcome::NoMessage;
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "failed to fetch most recent message, skipping tick");
                return TickOutcome::FetchFailed;
            }
        };

        let id = match self.classify(&message) {
            Ok(id) => id,
            Err(outcome) => {
                debug!(?outcome, id = ?message.id, "no new order");
                return outcome;
            }
        };

        info!(%id, "new order received");
        self.last_seen = Some(id.clone());

        let trigger = alarm.trigger();
        match &trigger {
            Ok(outcome) => debug!(?outcome, "alarm trigger handled"),
            Err(error) => error!(%error, "failed to trigger alarm"),
        }
        TickOutcome::NewOrder { id, trigger }
    }

    fn classify(&self, message: &MailMessage) -> Result<OrderMessageId, TickOutcome> {
        if !message.is_order_assignment() {
            return Err(TickOutcome::NotAnOrder);
        }
        let id = match message.id.as_deref() {
            Some(id) if !id.is_empty() => OrderMessageId(id.to_string()),
            _ => return Err(TickOutcome::NotAnOrder),
        };
        if self.last_seen.as_ref() == Some(&id) {
            return Err(TickOutcome::AlreadySeen);
        }
        Ok(id)
    }
}

#[cfg(test)]
#[path = "tests/watcher_tests.rs"]
mod tests;

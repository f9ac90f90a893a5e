use std::{sync::Arc, time::Duration};

use alarm_core::{AlarmController, ButtonPress, Clock, OrderWatcher};
use gpio_integration::Hardware;
use shared::{error::ConfigError, mail::MailSource};
use storage::ConfigStore;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Everything the event loop mutates, built once at startup.
pub(crate) struct AppState {
    pub(crate) store: ConfigStore,
    pub(crate) watcher: OrderWatcher,
    pub(crate) alarm: AlarmController,
    pub(crate) presses: mpsc::UnboundedReceiver<ButtonPress>,
    pub(crate) order_check_period: Duration,
}

impl AppState {
    pub(crate) fn new(
        store: ConfigStore,
        mail: Arc<dyn MailSource>,
        hardware: Arc<dyn Hardware>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let initial = store.load()?;
        let (alarm, presses) =
            AlarmController::new(hardware, Arc::new(store.clone()), clock, &initial);

        Ok(Self {
            store,
            watcher: OrderWatcher::new(mail),
            alarm,
            presses,
            order_check_period: initial.order_check_period(),
        })
    }

    /// Re-reads the configuration after an edit. Returns the new polling
    /// period when it changed.
    pub(crate) fn reload(&mut self) -> Option<Duration> {
        let config = match self.store.load() {
            Ok(config) => config,
            Err(error) if error.is_fatal() => {
                error!(%error, "configuration reload failed, keeping previous polling interval");
                return None;
            }
            Err(error) => {
                warn!(%error, "configuration reload rejected, keeping previous polling interval");
                return None;
            }
        };

        let period = config.order_check_period();
        if period == self.order_check_period {
            info!("configuration reloaded");
            return None;
        }

        info!(
            minutes = config.order_check_interval,
            "order check interval changed, restarting poller"
        );
        self.order_check_period = period;
        Some(period)
    }
}

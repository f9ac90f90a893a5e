use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Snippet prefix Gmail shows for order assignment notifications.
pub const ORDER_ASSIGNED_MARKER: &str = "Order Assigned";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub id: Option<String>,
    pub snippet: Option<String>,
}

impl MailMessage {
    pub fn new(id: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            snippet: Some(snippet.into()),
        }
    }

    pub fn is_order_assignment(&self) -> bool {
        self.snippet
            .as_deref()
            .is_some_and(|snippet| snippet.starts_with(ORDER_ASSIGNED_MARKER))
    }
}

#[async_trait]
pub trait MailSource: Send + Sync {
    /// Newest message in the inbox, or `None` when the inbox is empty.
    async fn fetch_most_recent(&self) -> anyhow::Result<Option<MailMessage>>;
}

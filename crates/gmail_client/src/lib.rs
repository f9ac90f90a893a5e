use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use shared::mail::{MailMessage, MailSource};
use tracing::{debug, warn};

mod oauth;

pub use oauth::{authorize, prompt_for_code, Authenticator, GMAIL_READONLY_SCOPE};

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageDetail {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

pub struct GmailClient {
    http: Client,
    api_base: String,
    auth: Authenticator,
}

impl GmailClient {
    pub fn new(http: Client, api_base: impl Into<String>, auth: Authenticator) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub async fn most_recent_message(&self) -> Result<Option<MailMessage>> {
        let list: MessageList = self
            .get_json(
                &format!("{}/gmail/v1/users/me/messages", self.api_base),
                &[("maxResults", "1")],
            )
            .await
            .context("failed to list messages")?;

        let Some(latest) = list.messages.into_iter().next() else {
            return Ok(None);
        };

        let detail: MessageDetail = self
            .get_json(
                &format!("{}/gmail/v1/users/me/messages/{}", self.api_base, latest.id),
                &[("format", "metadata")],
            )
            .await
            .with_context(|| format!("failed to fetch message {}", latest.id))?;
        debug!(id = ?detail.id, "fetched most recent message");

        Ok(Some(MailMessage {
            id: detail.id.or(Some(latest.id)),
            snippet: detail.snippet,
        }))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let token = self.auth.access_token().await?;
        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&token)
            .send()
            .await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            warn!("access token rejected, refreshing");
            let token = self.auth.refresh().await?;
            self.http
                .get(url)
                .query(query)
                .bearer_auth(&token.access_token)
                .send()
                .await?
        } else {
            response
        };

        Ok(response.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl MailSource for GmailClient {
    async fn fetch_most_recent(&self) -> Result<Option<MailMessage>> {
        self.most_recent_message().await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

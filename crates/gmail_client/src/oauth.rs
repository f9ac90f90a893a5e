use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use storage::{InstalledCredentials, StoredToken, TokenCache};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::Mutex,
};
use tracing::info;
use url::Url;

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_stored(self, previous_refresh_token: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
            scope: self.scope,
            expires_at: self
                .expires_in
                .map(|seconds| Utc::now() + Duration::seconds(seconds)),
        }
    }
}

/// OAuth2 installed-application flow backed by an on-disk token cache.
pub struct Authenticator {
    http: Client,
    credentials: InstalledCredentials,
    cache: TokenCache,
    token: Mutex<Option<StoredToken>>,
}

impl Authenticator {
    pub fn new(http: Client, credentials: InstalledCredentials, cache: TokenCache) -> Result<Self> {
        let token = cache.load()?;
        Ok(Self {
            http,
            credentials,
            cache,
            token: Mutex::new(token),
        })
    }

    pub async fn has_token(&self) -> bool {
        self.token.lock().await.is_some()
    }

    pub fn authorization_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.credentials.auth_uri)
            .with_context(|| format!("invalid auth_uri '{}'", self.credentials.auth_uri))?;
        url.query_pairs_mut()
            .append_pair("access_type", "offline")
            .append_pair("scope", GMAIL_READONLY_SCOPE)
            .append_pair("response_type", "code")
            .append_pair("client_id", self.credentials.client_id.as_str())
            .append_pair("redirect_uri", self.credentials.redirect_uri()?);
        Ok(url)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<StoredToken> {
        let redirect_uri = self.credentials.redirect_uri()?;
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code.trim()),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
            ])
            .await
            .context("failed to exchange authorization code")?;

        let token = response.into_stored(None);
        self.store(token.clone()).await?;
        info!(path = %self.cache.path().display(), "authorization stored");
        Ok(token)
    }

    /// Current access token, refreshed first when it has expired.
    pub async fn access_token(&self) -> Result<String> {
        let current = self.token.lock().await.clone();
        match current {
            Some(token) if !token.is_expired(Utc::now()) => Ok(token.access_token),
            Some(_) => Ok(self.refresh().await?.access_token),
            None => Err(anyhow!(
                "no OAuth token cached at '{}'; run authorization first",
                self.cache.path().display()
            )),
        }
    }

    pub async fn refresh(&self) -> Result<StoredToken> {
        let refresh_token = self
            .token
            .lock()
            .await
            .as_ref()
            .and_then(|token| token.refresh_token.clone())
            .ok_or_else(|| anyhow!("cached OAuth token has no refresh token"))?;

        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .await
            .context("failed to refresh OAuth token")?;

        let token = response.into_stored(Some(refresh_token));
        self.store(token.clone()).await?;
        info!("OAuth access token refreshed");
        Ok(token)
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.credentials.token_uri)
            .form(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn store(&self, token: StoredToken) -> Result<()> {
        *self.token.lock().await = Some(token.clone());
        self.cache.save(&token)
    }
}

/// Prints the consent URL and reads the authorization code from stdin.
pub async fn prompt_for_code(url: &Url) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(
            format!(
                "Authorize this app by visiting this url: {url}\nEnter the code from that page here: "
            )
            .as_bytes(),
        )
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read authorization code")?;

    let code = line.trim().to_string();
    if code.is_empty() {
        return Err(anyhow!("no authorization code entered"));
    }
    Ok(code)
}

/// Loads the cached token, running the interactive consent flow when there
/// is none.
pub async fn authorize(
    http: Client,
    credentials: InstalledCredentials,
    cache: TokenCache,
) -> Result<Authenticator> {
    let authenticator = Authenticator::new(http, credentials, cache)?;
    if !authenticator.has_token().await {
        let url = authenticator.authorization_url()?;
        let code = prompt_for_code(&url).await?;
        authenticator.exchange_code(&code).await?;
    }
    Ok(authenticator)
}

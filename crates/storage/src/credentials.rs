use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// OAuth client registered as a Google "installed application".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledCredentials {
    pub client_id: String,
    #[serde(default)]
    pub project_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    #[serde(default)]
    pub auth_provider_x509_cert_url: String,
    pub client_secret: String,
    pub redirect_uris: Vec<String>,
}

impl InstalledCredentials {
    pub fn redirect_uri(&self) -> Result<&str> {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .ok_or_else(|| anyhow!("credentials contain no redirect_uris"))
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: InstalledCredentials,
}

pub fn load_credentials(path: &Path) -> Result<InstalledCredentials> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read credentials file '{}'", path.display()))?;
    let file: CredentialsFile = serde_json::from_str(&raw)
        .with_context(|| format!("malformed credentials file '{}'", path.display()))?;
    Ok(file.installed)
}

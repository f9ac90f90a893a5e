use std::path::PathBuf;

use gmail_client::GMAIL_API_BASE;
use storage::{CONFIG_FILE, DEFAULT_CONFIG_FILE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_path: PathBuf,
    pub default_config_path: PathBuf,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub gmail_api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: CONFIG_FILE.into(),
            default_config_path: DEFAULT_CONFIG_FILE.into(),
            credentials_path: "credentials.json".into(),
            token_path: "token.json".into(),
            gmail_api_base: GMAIL_API_BASE.into(),
        }
    }
}

pub fn load_settings() -> Settings {
    settings_from(|key| std::env::var(key).ok())
}

fn settings_from(lookup: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(v) = lookup("ORDER_ALARM_CONFIG").filter(|v| !v.trim().is_empty()) {
        settings.config_path = v.into();
    }
    if let Some(v) = lookup("ORDER_ALARM_CREDENTIALS").filter(|v| !v.trim().is_empty()) {
        settings.credentials_path = v.into();
    }
    if let Some(v) = lookup("ORDER_ALARM_TOKEN").filter(|v| !v.trim().is_empty()) {
        settings.token_path = v.into();
    }
    if let Some(v) = lookup("GMAIL_API_BASE").filter(|v| !v.trim().is_empty()) {
        settings.gmail_api_base = v;
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

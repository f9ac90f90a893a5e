use std::path::PathBuf;

use chrono::Weekday;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HoursError {
    #[error("hours of operation for {day} are malformed ({range:?}): {reason}")]
    ConfigMalformed {
        day: Weekday,
        range: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access configuration file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("configuration still invalid after regenerating defaults: {0}")]
    Unrecoverable(String),
}

impl ConfigError {
    /// The configuration file itself cannot be produced. `Parse` and
    /// `Invalid` from a load mean a rejected override; the file is intact.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unrecoverable(_) | Self::Io { .. })
    }
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Hours(#[from] HoursError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to arm dismiss button: {0}")]
    Hardware(String),
}

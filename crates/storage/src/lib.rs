use std::{
    fs,
    path::{Path, PathBuf},
};

use config::{Config, Environment, File, FileFormat};
use shared::{
    domain::{ConfigSource, Configuration},
    error::ConfigError,
};
use tracing::{info, warn};

mod credentials;
mod token_cache;

pub use credentials::{load_credentials, InstalledCredentials};
pub use token_cache::{StoredToken, TokenCache};

pub const CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_CONFIG_FILE: &str = "default-config.yml";
pub const CONFIG_ENV_PREFIX: &str = "ORDER_ALARM";

/// Used when no `default-config.yml` sits next to the configuration file.
pub const BUILTIN_DEFAULT_CONFIG: &str = include_str!("../default-config.yml");

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    default_path: PathBuf,
    env_prefix: Option<String>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, default_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_path: default_path.into(),
            env_prefix: None,
        }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(CONFIG_FILE), dir.join(DEFAULT_CONFIG_FILE))
    }

    pub fn with_env_overrides(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the configuration file, creating or regenerating it from the
    /// default template at most once. Environment overrides are applied on
    /// top of a valid file; a bad override is reported without touching the
    /// file.
    pub fn load(&self) -> Result<Configuration, ConfigError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no configuration file found, creating one");
            self.regenerate()?;
        }

        let from_file = match self.parse(None) {
            Ok(configuration) => configuration,
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    %error,
                    "malformed configuration file found, creating a new copy"
                );
                self.regenerate()?;
                self.parse(None)
                    .map_err(|error| ConfigError::Unrecoverable(error.to_string()))?
            }
        };

        match &self.env_prefix {
            Some(prefix) => self.parse(Some(prefix.as_str())).inspect_err(|error| {
                warn!(%prefix, %error, "environment override rejected");
            }),
            None => Ok(from_file),
        }
    }

    fn parse(&self, env_prefix: Option<&str>) -> Result<Configuration, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::from(self.path.as_path()).format(FileFormat::Yaml));

        if let Some(prefix) = env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let configuration = builder
            .build()
            .and_then(|config| config.try_deserialize::<Configuration>())
            .map_err(|error| ConfigError::Parse(error.to_string()))?;
        configuration.validate()?;
        Ok(configuration)
    }

    fn regenerate(&self) -> Result<(), ConfigError> {
        let template = match fs::read_to_string(&self.default_path) {
            Ok(raw) => raw,
            Err(_) => BUILTIN_DEFAULT_CONFIG.to_string(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(&self.path, template).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl ConfigSource for ConfigStore {
    fn load(&self) -> Result<Configuration, ConfigError> {
        ConfigStore::load(self)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const CONFIG_DEBOUNCE: Duration = Duration::from_millis(250);

/// Debounced notifications that the configuration file changed on disk.
///
/// The parent directory is watched rather than the file itself so editors
/// that replace the file on save keep being noticed. Dropping the handle
/// stops the watch.
pub struct ConfigWatch {
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ConfigWatch {
    pub fn start(
        path: &Path,
        debounce: Duration,
    ) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<()>)> {
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| anyhow!("config path '{}' has no file name", path.display()))?;
        let dir = watch_dir(path);

        let (tx, changes) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    if events.iter().any(|event| touches(event, &file_name)) {
                        let _ = tx.send(());
                    }
                }
                Err(error) => warn!(%error, "config watcher error"),
            }
        })
        .context("failed to create config watcher")?;

        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch '{}'", dir.display()))?;
        debug!(dir = %dir.display(), "watching configuration directory");

        Ok((
            Self {
                _debouncer: debouncer,
            },
            changes,
        ))
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn touches(event: &DebouncedEvent, file_name: &OsString) -> bool {
    event.path.file_name() == Some(file_name.as_os_str())
}

#[cfg(test)]
#[path = "tests/config_watch_tests.rs"]
mod tests;

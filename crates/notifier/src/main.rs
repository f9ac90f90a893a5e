use std::{future::Future, sync::Arc, time::Duration};

use alarm_core::{PendingFetch, SystemClock};
use anyhow::Context;
use gmail_client::GmailClient;
use shared::mail::MailMessage;
use storage::{load_credentials, ConfigStore, TokenCache, CONFIG_ENV_PREFIX};
use tokio::{
    signal,
    sync::mpsc,
    time::{self, Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod config_watch;

use app_state::AppState;
use config::load_settings;
use config_watch::{ConfigWatch, CONFIG_DEBOUNCE};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let store = ConfigStore::new(&settings.config_path, &settings.default_config_path)
        .with_env_overrides(CONFIG_ENV_PREFIX);

    let credentials = load_credentials(&settings.credentials_path).map_err(|error| {
        error!(
            path = %settings.credentials_path.display(),
            error = %format!("{error:#}"),
            "failed to read OAuth client credentials"
        );
        error
    })?;
    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let auth = gmail_client::authorize(
        http.clone(),
        credentials,
        TokenCache::new(&settings.token_path),
    )
    .await
    .context("Gmail authorization failed")?;
    let mail = Arc::new(GmailClient::new(http, settings.gmail_api_base, auth));

    let hardware = gpio_integration::probe();
    let state = AppState::new(store, mail, hardware, Arc::new(SystemClock))
        .context("failed to load configuration")?;

    let (_watch, config_changes) = match ConfigWatch::start(&settings.config_path, CONFIG_DEBOUNCE)
    {
        Ok((watch, changes)) => (Some(watch), changes),
        Err(error) => {
            warn!(error = %format!("{error:#}"), "config hot reload disabled");
            (None, mpsc::unbounded_channel().1)
        }
    };

    info!(
        config = %settings.config_path.display(),
        minutes = state.order_check_period.as_secs() / 60,
        "order alarm started"
    );
    run(state, config_changes, shutdown_signal()).await;
    info!("order alarm stopped");
    Ok(())
}

/// Polls for orders, dismisses on button presses and reloads edited
/// configuration until `shutdown` completes. A fetch runs alongside the
/// other events; ticks that fire while one is in flight are skipped.
/// Hardware is released before returning.
async fn run(
    mut state: AppState,
    mut config_changes: mpsc::UnboundedReceiver<()>,
    shutdown: impl Future<Output = ()>,
) -> AppState {
    tokio::pin!(shutdown);
    let mut poll = order_ticker(state.order_check_period);
    let mut in_flight: Option<PendingFetch> = None;

    loop {
        tokio::select! {
            _ = poll.tick() => {
                if in_flight.is_some() {
                    debug!("previous order check still running, skipping tick");
                } else {
                    in_flight = Some(state.watcher.fetch());
                }
            }
            fetched = finish(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                let outcome = state.watcher.handle(fetched, &mut state.alarm);
                debug!(?outcome, "order check finished");
            }
            Some(press) = state.presses.recv() => {
                info!(pin = %press.pin, "dismiss button pressed");
                state.alarm.dismiss();
            }
            Some(()) = config_changes.recv() => {
                if let Some(period) = state.reload() {
                    poll = order_ticker(period);
                }
            }
            _ = &mut shutdown => break,
        }
    }

    state.alarm.shutdown();
    state
}

async fn finish(in_flight: &mut Option<PendingFetch>) -> anyhow::Result<Option<MailMessage>> {
    match in_flight {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

fn order_ticker(period: Duration) -> Interval {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = signal::ctrl_c().await {
            error!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("interrupt received, shutting down"),
        _ = terminate => info!("terminate received, shutting down"),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

use std::path::{Path, PathBuf};

use alarm_core::{operating_window, Clock, SystemClock};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use gmail_client::{Authenticator, GmailClient, GMAIL_API_BASE};
use gpio_integration::Hardware;
use shared::domain::Configuration;
use storage::{
    load_credentials, ConfigStore, TokenCache, CONFIG_ENV_PREFIX, DEFAULT_CONFIG_FILE,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,
    #[arg(long, default_value = "credentials.json")]
    credentials: PathBuf,
    #[arg(long, default_value = "token.json")]
    token: PathBuf,
    #[arg(long, default_value = GMAIL_API_BASE)]
    api_base: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the OAuth consent flow and writes the token cache.
    Authorize,
    CheckHours {
        /// Local time as YYYY-MM-DDTHH:MM; defaults to now.
        #[arg(long, value_parser = parse_local_time)]
        at: Option<NaiveDateTime>,
    },
    LatestMessage,
    /// Pulses the relay with the configured timings, ignoring store hours.
    TestAlarm {
        #[arg(long, default_value_t = 3)]
        cycles: u32,
    },
}

fn parse_local_time(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map_err(|error| format!("expected YYYY-MM-DDTHH:MM: {error}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Authorize => {
            let credentials = load_credentials(&cli.credentials)?;
            let cache = TokenCache::new(&cli.token);
            let auth = Authenticator::new(reqwest::Client::new(), credentials, cache.clone())?;
            let url = auth.authorization_url()?;
            let code = gmail_client::prompt_for_code(&url).await?;
            auth.exchange_code(&code).await?;
            println!("token stored in {}", cache.path().display());
        }
        Command::CheckHours { at } => {
            let config = load_config(&cli.config)?;
            let now = at.unwrap_or_else(|| SystemClock.now());
            let window = operating_window(now, &config)?;
            println!(
                "{now}: open {} to {}, alarm {}",
                window.start.time(),
                window.end.time(),
                if window.contains(now) {
                    "permitted"
                } else {
                    "suppressed"
                }
            );
        }
        Command::LatestMessage => {
            let credentials = load_credentials(&cli.credentials)?;
            let http = reqwest::Client::new();
            let auth = Authenticator::new(http.clone(), credentials, TokenCache::new(&cli.token))?;
            let client = GmailClient::new(http, cli.api_base, auth);
            match client.most_recent_message().await? {
                Some(message) => println!(
                    "id={} order={} snippet={:?}",
                    message.id.as_deref().unwrap_or("-"),
                    message.is_order_assignment(),
                    message.snippet.as_deref().unwrap_or_default()
                ),
                None => println!("inbox is empty"),
            }
        }
        Command::TestAlarm { cycles } => {
            let config = load_config(&cli.config)?;
            let hardware = gpio_integration::probe();
            let result = pulse(hardware.as_ref(), &config, cycles).await;
            hardware
                .release(config.alarm_relay_pin)
                .context("failed to release relay pin")?;
            result?;
            println!(
                "pulsed {} {cycles} times (hardware driven: {})",
                config.alarm_relay_pin,
                hardware.is_supported()
            );
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Configuration> {
    let default_path = path
        .parent()
        .map(|dir| dir.join(DEFAULT_CONFIG_FILE))
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());
    ConfigStore::new(path, default_path)
        .with_env_overrides(CONFIG_ENV_PREFIX)
        .load()
        .with_context(|| format!("failed to load '{}'", path.display()))
}

async fn pulse(hardware: &dyn Hardware, config: &Configuration, cycles: u32) -> Result<()> {
    for cycle in 0..cycles {
        if cycle > 0 {
            tokio::time::sleep(config.relay_off_duration()).await;
        }
        hardware.set_output(config.alarm_relay_pin, true)?;
        tokio::time::sleep(config.relay_on_duration()).await;
        hardware.set_output(config.alarm_relay_pin, false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_hours_accepts_local_timestamp() {
        let cli = Cli::try_parse_from(["tools", "check-hours", "--at", "2024-01-06T15:30"])
            .expect("parse");

        let Command::CheckHours { at: Some(at) } = cli.command else {
            panic!("expected check-hours with a timestamp");
        };
        assert_eq!(at.to_string(), "2024-01-06 15:30:00");
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        assert!(Cli::try_parse_from(["tools", "check-hours", "--at", "6pm"]).is_err());
    }

    #[test]
    fn test_alarm_defaults_to_three_cycles() {
        let cli = Cli::try_parse_from(["tools", "test-alarm"]).expect("parse");

        assert!(matches!(cli.command, Command::TestAlarm { cycles: 3 }));
        assert_eq!(cli.config, PathBuf::from("config.yml"));
    }

    #[test]
    fn config_sees_the_same_overrides_as_the_daemon() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yml");
        std::fs::write(&path, storage::BUILTIN_DEFAULT_CONFIG).expect("write config");
        std::env::set_var("ORDER_ALARM__ALARM_ON_DURATION", "321");

        let result = load_config(&path);
        std::env::remove_var("ORDER_ALARM__ALARM_ON_DURATION");

        let config = result.expect("load");
        assert_eq!(config.alarm_on_duration, 321);
        assert_eq!(config.alarm_interval, 1000);
    }
}

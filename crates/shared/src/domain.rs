use std::time::Duration;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

macro_rules! id_newtype {
    ($name:ident, $inner:ty) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);
    };
}

id_newtype!(OrderMessageId, String);
id_newtype!(PinNumber, u8);

impl Copy for PinNumber {}

impl std::fmt::Display for OrderMessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for PinNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Opening ranges keyed by weekday, e.g. `"9:00am-5:00pm"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursOfOperation {
    pub monday: String,
    pub tuesday: String,
    pub wednesday: String,
    pub thursday: String,
    pub friday: String,
    pub saturday: String,
    pub sunday: String,
}

impl HoursOfOperation {
    pub fn range_for(&self, day: Weekday) -> &str {
        match day {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Minutes between inbox polls.
    pub order_check_interval: u64,
    /// Milliseconds the relay stays off between pulses.
    pub alarm_interval: u64,
    /// Milliseconds the relay stays on per pulse.
    pub alarm_on_duration: u64,
    pub button_pin: PinNumber,
    pub alarm_relay_pin: PinNumber,
    pub hours_of_operation: HoursOfOperation,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.order_check_interval < 1 {
            return Err(ConfigError::Invalid(
                "order_check_interval must be at least 1 minute".into(),
            ));
        }
        if self.alarm_interval < 1 {
            return Err(ConfigError::Invalid(
                "alarm_interval must be at least 1 ms".into(),
            ));
        }
        if self.alarm_on_duration < 1 {
            return Err(ConfigError::Invalid(
                "alarm_on_duration must be at least 1 ms".into(),
            ));
        }
        Ok(())
    }

    pub fn order_check_period(&self) -> Duration {
        Duration::from_secs(self.order_check_interval.max(1).saturating_mul(60))
    }

    pub fn relay_on_duration(&self) -> Duration {
        Duration::from_millis(self.alarm_on_duration)
    }

    pub fn relay_off_duration(&self) -> Duration {
        Duration::from_millis(self.alarm_interval)
    }

    pub fn duty_cycle_period(&self) -> Duration {
        self.relay_on_duration() + self.relay_off_duration()
    }
}

/// Anything that can produce a fresh, validated [`Configuration`].
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<Configuration, ConfigError>;
}

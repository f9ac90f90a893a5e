use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use gpio_integration::{Hardware, InputCallback, Subscription};
use shared::{
    domain::{ConfigSource, Configuration, HoursOfOperation, PinNumber},
    error::ConfigError,
    mail::{MailMessage, MailSource},
};
use tokio::time::Instant;

pub(crate) const RELAY: PinNumber = PinNumber(27);
pub(crate) const BUTTON: PinNumber = PinNumber(17);

pub(crate) fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .expect("valid test timestamp")
}

pub(crate) fn configuration_with_hours(range: &str) -> Configuration {
    Configuration {
        order_check_interval: 1,
        alarm_interval: 1500,
        alarm_on_duration: 500,
        button_pin: BUTTON,
        alarm_relay_pin: RELAY,
        hours_of_operation: HoursOfOperation {
            monday: range.into(),
            tuesday: range.into(),
            wednesday: range.into(),
            thursday: range.into(),
            friday: range.into(),
            saturday: range.into(),
            sunday: range.into(),
        },
    }
}

pub(crate) fn store_hours() -> Configuration {
    configuration_with_hours("9:00am-5:00pm")
}

/// Config provider whose next answer can be swapped mid-test.
pub(crate) struct StaticConfig {
    current: Mutex<Configuration>,
    loads: Mutex<usize>,
}

impl StaticConfig {
    pub(crate) fn new(config: Configuration) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(config),
            loads: Mutex::new(0),
        })
    }

    pub(crate) fn replace(&self, config: Configuration) {
        *self.current.lock().expect("config lock") = config;
    }

    pub(crate) fn loads(&self) -> usize {
        *self.loads.lock().expect("loads lock")
    }
}

impl ConfigSource for StaticConfig {
    fn load(&self) -> Result<Configuration, ConfigError> {
        *self.loads.lock().expect("loads lock") += 1;
        Ok(self.current.lock().expect("config lock").clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutputEvent {
    pub(crate) at: Instant,
    pub(crate) pin: PinNumber,
    pub(crate) high: bool,
}

/// Records every pin write against the (possibly paused) tokio clock.
#[derive(Default)]
pub(crate) struct FakeHardware {
    outputs: Mutex<Vec<OutputEvent>>,
    released: Mutex<Vec<PinNumber>>,
    listeners: Arc<Mutex<Vec<(PinNumber, InputCallback)>>>,
    refuse_inputs: bool,
}

impl FakeHardware {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn refusing_inputs() -> Arc<Self> {
        Arc::new(Self {
            refuse_inputs: true,
            ..Self::default()
        })
    }

    pub(crate) fn outputs(&self) -> Vec<OutputEvent> {
        self.outputs.lock().expect("outputs lock").clone()
    }

    pub(crate) fn assertions(&self) -> usize {
        self.outputs().iter().filter(|event| event.high).count()
    }

    pub(crate) fn released(&self) -> Vec<PinNumber> {
        self.released.lock().expect("released lock").clone()
    }

    pub(crate) fn armed_listeners(&self) -> usize {
        self.listeners.lock().expect("listeners lock").len()
    }

    pub(crate) fn press(&self, pin: PinNumber) -> bool {
        let mut listeners = self.listeners.lock().expect("listeners lock");
        match listeners.iter_mut().find(|(armed, _)| *armed == pin) {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl Hardware for FakeHardware {
    fn is_supported(&self) -> bool {
        true
    }

    fn set_output(&self, pin: PinNumber, high: bool) -> anyhow::Result<()> {
        self.outputs.lock().expect("outputs lock").push(OutputEvent {
            at: Instant::now(),
            pin,
            high,
        });
        Ok(())
    }

    fn on_input(&self, pin: PinNumber, callback: InputCallback) -> anyhow::Result<Subscription> {
        if self.refuse_inputs {
            return Err(anyhow!("{pin} is busy"));
        }
        self.listeners
            .lock()
            .expect("listeners lock")
            .push((pin, callback));
        let registry = Arc::clone(&self.listeners);
        Ok(Subscription::new(pin, move || {
            registry
                .lock()
                .expect("listeners lock")
                .retain(|(armed, _)| *armed != pin);
        }))
    }

    fn release(&self, pin: PinNumber) -> anyhow::Result<()> {
        self.released.lock().expect("released lock").push(pin);
        Ok(())
    }
}

/// Mail source that replays a scripted sequence of fetch results, repeating
/// the last one once the script runs out.
pub(crate) struct ScriptedMail {
    script: Mutex<VecDeque<Result<Option<MailMessage>, String>>>,
    last: Mutex<Result<Option<MailMessage>, String>>,
    fetches: Mutex<usize>,
}

impl ScriptedMail {
    pub(crate) fn new(
        script: impl IntoIterator<Item = Result<Option<MailMessage>, String>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(Ok(None)),
            fetches: Mutex::new(0),
        })
    }

    pub(crate) fn fetches(&self) -> usize {
        *self.fetches.lock().expect("fetches lock")
    }
}

#[async_trait]
impl MailSource for ScriptedMail {
    async fn fetch_most_recent(&self) -> anyhow::Result<Option<MailMessage>> {
        *self.fetches.lock().expect("fetches lock") += 1;
        let next = self.script.lock().expect("script lock").pop_front();
        let result = match next {
            Some(result) => {
                *self.last.lock().expect("last lock") = result.clone();
                result
            }
            None => self.last.lock().expect("last lock").clone(),
        };
        result.map_err(|error| anyhow!(error))
    }
}

pub(crate) fn order(id: &str) -> Result<Option<MailMessage>, String> {
    Ok(Some(MailMessage::new(id, format!("Order Assigned: {id}"))))
}

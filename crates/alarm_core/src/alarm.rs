use std::{sync::Arc, time::Duration};

use gpio_integration::{Hardware, Subscription};
use shared::{
    domain::{ConfigSource, Configuration, PinNumber},
    error::TriggerError,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{clock::Clock, hours::is_within_operating_hours};

const MIN_CYCLE_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    Sounding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    /// Outside operating hours; the alarm stayed idle.
    Suppressed,
    /// Already sounding; nothing changed.
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissOutcome {
    Dismissed,
    NotSounding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub pin: PinNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AlarmPins {
    relay: PinNumber,
    button: PinNumber,
}

impl AlarmPins {
    fn of(config: &Configuration) -> Self {
        Self {
            relay: config.alarm_relay_pin,
            button: config.button_pin,
        }
    }
}

struct AlarmSession {
    config: Configuration,
    duty_cycle: JoinHandle<()>,
    button: Subscription,
}

/// Drives the relay duty cycle and listens for the dismiss button.
///
/// Only one session exists at a time. Button presses are forwarded to the
/// receiver returned by [`AlarmController::new`]; the owner calls
/// [`AlarmController::dismiss`] when one arrives.
pub struct AlarmController {
    hardware: Arc<dyn Hardware>,
    config: Arc<dyn ConfigSource>,
    clock: Arc<dyn Clock>,
    presses: mpsc::UnboundedSender<ButtonPress>,
    pins: AlarmPins,
    session: Option<AlarmSession>,
}

impl AlarmController {
    pub fn new(
        hardware: Arc<dyn Hardware>,
        config: Arc<dyn ConfigSource>,
        clock: Arc<dyn Clock>,
        initial: &Configuration,
    ) -> (Self, mpsc::UnboundedReceiver<ButtonPress>) {
        let (presses, press_rx) = mpsc::unbounded_channel();
        let controller = Self {
            hardware,
            config,
            clock,
            presses,
            pins: AlarmPins::of(initial),
            session: None,
        };
        (controller, press_rx)
    }

    pub fn state(&self) -> AlarmState {
        if self.session.is_some() {
            AlarmState::Sounding
        } else {
            AlarmState::Idle
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.session.is_some()
    }

    /// Configuration captured when the current session started.
    pub fn session_config(&self) -> Option<&Configuration> {
        self.session.as_ref().map(|session| &session.config)
    }

    pub fn trigger(&mut self) -> Result<TriggerOutcome, TriggerError> {
        if self.session.is_some() {
            info!("alarm already sounding, ignoring duplicate trigger");
            return Ok(TriggerOutcome::Duplicate);
        }

        let config = self.config.load()?;
        let now = self.clock.now();
        if !is_within_operating_hours(now, &config)? {
            info!(%now, "outside operating hours, alarm suppressed");
            return Ok(TriggerOutcome::Suppressed);
        }

        self.adopt_pins(AlarmPins::of(&config));
        let button = self.arm_button()?;
        let duty_cycle = tokio::spawn(run_duty_cycle(
            Arc::clone(&self.hardware),
            self.pins.relay,
            config.relay_on_duration(),
            config.duty_cycle_period(),
        ));

        info!(
            relay = %self.pins.relay,
            button = %self.pins.button,
            on_ms = config.alarm_on_duration,
            off_ms = config.alarm_interval,
            hardware = self.hardware.is_supported(),
            "alarm sounding"
        );
        self.session = Some(AlarmSession {
            config,
            duty_cycle,
            button,
        });
        Ok(TriggerOutcome::Started)
    }

    pub fn dismiss(&mut self) -> DismissOutcome {
        if !self.stop_session() {
            debug!("dismiss requested while idle");
            return DismissOutcome::NotSounding;
        }
        info!("alarm dismissed");
        DismissOutcome::Dismissed
    }

    /// Stops any session and releases both pins. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.stop_session();
        self.release_pins(self.pins);
        info!("alarm hardware released");
    }

    fn stop_session(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        session.duty_cycle.abort();
        debug!(pin = %session.button.pin(), "dismiss button disarmed");
        session.button.unsubscribe();
        drive(self.hardware.as_ref(), self.pins.relay, false);
        true
    }

    fn adopt_pins(&mut self, pins: AlarmPins) {
        if pins != self.pins {
            info!(relay = %pins.relay, button = %pins.button, "alarm pins changed");
            self.release_pins(self.pins);
            self.pins = pins;
        }
    }

    fn release_pins(&self, pins: AlarmPins) {
        for pin in [pins.relay, pins.button] {
            if let Err(error) = self.hardware.release(pin) {
                warn!(%pin, error = %format!("{error:#}"), "failed to release pin");
            }
        }
    }

    fn arm_button(&self) -> Result<Subscription, TriggerError> {
        let pin = self.pins.button;
        let presses = self.presses.clone();
        self.hardware
            .on_input(
                pin,
                Box::new(move || {
                    let _ = presses.send(ButtonPress { pin });
                }),
            )
            .map_err(|error| TriggerError::Hardware(format!("{error:#}")))
    }
}

async fn run_duty_cycle(
    hardware: Arc<dyn Hardware>,
    relay: PinNumber,
    on_duration: Duration,
    period: Duration,
) {
    let mut ticker = time::interval(period.max(MIN_CYCLE_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        drive(hardware.as_ref(), relay, true);
        time::sleep(on_duration).await;
        drive(hardware.as_ref(), relay, false);
    }
}

fn drive(hardware: &dyn Hardware, pin: PinNumber, high: bool) {
    if let Err(error) = hardware.set_output(pin, high) {
        warn!(%pin, high, error = %format!("{error:#}"), "failed to drive relay");
    }
}

#[cfg(test)]
#[path = "tests/alarm_tests.rs"]
mod tests;

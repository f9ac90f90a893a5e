use std::{
    fmt,
    sync::{Arc, Mutex},
};

use shared::domain::PinNumber;
use tracing::{debug, warn};

#[cfg(target_os = "linux")]
mod gpio;

#[cfg(target_os = "linux")]
pub use gpio::GpioHardware;

pub type InputCallback = Box<dyn FnMut() + Send + 'static>;

/// Digital IO used by the alarm: one relay output and one button input.
pub trait Hardware: Send + Sync {
    /// `false` when pins are not physically driven.
    fn is_supported(&self) -> bool;
    fn set_output(&self, pin: PinNumber, high: bool) -> anyhow::Result<()>;
    fn on_input(&self, pin: PinNumber, callback: InputCallback) -> anyhow::Result<Subscription>;
    fn release(&self, pin: PinNumber) -> anyhow::Result<()>;
}

/// Armed input listener. Disarmed exactly once, by `unsubscribe` or on drop.
pub struct Subscription {
    pin: PinNumber,
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Subscription {
    pub fn new(pin: PinNumber, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            pin,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn pin(&self) -> PinNumber {
        self.pin
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("pin", &self.pin)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Stand-in for hosts without GPIO. Keeps the callbacks so a press can still
/// be simulated with [`NoopHardware::press`].
#[derive(Default)]
pub struct NoopHardware {
    listeners: Arc<Mutex<Vec<(PinNumber, InputCallback)>>>,
}

impl NoopHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the listener armed on `pin`, if any. Returns whether one ran.
    pub fn press(&self, pin: PinNumber) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };
        match listeners.iter_mut().find(|(armed, _)| *armed == pin) {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl Hardware for NoopHardware {
    fn is_supported(&self) -> bool {
        false
    }

    fn set_output(&self, pin: PinNumber, high: bool) -> anyhow::Result<()> {
        debug!(%pin, high, "gpio unavailable, output not driven");
        Ok(())
    }

    fn on_input(&self, pin: PinNumber, callback: InputCallback) -> anyhow::Result<Subscription> {
        debug!(%pin, "gpio unavailable, listener kept in memory only");
        let mut listeners = self
            .listeners
            .lock()
            .map_err(|_| anyhow::anyhow!("listener registry poisoned"))?;
        listeners.retain(|(armed, _)| *armed != pin);
        listeners.push((pin, callback));
        drop(listeners);

        let registry = Arc::clone(&self.listeners);
        Ok(Subscription::new(pin, move || {
            if let Ok(mut listeners) = registry.lock() {
                listeners.retain(|(armed, _)| *armed != pin);
            }
        }))
    }

    fn release(&self, pin: PinNumber) -> anyhow::Result<()> {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|(armed, _)| *armed != pin);
        }
        Ok(())
    }
}

/// Opens the GPIO peripheral when the host has one, otherwise falls back to
/// [`NoopHardware`].
pub fn probe() -> Arc<dyn Hardware> {
    #[cfg(target_os = "linux")]
    {
        match GpioHardware::open() {
            Ok(hardware) => return Arc::new(hardware),
            Err(error) => {
                warn!(%error, "gpio not available on this host, alarm will not drive hardware");
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    warn!("gpio not supported on this platform, alarm will not drive hardware");

    Arc::new(NoopHardware::new())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

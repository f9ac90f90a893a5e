use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use shared::domain::PinNumber;
use tracing::{debug, info, warn};

use crate::{Hardware, InputCallback, Subscription};

const BUTTON_DEBOUNCE: Duration = Duration::from_millis(50);

/// Raspberry Pi GPIO through `/dev/gpiomem`. Pins are claimed lazily and
/// reset to their original mode when released.
pub struct GpioHardware {
    gpio: Gpio,
    outputs: Mutex<HashMap<u8, OutputPin>>,
    inputs: Arc<Mutex<HashMap<u8, InputPin>>>,
}

impl GpioHardware {
    pub fn open() -> Result<Self> {
        let gpio = Gpio::new().context("failed to open gpio peripheral")?;
        info!("gpio peripheral opened");
        Ok(Self {
            gpio,
            outputs: Mutex::new(HashMap::new()),
            inputs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn outputs(&self) -> Result<MutexGuard<'_, HashMap<u8, OutputPin>>> {
        self.outputs
            .lock()
            .map_err(|_| anyhow!("output pin registry poisoned"))
    }
}

impl Hardware for GpioHardware {
    fn is_supported(&self) -> bool {
        true
    }

    fn set_output(&self, pin: PinNumber, high: bool) -> Result<()> {
        let mut outputs = self.outputs()?;
        let output = match outputs.entry(pin.0) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let claimed = self
                    .gpio
                    .get(pin.0)
                    .with_context(|| format!("failed to claim {pin} as output"))?
                    .into_output_low();
                entry.insert(claimed)
            }
        };

        if high {
            output.set_high();
        } else {
            output.set_low();
        }
        Ok(())
    }

    fn on_input(&self, pin: PinNumber, mut callback: InputCallback) -> Result<Subscription> {
        let mut inputs = self
            .inputs
            .lock()
            .map_err(|_| anyhow!("input pin registry poisoned"))?;

        let input = match inputs.entry(pin.0) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let claimed = self
                    .gpio
                    .get(pin.0)
                    .with_context(|| format!("failed to claim {pin} as input"))?
                    .into_input_pullup();
                entry.insert(claimed)
            }
        };

        input
            .set_async_interrupt(Trigger::FallingEdge, Some(BUTTON_DEBOUNCE), move |_event| {
                callback()
            })
            .with_context(|| format!("failed to arm interrupt on {pin}"))?;
        debug!(%pin, "button interrupt armed");

        let registry = Arc::clone(&self.inputs);
        Ok(Subscription::new(pin, move || {
            let Ok(mut inputs) = registry.lock() else {
                return;
            };
            if let Some(input) = inputs.get_mut(&pin.0) {
                if let Err(error) = input.clear_async_interrupt() {
                    warn!(%pin, %error, "failed to clear button interrupt");
                }
            }
        }))
    }

    fn release(&self, pin: PinNumber) -> Result<()> {
        if let Some(mut output) = self.outputs()?.remove(&pin.0) {
            output.set_low();
            debug!(%pin, "output released");
        }

        let removed = self
            .inputs
            .lock()
            .map_err(|_| anyhow!("input pin registry poisoned"))?
            .remove(&pin.0);
        if let Some(mut input) = removed {
            input
                .clear_async_interrupt()
                .with_context(|| format!("failed to clear interrupt on {pin}"))?;
            debug!(%pin, "input released");
        }
        Ok(())
    }
}

pub mod alarm;
pub mod clock;
pub mod hours;
pub mod watcher;

pub use alarm::{AlarmController, AlarmState, ButtonPress, DismissOutcome, TriggerOutcome};
pub use clock::{Clock, FixedClock, SystemClock};
pub use hours::{is_within_operating_hours, operating_window, OperatingWindow};
pub use watcher::{OrderWatcher, PendingFetch, TickOutcome};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

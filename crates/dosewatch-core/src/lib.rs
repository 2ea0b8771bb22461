//! # Dosewatch Core
//! Core traits, types, and configuration shared by every Dosewatch crate.
//!
//! Nothing in here talks to a platform: storage, presentation, exact-alarm
//! wake-ups, and the remote store are all behind the traits in [`traits`],
//! and recurrence math is a pure function over an explicit offset.

pub mod clock;
pub mod config;
pub mod error;
pub mod recurrence;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DosewatchConfig;
pub use error::{DosewatchError, Result};
pub use types::{AlarmRecord, DomainEvent, NotificationAction, Presentation, PresentationFlags, Recurrence, WakeEvent};

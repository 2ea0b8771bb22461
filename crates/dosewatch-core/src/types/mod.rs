//! Shared types: alarm records, presentations, and domain events.

mod alarm;
mod event;
mod presentation;

pub use alarm::{AlarmRecord, PresentationFlags, Recurrence};
pub use event::{DomainEvent, WakeEvent};
pub use presentation::{NotificationAction, Presentation, TAG_PREFIX};

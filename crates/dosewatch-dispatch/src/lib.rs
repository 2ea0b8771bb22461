//! # Dosewatch Dispatch
//! The local dispatcher loop, the notification action state machine,
//! presenter implementations, and the request/reply messaging service
//! consumed by foreground collaborators.

pub mod actions;
pub mod dispatcher;
pub mod notify;
pub mod service;

pub use actions::{ActionHandler, Interaction, Transition};
pub use dispatcher::{Dispatcher, DispatcherHandle, TickReport};
pub use notify::{create_presenter, LogPresenter, RecordingPresenter, WebhookPresenter};
pub use service::{AlarmService, ServiceHandle};

//! # Dosewatch Sync
//! Bidirectional merge between the local alarm store and the shared remote
//! store used by the user's other devices.

pub mod http;
pub mod reconciler;

pub use http::HttpRemoteStore;
pub use reconciler::{Reconciler, SyncReport};

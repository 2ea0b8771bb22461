//! Seam traits. Everything platform- or transport-specific lives behind one
//! of these; core dispatch and reconciliation logic never branches on
//! platform identity.

pub mod bridge;
pub mod presenter;
pub mod remote;
pub mod store;

pub use bridge::{BridgeCapability, ExactAlarmBridge};
pub use presenter::Presenter;
pub use remote::RemoteStore;
pub use store::AlarmStore;

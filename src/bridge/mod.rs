//! Bridge adapter between the host runtime and the capture core.
//!
//! [`CameraModule`] is the operation surface a host binds to. Operations
//! that depend on hardware or on the user return a [`Pending`] handle;
//! state changes and capture progress are pushed through the [`EventBus`]
//! as [`BridgeEvent`]s. The [`payload`] module turns all of it into the JSON
//! shapes the host exchanges.

mod adapter;
mod event;
pub mod payload;
mod pending;

pub use adapter::CameraModule;
pub use event::{BridgeEvent, EventBus, ProgressInfo};
pub(crate) use pending::{pending, Completer};
pub use pending::Pending;
pub use payload::BridgeFailure;

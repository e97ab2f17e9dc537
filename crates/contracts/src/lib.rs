//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the distributor.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Delivery Model
//! - A [`Message`] is an opaque text payload; targets interpret content
//! - Sources push messages through a single [`MessageCallback`]
//! - Targets receive messages in registration order, one target at a time
//! - Delivery is best-effort and at-most-once

mod blueprint;
mod error;
mod message;
mod outcome;
mod source;
mod stats;
mod target;

pub use blueprint::*;
pub use error::*;
pub use message::Message;
pub use outcome::{OutcomeKind, TaskOutcome};
pub use source::{CallbackSlot, DisconnectCode, DistributionSource, MessageCallback};
pub use stats::*;
pub use target::DistributionTarget;

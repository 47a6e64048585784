//! The APNs delivery pipeline: a main thread stages notifications through four named queues
//! (`outstanding -> in_the_air -> sent -> processed`) and an APNS thread drains `in_the_air`
//! over a persistent TLS session. No event loop, matching the rest of this workspace's
//! thread-per-component model.

pub mod apns;
pub mod chalkboard;
pub mod error;
pub mod notification;
pub mod pipeline;
pub mod wire;

pub use chalkboard::Chalkboard;
pub use error::{MessengerFault, MessengerResult};

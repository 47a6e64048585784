//! The database-poll-to-socket-push fan-out producer. One thread (`producer`) polls
//! `journal.revised_sessions` and stages what it finds on a shared `Board`; a second thread
//! (`listener`) owns the loopback socket that the single Satellite consumer connects to, and
//! drains the board with a `Transmit` + `AckWait` conversation per `spec.md` §4.D.

pub mod board;
pub mod error;
pub mod listener;
pub mod producer;
pub mod wire;

pub use board::Board;
pub use error::{BroadcasterFault, BroadcasterResult};

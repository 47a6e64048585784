//! The per-connection task engine: one OS thread per connection runs the dialogue handshake and
//! then owns the socket's read half for the ordinary paquet loop; one more OS thread services each
//! in-flight paquet. No event loop and no async runtime, matching the original's threading model
//! (`Satellite/tasks.c`).

pub mod broadcaster_client;
mod commands;
pub mod context;
mod dialogue;
pub mod error;
pub mod listener;
mod paquet;
pub mod registry;
pub mod rendezvous;
pub mod task;
pub mod wire;

pub use context::Context;
pub use listener::serve;

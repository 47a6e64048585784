//! A named pool of persistent, transaction-framed Postgres connections. Each checkout
//! (`peek_handle`) opens an implicit transaction; the caller pushes typed parameters and runs
//! one statement at a time against it, then either commits (`poke_handle`) or discards and
//! reconnects (`reset_handle`).

pub mod chain;
pub mod error;
pub mod handle;
pub mod sql;
pub mod validate;

pub use chain::Chain;
pub use error::{DbError, DbResult};
pub use handle::{Handle, HandleId};

//! Multi-bank buffer pool: fixed-size buffers carved out of a handful of named banks, chained
//! together to carry messages larger than any one buffer, and handed out/taken back through a
//! plain move-in/move-out free list instead of reference-counted pointers.
//!
//! Generalizes the single-size `Chunk`/`ChunkPool`/`Buffer` trio into named, differently-sized
//! banks addressed by `BankId`, matching the original's bank-per-size-class layout.

pub mod bank;
pub mod buffer;
pub mod chain;
pub mod error;
pub mod pool;

pub use bank::{Bank, BankId};
pub use buffer::{Buffer, BufferId};
pub use chain::Chain;
pub use error::{MmpsError, MmpsResult};
pub use pool::{standard_pool, Pool};

//! Shared, cloneable handle to everything a paquet handler needs: the buffer pool, the database
//! chain, the task registry a `broadcast_subscribe` paquet's wakeup is routed through, and the
//! component logger. One `Context` is built at startup and cloned into every connection thread.

use std::sync::Arc;
use std::time::Duration;

use dbpool::Chain as DbChain;
use mmps::Pool;
use plat_log::logging::Logger;

use crate::registry::TaskRegistry;

#[derive(Clone)]
pub struct Context {
    pub pool: Arc<Pool>,
    pub db: Arc<DbChain>,
    pub registry: Arc<TaskRegistry>,
    pub logger: Logger,
    /// How long a `broadcast_subscribe` paquet's worker thread parks on the rendezvous before
    /// giving up and returning a "nothing changed" response.
    pub broadcast_wait: Duration,
}

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::{DbError, DbResult};
use crate::handle::{Handle, HandleId};
use plat_log::logging::Logger;

/// A named pool of persistent connections plus the free-index ring that hands them out. Mirrors
/// `mmps::Bank`'s peek/poke discipline exactly: a `Handle` is either sitting in the free list or
/// owned exclusively by whoever last peeked it, never both.
pub struct Chain {
    name: &'static str,
    conninfo: String,
    free: Mutex<VecDeque<Handle>>,
    logger: Logger,
}

impl Chain {
    /// Eagerly opens `n` connections against `conninfo` and populates the free-index ring.
    pub fn init_chain(name: &'static str, n: usize, conninfo: &str, logger: Logger) -> DbResult<Self> {
        let mut free = VecDeque::with_capacity(n);
        for i in 0..n {
            free.push_back(Handle::connect(HandleId(i as u32), conninfo)?);
        }
        Ok(Chain {
            name,
            conninfo: conninfo.to_string(),
            free: Mutex::new(free),
            logger,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }

    /// Dequeues a handle and opens a transaction on it. If the handle still shows an open
    /// transaction from whatever last held it (a caller that forgot to poke or reset it), the
    /// stale transaction is rolled back first and a warning logged, matching the original's
    /// defensive re-entry check. If starting the fresh transaction fails, the handle goes back
    /// to the ring and the error is returned to the caller instead of handing out a broken
    /// handle.
    pub fn peek_handle(&self) -> DbResult<Handle> {
        let mut handle = self
            .free
            .lock()
            .pop_front()
            .ok_or(DbError::ChainExhausted(self.name))?;

        if handle.is_transaction_open() {
            plat_log::logging::warn!(
                self.logger,
                "handle still had an open transaction when peeked, rolling back";
                "chain" => self.name,
                "handle_id" => handle.id.0,
            );
            if let Err(err) = handle.rollback() {
                plat_log::logging::error!(
                    self.logger,
                    "failed to roll back a stale transaction, reconnecting";
                    "chain" => self.name,
                    "handle_id" => handle.id.0,
                    "error" => %err,
                );
                handle.reconnect()?;
            }
        }

        if let Err(err) = handle.begin() {
            plat_log::logging::error!(
                self.logger,
                "failed to start a transaction on a freshly peeked handle";
                "chain" => self.name,
                "handle_id" => handle.id.0,
                "error" => %err,
            );
            self.free.lock().push_back(handle);
            return Err(err);
        }

        Ok(handle)
    }

    /// Commits the handle's current transaction and returns it to the ring.
    pub fn poke_handle(&self, mut handle: Handle) -> DbResult<()> {
        let result = handle.commit();
        self.free.lock().push_back(handle);
        result
    }

    /// Rolls back the handle's current transaction and reconnects the underlying socket before
    /// returning it to the ring, for callers that hit an error they don't trust the connection
    /// to have survived cleanly.
    pub fn reset_handle(&self, mut handle: Handle) -> DbResult<()> {
        let rollback_result = handle.rollback();
        let reconnect_result = handle.reconnect();
        self.free.lock().push_back(handle);
        rollback_result.and(reconnect_result)
    }

    pub fn conninfo(&self) -> &str {
        &self.conninfo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These exercise a real connection and are skipped unless DBPOOL_TEST_CONNINFO is set
    // (e.g. "host=localhost user=postgres dbname=core_test"), the same opt-in convention other
    // crates in the pack use for anything that needs a live service.
    fn test_conninfo() -> Option<String> {
        std::env::var("DBPOOL_TEST_CONNINFO").ok()
    }

    #[test]
    #[ignore]
    fn peek_opens_a_transaction_and_poke_commits_it() {
        let conninfo = test_conninfo().expect("set DBPOOL_TEST_CONNINFO to run this test");
        let chain = Chain::init_chain("test", 2, &conninfo, plat_log::logging::discard()).unwrap();
        assert_eq!(chain.free_count(), 2);

        let handle = chain.peek_handle().unwrap();
        assert_eq!(chain.free_count(), 1);
        assert!(handle.is_transaction_open());

        chain.poke_handle(handle).unwrap();
        assert_eq!(chain.free_count(), 2);
    }

    #[test]
    #[ignore]
    fn peeking_an_exhausted_chain_errors() {
        let conninfo = test_conninfo().expect("set DBPOOL_TEST_CONNINFO to run this test");
        let chain = Chain::init_chain("test", 1, &conninfo, plat_log::logging::discard()).unwrap();
        let _handle = chain.peek_handle().unwrap();
        assert!(matches!(chain.peek_handle(), Err(DbError::ChainExhausted(_))));
    }
}

use std::path::Path;

use crate::bank::{Bank, BankId, SharedBank};
use crate::buffer::Buffer;
use crate::chain::Chain;
use crate::error::{MmpsError, MmpsResult};

/// Owns every bank a process needs and routes `peek`/`poke` calls to the right one. Banks are
/// kept sorted ascending by buffer size so `peek_for` can pick the smallest one that still fits
/// a request, the same first-fit-by-size rule `desk.h` encoded as an ordered list of
/// `NUMBER_OF_BUFFERS_*` constants.
pub struct Pool {
    banks: Vec<SharedBank>,
}

impl Pool {
    pub fn new() -> Self {
        Pool { banks: Vec::new() }
    }

    /// Registers a bank with the pool. Banks are addressed by `BankId` from then on; a given id
    /// must only be added once.
    pub fn add_bank(&mut self, bank: Bank) -> MmpsResult<()> {
        let id = bank.id;
        if self.banks.iter().any(|b| b.id() == id) {
            return Err(MmpsError::DuplicateBank(id));
        }
        self.banks.push(SharedBank::new(bank));
        self.banks.sort_by_key(SharedBank::buf_size);
        Ok(())
    }

    fn bank(&self, id: BankId) -> MmpsResult<&SharedBank> {
        self.banks.iter().find(|b| b.id() == id).ok_or(MmpsError::UnknownBank(id))
    }

    /// Checks out a buffer from a named bank.
    pub fn peek(&self, bank_id: BankId) -> MmpsResult<Buffer> {
        self.bank(bank_id)?.peek()
    }

    /// Checks out a buffer from the smallest bank whose buffer size is at least `min_size`,
    /// falling back to the next-larger fitting bank if that one's free list is exhausted.
    /// `spec.md` §4.A: "falls back to any bank … null only when every bank is exhausted." Used
    /// by `Chain::put_data` so callers never have to know which bank a given payload size
    /// belongs to.
    pub fn peek_for(&self, min_size: usize) -> MmpsResult<Buffer> {
        let mut fits_none = true;
        for bank in self.banks.iter().filter(|b| b.buf_size() >= min_size) {
            fits_none = false;
            match bank.peek() {
                Ok(buffer) => return Ok(buffer),
                Err(MmpsError::BankExhausted(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        if fits_none {
            Err(MmpsError::NoBankFitsSize(min_size))
        } else {
            Err(MmpsError::BankExhausted(self.banks.last().map(|b| b.id()).unwrap_or(BankId(0))))
        }
    }

    pub fn poke(&self, buffer: Buffer) -> MmpsResult<()> {
        self.bank(buffer.bank_id)?.poke(buffer);
        Ok(())
    }

    /// Returns every buffer in a chain to its own bank, in order.
    pub fn poke_chain(&self, chain: Chain) -> MmpsResult<()> {
        for buffer in chain.into_buffers() {
            self.poke(buffer)?;
        }
        Ok(())
    }

    pub fn bank_free_count(&self, bank_id: BankId) -> MmpsResult<usize> {
        Ok(self.bank(bank_id)?.free_count())
    }

    pub fn bank_in_use_count(&self, bank_id: BankId) -> MmpsResult<usize> {
        Ok(self.bank(bank_id)?.in_use_count())
    }
}

impl Default for Pool {
    fn default() -> Self {
        Pool::new()
    }
}

/// Convenience constructor matching the size classes `desk.h` lays out for Satellite: task and
/// paquet banks sized for protocol control structures, then a ladder of general-purpose banks.
/// Callers that need different sizing build a `Pool` by hand with `add_bank`.
pub fn standard_pool(task_buffers: usize, paquet_buffers: usize) -> MmpsResult<Pool> {
    let mut pool = Pool::new();
    pool.add_bank(Bank::new_heap(BankId(0), 256, 0, task_buffers))?;
    pool.add_bank(Bank::new_heap(BankId(1), 512, 0, paquet_buffers))?;
    pool.add_bank(Bank::new_heap(BankId(2), 256, 0, 64))?;
    pool.add_bank(Bank::new_heap(BankId(3), 512, 0, 64))?;
    pool.add_bank(Bank::new_heap(BankId(4), 1024, 0, 32))?;
    pool.add_bank(Bank::new_heap(BankId(5), 4096, 0, 16))?;
    pool.add_bank(Bank::new_heap_on_demand(BankId(6), 1024 * 1024, 0, 4))?;
    Ok(pool)
}

/// A bank backed by a memory-mapped file instead of the heap, for callers that need a buffer
/// region another process (or a post-mortem debugger) can inspect.
pub fn add_shared_bank(pool: &mut Pool, id: BankId, buf_size: usize, total_buffers: usize, path: &Path) -> MmpsResult<()> {
    let bank = Bank::new_shared(id, buf_size, 0, total_buffers, path)?;
    pool.add_bank(bank)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_for_picks_smallest_fitting_bank() {
        let mut pool = Pool::new();
        pool.add_bank(Bank::new_heap(BankId(0), 16, 0, 2)).unwrap();
        pool.add_bank(Bank::new_heap(BankId(1), 64, 0, 2)).unwrap();
        let buf = pool.peek_for(20).unwrap();
        assert_eq!(buf.bank_id, BankId(1));
    }

    #[test]
    fn duplicate_bank_id_rejected() {
        let mut pool = Pool::new();
        pool.add_bank(Bank::new_heap(BankId(0), 16, 0, 2)).unwrap();
        assert!(matches!(
            pool.add_bank(Bank::new_heap(BankId(0), 32, 0, 2)),
            Err(MmpsError::DuplicateBank(_))
        ));
    }

    #[test]
    fn peek_for_falls_back_to_a_larger_bank_when_the_smallest_fit_is_exhausted() {
        let mut pool = Pool::new();
        pool.add_bank(Bank::new_heap(BankId(0), 16, 0, 1)).unwrap();
        pool.add_bank(Bank::new_heap(BankId(1), 64, 0, 1)).unwrap();
        let first = pool.peek_for(10).unwrap();
        assert_eq!(first.bank_id, BankId(0));

        // The smallest fitting bank (id 0) is now empty; the next fitting bank should serve it.
        let second = pool.peek_for(10).unwrap();
        assert_eq!(second.bank_id, BankId(1));
    }

    #[test]
    fn no_bank_fits_requested_size() {
        let mut pool = Pool::new();
        pool.add_bank(Bank::new_heap(BankId(0), 16, 0, 2)).unwrap();
        assert!(matches!(pool.peek_for(17), Err(MmpsError::NoBankFitsSize(17))));
    }

    #[test]
    fn standard_pool_round_trips_a_task_buffer() {
        let pool = standard_pool(4, 4).unwrap();
        let buf = pool.peek(BankId(0)).unwrap();
        assert_eq!(pool.bank_in_use_count(BankId(0)).unwrap(), 1);
        pool.poke(buf).unwrap();
        assert_eq!(pool.bank_in_use_count(BankId(0)).unwrap(), 0);
    }
}

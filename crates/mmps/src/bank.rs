use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;
use parking_lot::Mutex;

use crate::buffer::{Buffer, BufferId};
use crate::error::{MmpsError, MmpsResult};

/// Identifies one bank within a pool. The workspace hands out small fixed ids per size class
/// (task buffers, paquet buffers, the 256B/512B/1K/4K/1M general banks) rather than naming them
/// by size directly, so a bank can be resized without renumbering its callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BankId(pub u32);

/// Backing storage for a bank's buffers. `Heap` is the common case; `Shared` memory-maps a file
/// so buffers can be handed to another process (or inspected post-mortem) without a copy.
enum Storage {
    Heap,
    Shared(MmapMut),
}

/// A homogeneous pool of fixed-size buffers plus the free list that hands them out and takes
/// them back. Mirrors the teacher's `ChunkPool`, generalized from one implicit 8192-byte size to
/// an explicit, named size class per bank, and given a bounded capacity instead of growing
/// without limit.
///
/// The free list holds fully-owned `Buffer` values rather than a separate table of ids: the
/// C original needed an id-indexed descriptor table because buffers were shared by raw pointer,
/// but once a `peek`/`poke` pair moves ownership in and out of the pool there is nothing left
/// for a separate table to index. Rotation order (oldest-freed-first) and the free/in-use count
/// invariant are unchanged; `VecDeque` is simply Rust's ring buffer.
pub struct Bank {
    pub id: BankId,
    pub buf_size: usize,
    pub follower_size: usize,
    pub total_buffers: usize,
    allocate_on_demand: bool,
    next_id: u32,
    free: VecDeque<Buffer>,
    allocated: usize,
    _storage: Storage,
}

impl Bank {
    pub fn new_heap(id: BankId, buf_size: usize, follower_size: usize, total_buffers: usize) -> Self {
        Bank {
            id,
            buf_size,
            follower_size,
            total_buffers,
            allocate_on_demand: false,
            next_id: 0,
            free: VecDeque::with_capacity(total_buffers),
            allocated: 0,
            _storage: Storage::Heap,
        }
        .prefilled()
    }

    /// Allocates buffers lazily as `peek` first needs them, instead of up front. Useful for
    /// large, rarely-exhausted banks (the 1M bank) where paying for every buffer at startup
    /// would be wasteful.
    pub fn new_heap_on_demand(id: BankId, buf_size: usize, follower_size: usize, total_buffers: usize) -> Self {
        Bank {
            id,
            buf_size,
            follower_size,
            total_buffers,
            allocate_on_demand: true,
            next_id: 0,
            free: VecDeque::new(),
            allocated: 0,
            _storage: Storage::Heap,
        }
    }

    /// Memory-maps `path` (created and sized to fit `total_buffers`) and carves buffers out of
    /// heap storage regardless; the mapping is retained so the region stays resident and
    /// inspectable, matching the original's `MMPS_SHM` banks used for crash-time diagnostics.
    pub fn new_shared(
        id: BankId,
        buf_size: usize,
        follower_size: usize,
        total_buffers: usize,
        path: &Path,
    ) -> MmpsResult<Bank> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| MmpsError::SharedMemoryMapFailed(id, e))?;
        let region_len = (buf_size + follower_size).max(1) * total_buffers;
        file.set_len(region_len as u64)
            .map_err(|e| MmpsError::SharedMemoryMapFailed(id, e))?;
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| MmpsError::SharedMemoryMapFailed(id, e))?;
        Ok(Bank {
            id,
            buf_size,
            follower_size,
            total_buffers,
            allocate_on_demand: false,
            next_id: 0,
            free: VecDeque::with_capacity(total_buffers),
            allocated: 0,
            _storage: Storage::Shared(mmap),
        }
        .prefilled())
    }

    fn prefilled(mut self) -> Self {
        if !self.allocate_on_demand {
            for _ in 0..self.total_buffers {
                self.push_fresh();
            }
        }
        self
    }

    fn push_fresh(&mut self) {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.allocated += 1;
        self.free
            .push_back(Buffer::new(self.id, id, self.buf_size, self.follower_size));
    }

    /// Returns `true` when every buffer the bank was sized for is currently either free or
    /// checked out (i.e. the bank will never allocate another one). Always true for banks
    /// allocated up front.
    pub fn is_fully_allocated(&self) -> bool {
        self.allocated >= self.total_buffers
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.allocated - self.free.len()
    }

    /// Checks out the oldest-freed buffer, allocating a fresh one first if the bank was built
    /// with `allocate_on_demand` and has not yet reached capacity.
    pub fn peek(&mut self) -> MmpsResult<Buffer> {
        if self.free.is_empty() {
            if self.allocate_on_demand && self.allocated < self.total_buffers {
                self.push_fresh();
            } else {
                return Err(MmpsError::BankExhausted(self.id));
            }
        }
        Ok(self.free.pop_front().expect("checked non-empty above"))
    }

    /// Returns a buffer to the free list, resetting its length and cursor first so the next
    /// tenant never observes stale bytes.
    pub fn poke(&mut self, mut buffer: Buffer) {
        debug_assert_eq!(buffer.bank_id, self.id, "buffer poked into the wrong bank");
        buffer.reset();
        self.free.push_back(buffer);
    }
}

/// A bank guarded for concurrent access from multiple worker threads, the shape every bank in
/// the live pool actually takes (one bank, many paquet and task threads peeking/poking it).
pub struct SharedBank(Mutex<Bank>);

impl SharedBank {
    pub fn new(bank: Bank) -> Self {
        SharedBank(Mutex::new(bank))
    }

    pub fn peek(&self) -> MmpsResult<Buffer> {
        self.0.lock().peek()
    }

    pub fn poke(&self, buffer: Buffer) {
        self.0.lock().poke(buffer)
    }

    pub fn free_count(&self) -> usize {
        self.0.lock().free_count()
    }

    pub fn in_use_count(&self) -> usize {
        self.0.lock().in_use_count()
    }

    pub fn id(&self) -> BankId {
        self.0.lock().id
    }

    pub fn buf_size(&self) -> usize {
        self.0.lock().buf_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefilled_bank_starts_all_free() {
        let bank = Bank::new_heap(BankId(1), 16, 0, 4);
        assert_eq!(bank.free_count(), 4);
        assert_eq!(bank.in_use_count(), 0);
    }

    #[test]
    fn peek_poke_preserves_total_count() {
        let mut bank = Bank::new_heap(BankId(1), 16, 0, 4);
        let b1 = bank.peek().unwrap();
        let b2 = bank.peek().unwrap();
        assert_eq!(bank.free_count(), 2);
        assert_eq!(bank.in_use_count(), 2);
        bank.poke(b1);
        bank.poke(b2);
        assert_eq!(bank.free_count(), 4);
        assert_eq!(bank.in_use_count(), 0);
    }

    #[test]
    fn exhausted_fixed_bank_errors_on_peek() {
        let mut bank = Bank::new_heap(BankId(1), 16, 0, 1);
        let _b = bank.peek().unwrap();
        assert!(matches!(bank.peek(), Err(MmpsError::BankExhausted(_))));
    }

    #[test]
    fn on_demand_bank_grows_up_to_total() {
        let mut bank = Bank::new_heap_on_demand(BankId(2), 16, 0, 2);
        assert_eq!(bank.free_count(), 0);
        let _b1 = bank.peek().unwrap();
        let _b2 = bank.peek().unwrap();
        assert!(bank.is_fully_allocated());
        assert!(matches!(bank.peek(), Err(MmpsError::BankExhausted(_))));
    }

    #[test]
    fn poked_buffer_is_reset() {
        let mut bank = Bank::new_heap(BankId(1), 16, 0, 1);
        let mut b = bank.peek().unwrap();
        b.put_u8(7).unwrap();
        bank.poke(b);
        let b2 = bank.peek().unwrap();
        assert_eq!(b2.len(), 0);
        assert_eq!(b2.cursor(), 0);
    }
}

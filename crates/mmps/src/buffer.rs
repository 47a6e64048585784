use std::sync::atomic::{AtomicU32, Ordering};

use byteorder::{BigEndian, ByteOrder};

use crate::bank::BankId;
use crate::error::{MmpsError, MmpsResult};

/// Identifies a buffer within its bank for the lifetime of the process. Ids are assigned
/// monotonically as a bank's backing store is carved up and never reused, so they double as
/// a stable handle for logging ("buffer 4812 on bank Plaques4K stalled").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u32);

/// One fixed-size block of a bank, checked out exclusively by a single caller for the duration
/// of its use. A buffer carries its own write/read cursor so callers can treat a chain of them
/// as one continuous byte stream without tracking offsets by hand.
///
/// Buffers never escape the pool by reference: `Bank::peek` moves an owned `Buffer` out to the
/// caller and `Bank::poke` moves it back, the same move-in/move-out discipline the rest of the
/// workspace uses for task and connection state.
pub struct Buffer {
    pub bank_id: BankId,
    pub id: BufferId,
    pub(crate) owner_id: u32,
    data: Box<[u8]>,
    follower: Option<Box<[u8]>>,
    data_size: usize,
    cursor: usize,
    touch_count: AtomicU32,
}

impl Buffer {
    pub(crate) fn new(bank_id: BankId, id: BufferId, size: usize, follower_size: usize) -> Self {
        Buffer {
            bank_id,
            id,
            owner_id: 0,
            data: vec![0u8; size].into_boxed_slice(),
            follower: if follower_size > 0 {
                Some(vec![0u8; follower_size].into_boxed_slice())
            } else {
                None
            },
            data_size: 0,
            cursor: 0,
            touch_count: AtomicU32::new(0),
        }
    }

    /// Total addressable bytes in this buffer's primary region.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// How many of those bytes currently hold meaningful data, as of the last write/resize.
    pub fn len(&self) -> usize {
        self.data_size
    }

    pub fn is_empty(&self) -> bool {
        self.data_size == 0
    }

    pub fn remaining_capacity(&self) -> usize {
        self.data.len() - self.data_size
    }

    pub fn remaining_readable(&self) -> usize {
        self.data_size - self.cursor
    }

    /// Room left to read or write before the buffer's own cursor runs off the end; a chain
    /// uses this to decide when to roll over into the next link.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn follower(&self) -> Option<&[u8]> {
        self.follower.as_deref()
    }

    pub fn follower_mut(&mut self) -> Option<&mut [u8]> {
        self.follower.as_deref_mut()
    }

    /// Drops the buffer back to a freshly-carved state (zero length, cursor at zero) without
    /// releasing its storage. Called by `Bank::poke` before a buffer re-enters the free list so
    /// stale bytes from a prior tenant never leak into the next one.
    pub(crate) fn reset(&mut self) {
        self.data_size = 0;
        self.cursor = 0;
        self.owner_id = 0;
        self.touch_count.store(0, Ordering::Release);
    }

    fn ensure_writable(&mut self, n: usize) -> MmpsResult<()> {
        if self.data_size + n > self.data.len() {
            return Err(MmpsError::NoBankFitsSize(n));
        }
        Ok(())
    }

    /// Appends raw bytes at the end of the buffer's written region. Does not touch the read
    /// cursor; a buffer is usually filled completely before anything reads it back.
    pub fn put_data(&mut self, bytes: &[u8]) -> MmpsResult<()> {
        self.ensure_writable(bytes.len())?;
        let start = self.data_size;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.data_size += bytes.len();
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> MmpsResult<()> {
        self.put_data(&[value])
    }

    pub fn put_i16(&mut self, value: i16) -> MmpsResult<()> {
        let mut buf = [0u8; 2];
        BigEndian::write_i16(&mut buf, value);
        self.put_data(&buf)
    }

    pub fn put_i32(&mut self, value: i32) -> MmpsResult<()> {
        let mut buf = [0u8; 4];
        BigEndian::write_i32(&mut buf, value);
        self.put_data(&buf)
    }

    pub fn put_i64(&mut self, value: i64) -> MmpsResult<()> {
        let mut buf = [0u8; 8];
        BigEndian::write_i64(&mut buf, value);
        self.put_data(&buf)
    }

    pub fn put_u32(&mut self, value: u32) -> MmpsResult<()> {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, value);
        self.put_data(&buf)
    }

    /// Writes a length-prefixed UTF-8 string: a big-endian `u16` byte count followed by the
    /// bytes themselves. The mobile client's fixed struct layouts expect exactly this shape for
    /// every variable-length field.
    pub fn put_string(&mut self, s: &str) -> MmpsResult<()> {
        let bytes = s.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(MmpsError::StringTooLong);
        }
        self.put_i16(bytes.len() as i16)?;
        self.put_data(bytes)
    }

    fn ensure_readable(&self, n: usize) -> MmpsResult<()> {
        if self.cursor + n > self.data_size {
            return Err(MmpsError::ChainUnderrun);
        }
        Ok(())
    }

    pub fn get_data(&mut self, n: usize) -> MmpsResult<&[u8]> {
        self.ensure_readable(n)?;
        let start = self.cursor;
        self.cursor += n;
        Ok(&self.data[start..start + n])
    }

    pub fn get_u8(&mut self) -> MmpsResult<u8> {
        Ok(self.get_data(1)?[0])
    }

    pub fn get_i16(&mut self) -> MmpsResult<i16> {
        Ok(BigEndian::read_i16(self.get_data(2)?))
    }

    pub fn get_i32(&mut self) -> MmpsResult<i32> {
        Ok(BigEndian::read_i32(self.get_data(4)?))
    }

    pub fn get_i64(&mut self) -> MmpsResult<i64> {
        Ok(BigEndian::read_i64(self.get_data(8)?))
    }

    pub fn get_u32(&mut self) -> MmpsResult<u32> {
        Ok(BigEndian::read_u32(self.get_data(4)?))
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Advances the logical reference count on this buffer. A buffer handed to more than one
    /// downstream consumer (e.g. the same notification payload queued for several device
    /// tokens) is touched once per consumer; each consumer calls `absolve` when it is done, and
    /// the convention is that whichever call observes the count drop to zero is the one that
    /// pokes the buffer back to its bank.
    pub fn touch(&self) -> u32 {
        self.touch_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Releases one logical reference. Returns the count after the decrement; zero means this
    /// caller was the last holder and is responsible for returning the buffer to its bank.
    pub fn absolve(&self) -> u32 {
        self.touch_count.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn touch_count(&self) -> u32 {
        self.touch_count.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("bank_id", &self.bank_id)
            .field("id", &self.id)
            .field("capacity", &self.data.len())
            .field("len", &self.data_size)
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get_round_trip() {
        let mut buf = Buffer::new(BankId(0), BufferId(0), 16, 0);
        buf.put_i32(0x0102_0304).unwrap();
        buf.put_string("hi").unwrap();
        assert_eq!(buf.get_i32().unwrap(), 0x0102_0304);
        assert_eq!(buf.get_i16().unwrap(), 2);
        assert_eq!(buf.get_data(2).unwrap(), b"hi");
    }

    #[test]
    fn write_past_capacity_errors() {
        let mut buf = Buffer::new(BankId(0), BufferId(0), 4, 0);
        buf.put_data(&[1, 2, 3, 4]).unwrap();
        assert!(buf.put_u8(5).is_err());
    }

    #[test]
    fn read_past_written_region_errors() {
        let mut buf = Buffer::new(BankId(0), BufferId(0), 4, 0);
        buf.put_u8(1).unwrap();
        assert!(buf.get_i32().is_err());
    }

    #[test]
    fn touch_absolve_round_trip_reaches_zero() {
        let buf = Buffer::new(BankId(0), BufferId(0), 4, 0);
        buf.touch();
        buf.touch();
        assert_eq!(buf.absolve(), 1);
        assert_eq!(buf.absolve(), 0);
    }

    #[test]
    fn reset_clears_length_cursor_and_touch() {
        let mut buf = Buffer::new(BankId(0), BufferId(0), 4, 0);
        buf.put_u8(9).unwrap();
        buf.touch();
        buf.reset();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.cursor(), 0);
        assert_eq!(buf.touch_count(), 0);
    }
}

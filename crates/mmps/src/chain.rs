use byteorder::{BigEndian, ByteOrder};

use crate::buffer::Buffer;
use crate::error::{MmpsError, MmpsResult};
use crate::pool::Pool;

/// An ordered sequence of buffers treated as one continuous byte stream, the safe-Rust stand-in
/// for the original's forward/backward linked descriptors. Chaining two buffers is just pushing
/// the second one onto this `Vec`; there is no link to get wrong and no way to form a cycle.
///
/// A chain grows by pulling fresh buffers from whichever bank `Pool::peek_for` judges large
/// enough for the remaining bytes, and it always writes to the tail and reads from the head, the
/// same traversal order `paquet_displacement.c` used over its buffer lists.
#[derive(Default)]
pub struct Chain {
    buffers: Vec<Buffer>,
    read_buffer: usize,
}

impl Chain {
    pub fn new() -> Self {
        Chain {
            buffers: Vec::new(),
            read_buffer: 0,
        }
    }

    pub fn from_buffer(buffer: Buffer) -> Self {
        Chain {
            buffers: vec![buffer],
            read_buffer: 0,
        }
    }

    pub fn push(&mut self, buffer: Buffer) {
        self.buffers.push(buffer);
    }

    pub fn len(&self) -> usize {
        self.buffers.iter().map(Buffer::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty() || self.len() == 0
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Returns the buffers in order, consuming the chain. `Pool::poke_chain` uses this to hand
    /// each buffer back to its own bank.
    pub fn into_buffers(self) -> Vec<Buffer> {
        self.buffers
    }

    pub fn iter_buffers(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers.iter()
    }

    fn tail_room(&self) -> usize {
        self.buffers.last().map(Buffer::remaining_capacity).unwrap_or(0)
    }

    /// Writes `bytes` across as many buffers as needed, pulling new ones from `pool` whenever
    /// the current tail fills up. A paquet payload that exceeds one buffer's capacity spans the
    /// chain transparently this way.
    pub fn put_data(&mut self, pool: &Pool, mut bytes: &[u8]) -> MmpsResult<()> {
        while !bytes.is_empty() {
            if self.tail_room() == 0 {
                self.buffers.push(pool.peek_for(bytes.len())?);
            }
            let room = self.tail_room();
            let take = room.min(bytes.len());
            let tail = self.buffers.last_mut().expect("just ensured a tail buffer exists");
            tail.put_data(&bytes[..take])?;
            bytes = &bytes[take..];
        }
        Ok(())
    }

    pub fn put_u8(&mut self, pool: &Pool, value: u8) -> MmpsResult<()> {
        self.put_data(pool, &[value])
    }

    pub fn put_i16(&mut self, pool: &Pool, value: i16) -> MmpsResult<()> {
        let mut buf = [0u8; 2];
        BigEndian::write_i16(&mut buf, value);
        self.put_data(pool, &buf)
    }

    pub fn put_i32(&mut self, pool: &Pool, value: i32) -> MmpsResult<()> {
        let mut buf = [0u8; 4];
        BigEndian::write_i32(&mut buf, value);
        self.put_data(pool, &buf)
    }

    pub fn put_i64(&mut self, pool: &Pool, value: i64) -> MmpsResult<()> {
        let mut buf = [0u8; 8];
        BigEndian::write_i64(&mut buf, value);
        self.put_data(pool, &buf)
    }

    pub fn put_string(&mut self, pool: &Pool, s: &str) -> MmpsResult<()> {
        let bytes = s.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(MmpsError::StringTooLong);
        }
        self.put_i16(pool, bytes.len() as i16)?;
        self.put_data(pool, bytes)
    }

    /// Reads `n` bytes starting at the chain's current read position, copying across a buffer
    /// boundary if necessary. Returns an owned `Vec` rather than a slice since the bytes may not
    /// be contiguous in memory.
    pub fn get_data(&mut self, n: usize) -> MmpsResult<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            let buf = self
                .buffers
                .get_mut(self.read_buffer)
                .ok_or(MmpsError::ChainUnderrun)?;
            if buf.remaining_readable() == 0 {
                if self.read_buffer + 1 >= self.buffers.len() {
                    return Err(MmpsError::ChainUnderrun);
                }
                self.read_buffer += 1;
                continue;
            }
            let take = remaining.min(buf.remaining_readable());
            out.extend_from_slice(buf.get_data(take)?);
            remaining -= take;
        }
        Ok(out)
    }

    pub fn get_u8(&mut self) -> MmpsResult<u8> {
        Ok(self.get_data(1)?[0])
    }

    pub fn get_i16(&mut self) -> MmpsResult<i16> {
        Ok(BigEndian::read_i16(&self.get_data(2)?))
    }

    pub fn get_i32(&mut self) -> MmpsResult<i32> {
        Ok(BigEndian::read_i32(&self.get_data(4)?))
    }

    pub fn get_i64(&mut self) -> MmpsResult<i64> {
        Ok(BigEndian::read_i64(&self.get_data(8)?))
    }

    pub fn get_string(&mut self) -> MmpsResult<String> {
        let len = self.get_i16()? as usize;
        let bytes = self.get_data(len)?;
        String::from_utf8(bytes).map_err(|_| MmpsError::ChainUnderrun)
    }

    pub fn rewind(&mut self) {
        self.read_buffer = 0;
        for buf in &mut self.buffers {
            buf.rewind();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{Bank, BankId};
    use crate::pool::Pool;

    fn tiny_pool() -> Pool {
        let mut pool = Pool::new();
        pool.add_bank(Bank::new_heap(BankId(1), 8, 0, 4));
        pool
    }

    #[test]
    fn write_spanning_three_buffers_reads_back_whole() {
        let pool = tiny_pool();
        let mut chain = Chain::new();
        chain.put_data(&pool, b"ABCDEFGHIJKL").unwrap();
        assert_eq!(chain.buffer_count(), 2);
        chain.rewind();
        assert_eq!(chain.get_data(12).unwrap(), b"ABCDEFGHIJKL");
    }

    #[test]
    fn integer_round_trips_across_a_chain_boundary() {
        let pool = tiny_pool();
        let mut chain = Chain::new();
        chain.put_data(&pool, &[0u8; 6]).unwrap();
        chain.put_i32(&pool, 0x0102_0304).unwrap();
        chain.rewind();
        let _ = chain.get_data(6).unwrap();
        assert_eq!(chain.get_i32().unwrap(), 0x0102_0304);
    }

    #[test]
    fn reading_past_the_end_underruns() {
        let pool = tiny_pool();
        let mut chain = Chain::new();
        chain.put_u8(&pool, 1).unwrap();
        chain.rewind();
        chain.get_u8().unwrap();
        assert!(matches!(chain.get_u8(), Err(MmpsError::ChainUnderrun)));
    }
}

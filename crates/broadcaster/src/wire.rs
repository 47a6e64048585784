//! The loopback wire format between `broadcasterd` and the one `satellited` process subscribed
//! to it (`spec.md` §1 rules out horizontal scaling beyond a single Satellite instance, so there
//! is exactly one consumer in practice even though the listener will serve whichever one
//! currently holds the socket). A `Session` record carries the receipt id the consumer must echo
//! back to confirm delivery, the session it concerns, and its three fresh revision counters.
//!
//! `spec.md` §3/§6 also lists a `satelliteTaskId` field, used so a Broadcaster serving more than
//! one Satellite process could route a session to the right one. This workspace's Satellite
//! keeps a `TaskRegistry::by_session` index (`satellite::registry`) instead, so a consumer routes
//! directly by `session_id` without needing to know which task id owns it; `satelliteTaskId` is
//! dropped from the wire format rather than carried and ignored. Recorded as a departure in
//! `DESIGN.md`.

use byteorder::{BigEndian, ByteOrder};
use mmps::{Chain, MmpsResult, Pool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub receipt_id: u64,
    pub session_id: i64,
    pub on_radar_revision: i32,
    pub in_sight_revision: i32,
    pub on_map_revision: i32,
}

impl Session {
    pub const SIZE: usize = 8 + 8 + 4 + 4 + 4;

    pub fn write(&self, pool: &Pool, out: &mut Chain) -> MmpsResult<()> {
        out.put_i64(pool, self.receipt_id as i64)?;
        out.put_i64(pool, self.session_id)?;
        out.put_i32(pool, self.on_radar_revision)?;
        out.put_i32(pool, self.in_sight_revision)?;
        out.put_i32(pool, self.on_map_revision)
    }

    pub fn read(input: &mut Chain) -> MmpsResult<Session> {
        Ok(Session {
            receipt_id: input.get_i64()? as u64,
            session_id: input.get_i64()?,
            on_radar_revision: input.get_i32()?,
            in_sight_revision: input.get_i32()?,
            on_map_revision: input.get_i32()?,
        })
    }
}

/// Writes a complete frame: a count followed by that many `Session` records. An empty frame
/// (count zero) is the listener's keepalive, sent so a consumer blocked on a read notices a dead
/// connection instead of waiting indefinitely.
pub fn write_frame(pool: &Pool, sessions: &[Session]) -> MmpsResult<Chain> {
    let mut chain = Chain::new();
    chain.put_i32(pool, sessions.len() as i32)?;
    for session in sessions {
        session.write(pool, &mut chain)?;
    }
    Ok(chain)
}

pub fn read_frame(input: &mut Chain) -> MmpsResult<Vec<Session>> {
    let count = input.get_i32()?.max(0) as usize;
    let mut sessions = Vec::with_capacity(count);
    for _ in 0..count {
        sessions.push(Session::read(input)?);
    }
    Ok(sessions)
}

/// A consumer acknowledges one delivered session by echoing its receipt id back as a raw
/// 8-byte big-endian integer (`spec.md` §6: "the consumer replies with the 8-byte big-endian
/// receiptId"), outside of any `Chain`/pilot framing since it is the one message in this
/// protocol that isn't itself buffer-pool traffic.
pub fn encode_receipt_ack(receipt_id: u64) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    BigEndian::write_u64(&mut bytes, receipt_id);
    bytes
}

pub fn decode_receipt_ack(bytes: &[u8; 8]) -> u64 {
    BigEndian::read_u64(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_pool() -> Pool {
        let mut pool = Pool::new();
        pool.add_bank(mmps::Bank::new_heap(mmps::BankId(1), 64, 0, 8)).unwrap();
        pool
    }

    #[test]
    fn a_frame_round_trips_through_the_wire() {
        let pool = tiny_pool();
        let sessions = vec![
            Session { receipt_id: 41, session_id: 1, on_radar_revision: 5, in_sight_revision: 2, on_map_revision: 0 },
            Session { receipt_id: 42, session_id: 2, on_radar_revision: 0, in_sight_revision: 0, on_map_revision: 9 },
        ];
        let mut chain = write_frame(&pool, &sessions).unwrap();
        chain.rewind();
        let decoded = read_frame(&mut chain).unwrap();
        assert_eq!(decoded, sessions);
    }

    #[test]
    fn an_empty_frame_decodes_to_no_sessions() {
        let pool = tiny_pool();
        let mut chain = write_frame(&pool, &[]).unwrap();
        chain.rewind();
        assert!(read_frame(&mut chain).unwrap().is_empty());
    }

    #[test]
    fn receipt_ack_round_trips() {
        let bytes = encode_receipt_ack(0x0102_0304_0506_0708);
        assert_eq!(decode_receipt_ack(&bytes), 0x0102_0304_0506_0708);
    }
}

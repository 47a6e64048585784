//! Fixed-layout wire structs for the client dialogue, read and written over an
//! [`mmps::Chain`]'s cursor. Kept as plain structs with explicit `read`/`write` methods rather
//! than a `serde`/`bincode` derive, since the layout is a hand-specified C struct the mobile
//! client already expects (`original_source/Satellite/tasks.h`), not something this workspace is
//! free to renegotiate.

use mmps::{Chain, MmpsResult, Pool};

/// Every dialogue and paquet on the wire starts with this signature. A mismatch here means the
/// peer isn't speaking this protocol at all and the dialogue is torn down immediately.
pub const DIALOGUE_SIGNATURE: u64 = 0x5054_4C51_4753_4154; // "PTLQGSAT"

pub const TOKEN_SIZE: usize = plat_log::TOKEN_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DialogueType {
    Anticipant = 1,
    Regular = 2,
}

impl DialogueType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(DialogueType::Anticipant),
            2 => Some(DialogueType::Regular),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum VerdictCode {
    Welcome = 0,
    NewSession = 1,
    InvalidDevice = 2,
    InvalidProfile = 3,
}

/// Rejection marker placed in `PaquetPilot::command_subcode` on a response that could not be
/// serviced because the task had no worker thread to spare for it.
pub const PAQUET_REJECT_BUSY: u32 = 0xFFFF_FFFF;

/// 24-byte header preceding every paquet's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaquetPilot {
    pub signature: u64,
    pub paquet_id: u32,
    pub command_code: u32,
    pub command_subcode: u32,
    pub payload_size: u32,
}

impl PaquetPilot {
    pub const SIZE: usize = 24;

    pub fn read(chain: &mut Chain) -> MmpsResult<PaquetPilot> {
        Ok(PaquetPilot {
            signature: chain.get_i64()? as u64,
            paquet_id: chain.get_i32()? as u32,
            command_code: chain.get_i32()? as u32,
            command_subcode: chain.get_i32()? as u32,
            payload_size: chain.get_i32()? as u32,
        })
    }

    pub fn write(&self, pool: &Pool, chain: &mut Chain) -> MmpsResult<()> {
        chain.put_i64(pool, self.signature as i64)?;
        chain.put_i32(pool, self.paquet_id as i32)?;
        chain.put_i32(pool, self.command_code as i32)?;
        chain.put_i32(pool, self.command_subcode as i32)?;
        chain.put_i32(pool, self.payload_size as i32)
    }
}

/// Read once per connection, right after accept. `dialogue_type` decides whether the task enters
/// the anticipant (device registration) or regular (authenticated session) path.
#[derive(Debug, Clone)]
pub struct DialogueDemande {
    pub signature: u64,
    pub device_timestamp: f64,
    pub dialogue_type: u32,
    pub application_version: u8,
    pub application_subversion: u8,
    pub application_release: u16,
    pub device_type: u16,
    pub application_build: [u8; 6],
    pub device_token: [u8; TOKEN_SIZE],
    pub profile_token: [u8; TOKEN_SIZE],
    pub session_token: [u8; TOKEN_SIZE],
}

impl DialogueDemande {
    pub const SIZE: usize = 8 + 8 + 4 + 1 + 1 + 2 + 2 + 6 + TOKEN_SIZE * 3;

    pub fn read(chain: &mut Chain) -> MmpsResult<DialogueDemande> {
        let signature = chain.get_i64()? as u64;
        let device_timestamp = f64::from_bits(chain.get_i64()? as u64);
        let dialogue_type = chain.get_i32()? as u32;
        let application_version = chain.get_u8()?;
        let application_subversion = chain.get_u8()?;
        let application_release = chain.get_i16()? as u16;
        let device_type = chain.get_i16()? as u16;

        let mut application_build = [0u8; 6];
        application_build.copy_from_slice(&chain.get_data(6)?);

        let mut device_token = [0u8; TOKEN_SIZE];
        device_token.copy_from_slice(&chain.get_data(TOKEN_SIZE)?);

        let mut profile_token = [0u8; TOKEN_SIZE];
        profile_token.copy_from_slice(&chain.get_data(TOKEN_SIZE)?);

        let mut session_token = [0u8; TOKEN_SIZE];
        session_token.copy_from_slice(&chain.get_data(TOKEN_SIZE)?);

        Ok(DialogueDemande {
            signature,
            device_timestamp,
            dialogue_type,
            application_version,
            application_subversion,
            application_release,
            device_type,
            application_build,
            device_token,
            profile_token,
            session_token,
        })
    }

    /// A profile token is "present" if it is anything other than sixteen zero bytes; an
    /// all-zero token means the device hasn't created a profile yet.
    pub fn has_profile_token(&self) -> bool {
        self.profile_token.iter().any(|&b| b != 0)
    }

    pub fn has_session_token(&self) -> bool {
        self.session_token.iter().any(|&b| b != 0)
    }
}

/// Sent in reply to a `DialogueDemande` on the regular path.
#[derive(Debug, Clone, Copy)]
pub struct DialogueVerdict {
    pub signature: u64,
    pub verdict_code: u32,
    pub session_token: [u8; TOKEN_SIZE],
}

impl DialogueVerdict {
    pub const SIZE: usize = 8 + 4 + TOKEN_SIZE;

    pub fn write(&self, pool: &Pool, chain: &mut Chain) -> MmpsResult<()> {
        chain.put_i64(pool, self.signature as i64)?;
        chain.put_i32(pool, self.verdict_code as i32)?;
        chain.put_data(pool, &self.session_token)
    }
}

/// Read once on the anticipant path; registers a new device and hands back its token.
#[derive(Debug, Clone)]
pub struct DialogueAnticipant {
    pub signature: u64,
    pub device_type: u16,
    pub application_build: [u8; 6],
}

impl DialogueAnticipant {
    pub const SIZE: usize = 8 + 2 + 6;

    pub fn read(chain: &mut Chain) -> MmpsResult<DialogueAnticipant> {
        let signature = chain.get_i64()? as u64;
        let device_type = chain.get_i16()? as u16;
        let mut application_build = [0u8; 6];
        application_build.copy_from_slice(&chain.get_data(6)?);
        Ok(DialogueAnticipant {
            signature,
            device_type,
            application_build,
        })
    }
}

/// The "last-known revisions" payload of a `broadcast_subscribe` paquet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Revisions {
    pub on_radar: u32,
    pub in_sight: u32,
    pub on_map: u32,
}

impl Revisions {
    pub const WIRE_SIZE: usize = 12;

    pub fn read(chain: &mut Chain) -> MmpsResult<Revisions> {
        Ok(Revisions {
            on_radar: chain.get_i32()? as u32,
            in_sight: chain.get_i32()? as u32,
            on_map: chain.get_i32()? as u32,
        })
    }

    /// Clamps any channel where the client claims to be ahead of the server back to zero,
    /// treating it as client amnesia, per `spec.md` §4.C.4.
    pub fn clamped_to(mut self, current: Revisions) -> Revisions {
        if self.on_radar > current.on_radar {
            self.on_radar = 0;
        }
        if self.in_sight > current.in_sight {
            self.in_sight = 0;
        }
        if self.on_map > current.on_map {
            self.on_map = 0;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmps::bank::{Bank, BankId};

    fn pool() -> Pool {
        let mut pool = Pool::new();
        pool.add_bank(Bank::new_heap(BankId(0), 256, 0, 8)).unwrap();
        pool
    }

    #[test]
    fn pilot_round_trips() {
        let pool = pool();
        let pilot = PaquetPilot {
            signature: DIALOGUE_SIGNATURE,
            paquet_id: 7,
            command_code: 42,
            command_subcode: 0,
            payload_size: 16,
        };
        let mut chain = Chain::new();
        pilot.write(&pool, &mut chain).unwrap();
        chain.rewind();
        let decoded = PaquetPilot::read(&mut chain).unwrap();
        assert_eq!(decoded, pilot);
    }

    #[test]
    fn revisions_clamp_client_amnesia() {
        let current = Revisions {
            on_radar: 5,
            in_sight: 5,
            on_map: 5,
        };
        let claimed = Revisions {
            on_radar: 9,
            in_sight: 2,
            on_map: 5,
        };
        let clamped = claimed.clamped_to(current);
        assert_eq!(clamped.on_radar, 0);
        assert_eq!(clamped.in_sight, 2);
        assert_eq!(clamped.on_map, 5);
    }
}

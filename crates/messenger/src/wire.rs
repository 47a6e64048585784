//! Two unrelated wire formats live here: the notification record this workspace stores in its
//! own MMPS buffers (an internal format, free to choose), and the APNs legacy/frame formats
//! `spec.md` §6 fixes exactly (`original_source/Messanger/apns.h`'s packed structs).

use byteorder::{BigEndian, ByteOrder};

use mmps::{Buffer, MmpsResult};

pub const DEVICE_TOKEN_SIZE: usize = 32;
pub const MESSAGE_KEY_SIZE: usize = 64;
pub const MESSAGE_ARGUMENTS_SIZE: usize = 1024;

/// What one row of `journal.notifications` decodes to in memory. Stored length-prefixed rather
/// than null-padded to a fixed width, since an `mmps::Buffer` already tracks its own length and
/// there is no wire peer on the other end of this particular format to agree a fixed width with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub notification_id: i64,
    pub device_id: i64,
    pub device_token: [u8; DEVICE_TOKEN_SIZE],
    pub message_key: String,
    pub message_arguments: String,
}

impl NotificationRecord {
    pub fn write(&self, buffer: &mut Buffer) -> MmpsResult<()> {
        buffer.put_i64(self.notification_id)?;
        buffer.put_i64(self.device_id)?;
        buffer.put_data(&self.device_token)?;
        buffer.put_string(&truncate(&self.message_key, MESSAGE_KEY_SIZE))?;
        buffer.put_string(&truncate(&self.message_arguments, MESSAGE_ARGUMENTS_SIZE))
    }

    pub fn read(buffer: &mut Buffer) -> MmpsResult<NotificationRecord> {
        buffer.rewind();
        let notification_id = buffer.get_i64()?;
        let device_id = buffer.get_i64()?;
        let mut device_token = [0u8; DEVICE_TOKEN_SIZE];
        device_token.copy_from_slice(buffer.get_data(DEVICE_TOKEN_SIZE)?);
        let message_key = read_string(buffer)?;
        let message_arguments = read_string(buffer)?;
        Ok(NotificationRecord {
            notification_id,
            device_id,
            device_token,
            message_key,
            message_arguments,
        })
    }
}

fn read_string(buffer: &mut Buffer) -> MmpsResult<String> {
    let len = buffer.get_i16()? as usize;
    let bytes = buffer.get_data(len)?.to_vec();
    String::from_utf8(bytes).map_err(|_| mmps::MmpsError::ChainUnderrun)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Builds the `{"aps": {"alert": {"loc-key": ..., "loc-args": [...]}}}` payload APNs expects.
/// `message_arguments` is a comma-separated list of loc-args, per `journal.notifications`'
/// column of the same name.
pub fn build_payload(message_key: &str, message_arguments: &str) -> Vec<u8> {
    let args: Vec<&str> = if message_arguments.is_empty() {
        Vec::new()
    } else {
        message_arguments.split(',').collect()
    };
    let payload = serde_json::json!({
        "aps": {
            "alert": {
                "loc-key": message_key,
                "loc-args": args,
            },
        },
    });
    serde_json::to_vec(&payload).expect("a json! object always serializes")
}

const COMMAND_LEGACY: u8 = 0;
const COMMAND_FRAME: u8 = 2;
pub const COMMAND_RESPONSE: u8 = 8;

const FRAME_ITEM_DEVICE_TOKEN: u8 = 1;
const FRAME_ITEM_PAYLOAD: u8 = 2;
const FRAME_ITEM_NOTIFICATION_ID: u8 = 3;
const FRAME_ITEM_EXPIRATION: u8 = 4;
const FRAME_ITEM_PRIORITY: u8 = 5;

/// The "send one by one" legacy item: command 0, token length, 32-byte token, payload length,
/// payload. Built as an explicit packed buffer (`spec.md` §9 Open Question 2) rather than a
/// transmuted Rust struct, since the original's `&message` cast only worked because the payload
/// was a trailing C flexible array member, a trick with no safe Rust equivalent.
pub fn encode_legacy_item(device_token: &[u8; DEVICE_TOKEN_SIZE], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 2 + DEVICE_TOKEN_SIZE + 2 + payload.len());
    out.push(COMMAND_LEGACY);
    push_u16(&mut out, DEVICE_TOKEN_SIZE as u16);
    out.extend_from_slice(device_token);
    push_u16(&mut out, payload.len() as u16);
    out.extend_from_slice(payload);
    out
}

/// One notification's worth of frame items: device token, payload, and a footer of
/// notification id / expiration / priority, each tagged with its item id per `apns.h`'s
/// `apnsFrameItem`.
pub fn encode_frame_notification(
    device_token: &[u8; DEVICE_TOKEN_SIZE],
    payload: &[u8],
    notification_id: u32,
    expiration_date: u32,
    priority: u8,
) -> Vec<u8> {
    let mut out = Vec::new();
    push_frame_item(&mut out, FRAME_ITEM_DEVICE_TOKEN, device_token);
    push_frame_item(&mut out, FRAME_ITEM_PAYLOAD, payload);

    let mut id_buf = [0u8; 4];
    BigEndian::write_u32(&mut id_buf, notification_id);
    push_frame_item(&mut out, FRAME_ITEM_NOTIFICATION_ID, &id_buf);

    let mut expiration_buf = [0u8; 4];
    BigEndian::write_u32(&mut expiration_buf, expiration_date);
    push_frame_item(&mut out, FRAME_ITEM_EXPIRATION, &expiration_buf);

    push_frame_item(&mut out, FRAME_ITEM_PRIORITY, &[priority]);
    out
}

/// Wraps one or more `encode_frame_notification` results in the command-2 envelope: command
/// byte, big-endian `u32` frame length, then the concatenated frame data.
pub fn encode_frame(notifications: &[Vec<u8>]) -> Vec<u8> {
    let frame_data: Vec<u8> = notifications.iter().flatten().copied().collect();
    let mut out = Vec::with_capacity(1 + 4 + frame_data.len());
    out.push(COMMAND_FRAME);
    let mut len_buf = [0u8; 4];
    BigEndian::write_u32(&mut len_buf, frame_data.len() as u32);
    out.extend_from_slice(&len_buf);
    out.extend_from_slice(&frame_data);
    out
}

fn push_frame_item(out: &mut Vec<u8>, item_id: u8, data: &[u8]) {
    out.push(item_id);
    push_u16(out, data.len() as u16);
    out.extend_from_slice(data);
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    let mut buf = [0u8; 2];
    BigEndian::write_u16(&mut buf, value);
    out.extend_from_slice(&buf);
}

/// A decoded command-8 APNS error response: status code plus the notification id of the first
/// notification in the batch that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApnsResponse {
    pub status: u8,
    pub notification_id: u32,
}

impl ApnsResponse {
    pub const SIZE: usize = 1 + 1 + 4;

    pub fn decode(bytes: &[u8; Self::SIZE]) -> Option<ApnsResponse> {
        if bytes[0] != COMMAND_RESPONSE {
            return None;
        }
        Some(ApnsResponse {
            status: bytes[1],
            notification_id: BigEndian::read_u32(&bytes[2..6]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmps::bank::{Bank, BankId};
    use mmps::Pool;

    fn pool() -> Pool {
        let mut pool = Pool::new();
        pool.add_bank(Bank::new_heap(BankId(0), 2048, 0, 4)).unwrap();
        pool
    }

    #[test]
    fn a_notification_record_round_trips_through_a_buffer() {
        let pool = pool();
        let mut buffer = pool.peek(BankId(0)).unwrap();
        let record = NotificationRecord {
            notification_id: 11,
            device_id: 22,
            device_token: [7u8; DEVICE_TOKEN_SIZE],
            message_key: "plaque.nearby".into(),
            message_arguments: "Ferry Building,120".into(),
        };
        record.write(&mut buffer).unwrap();
        let decoded = NotificationRecord::read(&mut buffer).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn build_payload_splits_arguments_on_comma() {
        let bytes = build_payload("plaque.nearby", "a,b,c");
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["aps"]["alert"]["loc-key"], "plaque.nearby");
        assert_eq!(value["aps"]["alert"]["loc-args"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn legacy_item_carries_token_and_payload_lengths() {
        let token = [1u8; DEVICE_TOKEN_SIZE];
        let item = encode_legacy_item(&token, b"hi");
        assert_eq!(item[0], COMMAND_LEGACY);
        assert_eq!(BigEndian::read_u16(&item[1..3]) as usize, DEVICE_TOKEN_SIZE);
        assert_eq!(&item[3..3 + DEVICE_TOKEN_SIZE], &token);
        let payload_len_offset = 3 + DEVICE_TOKEN_SIZE;
        assert_eq!(BigEndian::read_u16(&item[payload_len_offset..payload_len_offset + 2]), 2);
        assert_eq!(&item[payload_len_offset + 2..], b"hi");
    }

    #[test]
    fn framed_notification_wraps_into_a_command_two_envelope() {
        let token = [2u8; DEVICE_TOKEN_SIZE];
        let one = encode_frame_notification(&token, b"payload", 5, 0, 10);
        let frame = encode_frame(&[one]);
        assert_eq!(frame[0], COMMAND_FRAME);
        let declared_len = BigEndian::read_u32(&frame[1..5]) as usize;
        assert_eq!(declared_len, frame.len() - 5);
    }

    #[test]
    fn response_decode_rejects_the_wrong_command_code() {
        let bytes = [0u8; ApnsResponse::SIZE];
        assert!(ApnsResponse::decode(&bytes).is_none());
    }

    #[test]
    fn response_decode_reads_status_and_notification_id() {
        let mut bytes = [0u8; ApnsResponse::SIZE];
        bytes[0] = COMMAND_RESPONSE;
        bytes[1] = 8;
        BigEndian::write_u32(&mut bytes[2..6], 99);
        let response = ApnsResponse::decode(&bytes).unwrap();
        assert_eq!(response.status, 8);
        assert_eq!(response.notification_id, 99);
    }
}

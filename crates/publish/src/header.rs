//! Registry header framing.
//!
//! Every published record starts with an 18-byte header so consumers can
//! find the schema version without out-of-band information:
//!
//! ```text
//! +---------+-------------+------------------------------+----------------+
//! | 0x03    | 0x00        | schema version id (16 bytes) | avro datum ... |
//! | version | compression | big-endian UUID              |                |
//! +---------+-------------+------------------------------+----------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::HeaderError;

pub const HEADER_VERSION: u8 = 0x03;
pub const COMPRESSION_NONE: u8 = 0x00;
pub const HEADER_LEN: usize = 18;

/// Decoded header of a wrapped record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub version: u8,
    pub compression: u8,
    pub schema_version_id: Uuid,
}

/// Prefix `payload` with the header for `schema_version_id`.
pub fn wrap_payload(schema_version_id: Uuid, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(HEADER_VERSION);
    buf.put_u8(COMPRESSION_NONE);
    buf.put_slice(schema_version_id.as_bytes());
    buf.put_slice(payload);
    buf.freeze()
}

/// Split a wrapped record into its header and the payload that follows.
pub fn decode_header(data: &[u8]) -> Result<(RecordHeader, &[u8]), HeaderError> {
    if data.len() < HEADER_LEN {
        return Err(HeaderError::TooShort {
            len: data.len(),
            expected: HEADER_LEN,
        });
    }
    let (head, payload) = data.split_at(HEADER_LEN);
    if head[0] != HEADER_VERSION {
        return Err(HeaderError::UnknownVersion(head[0]));
    }
    if head[1] != COMPRESSION_NONE {
        return Err(HeaderError::UnsupportedCompression(head[1]));
    }
    let mut id = [0u8; 16];
    id.copy_from_slice(&head[2..HEADER_LEN]);
    Ok((
        RecordHeader {
            version: head[0],
            compression: head[1],
            schema_version_id: Uuid::from_bytes(id),
        },
        payload,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_layout() {
        let id = Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);
        let wrapped = wrap_payload(id, &[0x06, b'A']);
        assert_eq!(wrapped.len(), HEADER_LEN + 2);
        assert_eq!(&wrapped[..2], &[0x03, 0x00]);
        assert_eq!(&wrapped[2..18], id.as_bytes());
        assert_eq!(&wrapped[18..], &[0x06, b'A']);

        let (header, payload) = decode_header(&wrapped).expect("decode");
        assert_eq!(header.schema_version_id, id);
        assert_eq!(payload, &[0x06, b'A']);
    }

    #[test]
    fn rejects_bad_headers() {
        assert_eq!(
            decode_header(&[0x03, 0x00]),
            Err(HeaderError::TooShort {
                len: 2,
                expected: HEADER_LEN
            })
        );
        let mut data = wrap_payload(Uuid::nil(), b"x").to_vec();
        data[0] = 0x02;
        assert_eq!(decode_header(&data), Err(HeaderError::UnknownVersion(0x02)));
        data[0] = HEADER_VERSION;
        data[1] = 0x05;
        assert_eq!(
            decode_header(&data),
            Err(HeaderError::UnsupportedCompression(0x05))
        );
    }

    #[test]
    fn empty_payload_is_header_only() {
        let wrapped = wrap_payload(Uuid::nil(), &[]);
        let (_, payload) = decode_header(&wrapped).expect("decode");
        assert!(payload.is_empty());
    }
}

//! On-disk blob framing.
//!
//! ```text
//! +--------+-------+-----------------+---------+
//! | "HVB1" | flags | original len LE | payload |
//! | 4      | 1     | 8               | ...     |
//! +--------+-------+-----------------+---------+
//! ```

use hvcs_compress::codec;
use hvcs_types::ObjectId;

use crate::error::{StoreError, StoreResult};

pub const BLOB_MAGIC: [u8; 4] = *b"HVB1";

/// Flag bit: payload is a zstd frame.
pub const FLAG_COMPRESSED: u8 = 0x01;

pub const HEADER_LEN: usize = 4 + 1 + 8;

/// Decoded blob header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlobHeader {
    pub flags: u8,
    pub original_len: u64,
}

impl BlobHeader {
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&BLOB_MAGIC);
        out[4] = self.flags;
        out[5..].copy_from_slice(&self.original_len.to_le_bytes());
        out
    }

    /// Parse the header at the front of `bytes`.
    pub fn parse(id: &ObjectId, bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(corrupt(id, format!("file is {} bytes, shorter than header", bytes.len())));
        }
        if bytes[..4] != BLOB_MAGIC {
            return Err(corrupt(id, "bad magic".into()));
        }
        let flags = bytes[4];
        if flags & !FLAG_COMPRESSED != 0 {
            return Err(corrupt(id, format!("unknown flags {flags:#04x}")));
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[5..HEADER_LEN]);
        Ok(Self {
            flags,
            original_len: u64::from_le_bytes(len),
        })
    }
}

/// Frame a payload. `compressed` holds the zstd frame when compression won.
pub fn encode(original: &[u8], compressed: Option<Vec<u8>>) -> Vec<u8> {
    let (flags, payload) = match compressed {
        Some(frame) => (FLAG_COMPRESSED, frame),
        None => (0, original.to_vec()),
    };
    let header = BlobHeader {
        flags,
        original_len: original.len() as u64,
    };
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Unframe and, if flagged, decompress. Does not verify the hash.
pub fn decode(id: &ObjectId, bytes: &[u8]) -> StoreResult<Vec<u8>> {
    let header = BlobHeader::parse(id, bytes)?;
    let payload = &bytes[HEADER_LEN..];
    if header.is_compressed() {
        return Ok(codec::decompress_exact(payload, header.original_len)?);
    }
    if payload.len() as u64 != header.original_len {
        return Err(corrupt(
            id,
            format!("header says {} bytes, payload has {}", header.original_len, payload.len()),
        ));
    }
    Ok(payload.to_vec())
}

/// Keep a compressed frame only when it is actually smaller.
pub fn pick_smaller(original: &[u8], frame: Vec<u8>) -> Option<Vec<u8>> {
    (frame.len() < original.len()).then_some(frame)
}

fn corrupt(id: &ObjectId, reason: String) -> StoreError {
    StoreError::CorruptObject { id: *id, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ObjectId {
        ObjectId::from_bytes(b"x")
    }

    #[test]
    fn raw_frame_roundtrip() {
        let framed = encode(b"plain", None);
        assert_eq!(&framed[..4], b"HVB1");
        assert_eq!(framed[4], 0);
        assert_eq!(framed.len(), HEADER_LEN + 5);
        assert_eq!(decode(&id(), &framed).unwrap(), b"plain");
    }

    #[test]
    fn compressed_frame_roundtrip() {
        let data = vec![7u8; 4096];
        let frame = codec::compress(&data, 3).unwrap();
        let framed = encode(&data, Some(frame));
        let header = BlobHeader::parse(&id(), &framed).unwrap();
        assert!(header.is_compressed());
        assert_eq!(header.original_len, 4096);
        assert_eq!(decode(&id(), &framed).unwrap(), data);
    }

    #[test]
    fn truncated_and_bad_magic_are_corrupt() {
        assert!(matches!(
            decode(&id(), b"HVB"),
            Err(StoreError::CorruptObject { .. })
        ));
        let mut framed = encode(b"abc", None);
        framed[0] = b'X';
        assert!(matches!(
            decode(&id(), &framed),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn length_mismatch_in_raw_payload_is_corrupt() {
        let mut framed = encode(b"abc", None);
        framed.push(b'!');
        assert!(matches!(
            decode(&id(), &framed),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn pick_smaller_drops_expanding_frames() {
        assert!(pick_smaller(b"ab", vec![0; 10]).is_none());
        assert_eq!(pick_smaller(&[0; 10], vec![1, 2]), Some(vec![1, 2]));
    }
}

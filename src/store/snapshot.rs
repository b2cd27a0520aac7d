//! Snapshot framing for the in-memory store
//!
//! Format: `magic(4) | version(u32 LE) | payload_len(u64 LE) | crc32(u32 LE) | payload`
//! where payload is the bincode encoding of every table.

use super::memory::MemTable;
use crate::{MpttError, Result};
use std::collections::HashMap;

const MAGIC: &[u8; 4] = b"MPTT";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 8 + 4;

pub(crate) fn encode(tables: &HashMap<String, MemTable>) -> Result<Vec<u8>> {
    let payload = bincode::serialize(tables)?;
    let checksum = crc32fast::hash(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&checksum.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<HashMap<String, MemTable>> {
    if bytes.len() < HEADER_LEN {
        return Err(MpttError::Corruption(format!(
            "snapshot too short: {} bytes",
            bytes.len()
        )));
    }

    if &bytes[0..4] != MAGIC {
        return Err(MpttError::Corruption("bad snapshot magic".to_string()));
    }

    let version = u32::from_le_bytes(read_array(&bytes[4..8]));
    if version != VERSION {
        return Err(MpttError::Corruption(format!(
            "unsupported snapshot version {}",
            version
        )));
    }

    let len = u64::from_le_bytes(read_array(&bytes[8..16])) as usize;
    let expected = u32::from_le_bytes(read_array(&bytes[16..20]));
    let payload = &bytes[HEADER_LEN..];

    if payload.len() != len {
        return Err(MpttError::Corruption(format!(
            "snapshot length mismatch: header says {}, found {}",
            len,
            payload.len()
        )));
    }

    let actual = crc32fast::hash(payload);
    if actual != expected {
        return Err(MpttError::Corruption(format!(
            "snapshot checksum mismatch: expected {:08x}, got {:08x}",
            expected, actual
        )));
    }

    Ok(bincode::deserialize(payload)?)
}

fn read_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(slice);
    buf
}

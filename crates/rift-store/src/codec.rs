//! Framed record encoding shared by every durable vault record.
//!
//! On-disk format:
//! ```text
//! [4 bytes: magic tag]
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode)]
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Header size: 4 bytes magic + 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 12;

/// Four-byte tag identifying the kind of record in a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordMagic(pub [u8; 4]);

impl RecordMagic {
    /// The global template directory.
    pub const TEMPLATES: Self = Self(*b"RFTD");
    /// A single owner's ledger.
    pub const LEDGER: Self = Self(*b"RFLG");
}

/// Serialize `value` with bincode and wrap it in a checksummed frame.
pub fn encode_framed<T: Serialize>(magic: RecordMagic, value: &T) -> StoreResult<Vec<u8>> {
    let payload =
        bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len()).map_err(|_| StoreError::Serialization(format!(
        "record payload of {} bytes exceeds frame limit",
        payload.len()
    )))?;
    let crc = crc32fast::hash(&payload);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&magic.0);
    out.extend_from_slice(&length.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Validate a frame and deserialize its payload.
pub fn decode_framed<T: DeserializeOwned>(magic: RecordMagic, bytes: &[u8]) -> StoreResult<T> {
    if bytes.len() < HEADER_SIZE {
        return Err(StoreError::Corrupt {
            reason: format!("record of {} bytes is shorter than its header", bytes.len()),
        });
    }
    if bytes[..4] != magic.0 {
        return Err(StoreError::Corrupt {
            reason: format!(
                "bad magic {:?}, expected {:?}",
                String::from_utf8_lossy(&bytes[..4]),
                String::from_utf8_lossy(&magic.0)
            ),
        });
    }

    let length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let expected_crc = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != length {
        return Err(StoreError::Corrupt {
            reason: format!("length field {length} but {} payload bytes", payload.len()),
        });
    }

    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(StoreError::Corrupt {
            reason: format!("CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"),
        });
    }

    bincode::deserialize(payload).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Replace `path` with `bytes` atomically.
///
/// The data is written and synced to a temporary file in the destination
/// directory, then renamed over the destination, so readers observe either
/// the old record or the new one, never a torn write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        reason: e.error.to_string(),
    })?;

    debug!(path = %path.display(), len = bytes.len(), "record written");
    Ok(())
}

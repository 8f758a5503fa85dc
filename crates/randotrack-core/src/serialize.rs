//! Binary encoding of [`WorldSnapshot`]s via `bitcode` with a versioned
//! header, for sinks that move snapshots across an isolation boundary.

use crate::query::WorldSnapshot;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying an encoded tracker snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x5254_0003;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SnapshotEncodeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotDecodeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Engine recompute counter when the snapshot was taken.
    pub sequence: u64,
}

impl SnapshotHeader {
    pub fn new(sequence: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            sequence,
        }
    }

    pub fn validate(&self) -> Result<(), SnapshotDecodeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(SnapshotDecodeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(SnapshotDecodeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(SnapshotDecodeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct EncodedRef<'a> {
    header: SnapshotHeader,
    snapshot: &'a WorldSnapshot,
}

#[derive(Deserialize)]
struct Encoded {
    header: SnapshotHeader,
    snapshot: WorldSnapshot,
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

pub fn encode(snapshot: &WorldSnapshot, sequence: u64) -> Result<Vec<u8>, SnapshotEncodeError> {
    let envelope = EncodedRef {
        header: SnapshotHeader::new(sequence),
        snapshot,
    };
    bitcode::serialize(&envelope).map_err(|e| SnapshotEncodeError::Encode(e.to_string()))
}

/// Decode and validate. Returns the header alongside the snapshot.
pub fn decode(data: &[u8]) -> Result<(SnapshotHeader, WorldSnapshot), SnapshotDecodeError> {
    let envelope: Encoded =
        bitcode::deserialize(data).map_err(|e| SnapshotDecodeError::Decode(e.to_string()))?;
    envelope.header.validate()?;
    Ok((envelope.header, envelope.snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gated_world, new_engine};

    #[test]
    fn header_validation() {
        assert!(SnapshotHeader::new(0).validate().is_ok());

        let mut bad = SnapshotHeader::new(0);
        bad.magic = 0xDEAD_BEEF;
        assert!(matches!(bad.validate(), Err(SnapshotDecodeError::InvalidMagic(0xDEAD_BEEF))));

        let mut future = SnapshotHeader::new(0);
        future.version = FORMAT_VERSION + 1;
        assert!(matches!(future.validate(), Err(SnapshotDecodeError::FutureVersion(_))));

        let mut old = SnapshotHeader::new(0);
        old.version = 0;
        assert!(matches!(old.validate(), Err(SnapshotDecodeError::UnsupportedVersion(0))));
    }

    #[test]
    fn engine_snapshot_survives_encoding() {
        let mut engine = new_engine(gated_world());
        engine.add_item_to_inventory("Key");
        let snapshot = engine.get_snapshot();

        let bytes = encode(&snapshot, engine.recompute_count()).unwrap();
        let (header, decoded) = decode(&bytes).unwrap();
        assert_eq!(header.sequence, engine.recompute_count());
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            decode(&[1, 2, 3]),
            Err(SnapshotDecodeError::Decode(_))
        ));
    }
}

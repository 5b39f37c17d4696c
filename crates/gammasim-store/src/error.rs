//! Error types for the event store.

use gammasim_core::SamplingError;
use gammasim_types::ObservationId;

/// Errors that can occur reading or writing event files and indexes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata or index JSON could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The file does not start with the event-file magic bytes.
    #[error("not an event file: magic bytes {found:?}")]
    BadMagic {
        /// The four bytes found instead.
        found: [u8; 4],
    },

    /// The file was written by an unknown format version.
    #[error("unsupported event file version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version byte in the file.
        found: u8,
        /// Version this build reads.
        expected: u8,
    },

    /// The stored checksum does not match the content.
    #[error("CRC mismatch: stored={stored:08x}, computed={computed:08x} (data corrupted)")]
    ChecksumMismatch {
        /// Checksum read from the file.
        stored: u32,
        /// Checksum of the bytes read.
        computed: u32,
    },

    /// The file ends before a block is complete.
    #[error("truncated event file while reading {what}")]
    Truncated {
        /// The block being read.
        what: &'static str,
    },

    /// A block is structurally invalid.
    #[error("malformed {what} block: {reason}")]
    Malformed {
        /// The block being read.
        what: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Decoded parts do not form a valid event table.
    #[error("invalid event table: {0}")]
    Table(#[from] SamplingError),

    /// An observation is already present in the index.
    #[error("observation {0} is already indexed")]
    DuplicateObservation(ObservationId),
}

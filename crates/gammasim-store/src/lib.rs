//! Persistence for simulated event tables.
//!
//! # Modules
//!
//! - [`codec`] -- Checksummed binary frame with column blocks, a JSON
//!   metadata block and a GTI block.
//! - [`file`] -- Atomic event file writes and reads.
//! - [`index`] -- [`ObservationIndex`] of per-observation event files.
//! - [`error`] -- [`StoreError`].
//!
//! [`ObservationIndex`]: index::ObservationIndex
//! [`StoreError`]: error::StoreError

pub mod codec;
pub mod error;
pub mod file;
pub mod index;

pub use codec::{decode_table, encode_table};
pub use error::StoreError;
pub use file::{event_file_name, read_event_file, write_event_file};
pub use index::{ObservationEntry, ObservationIndex};

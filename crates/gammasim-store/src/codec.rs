//! Binary codec for event tables.
//!
//! An event file is a single checksummed frame:
//!
//! ```text
//! [magic: "GSEV"][version: 1 byte]
//! [meta length: u32 LE][meta: JSON]
//! [event count N: u64 LE]
//! [true_lon: N x f64][true_lat: N x f64][true_energy: N x f64]
//! [reco_lon: N x f64][reco_lat: N x f64][reco_energy: N x f64]
//! [time: N x f64][component_id: N x u32][event_id: N x u64]
//! [GTI tag: "GTI\0"][interval count: u32 LE][start: f64, stop: f64]...
//! [crc32 of everything above: u32 LE]
//! ```
//!
//! Integers and floats are little-endian; floats are stored as their raw
//! bits, so a round trip is exact. The metadata is JSON for forward
//! compatibility with added fields.

use crc32fast::Hasher;

use gammasim_core::gti::{GoodTimeIntervals, TimeInterval};
use gammasim_core::{EventTable, EventTableMeta};
use gammasim_types::{ComponentId, Event, EventId, SkyCoord};

use crate::error::StoreError;

/// Magic bytes identifying event files.
pub const MAGIC: [u8; 4] = *b"GSEV";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Tag opening the GTI block.
const GTI_TAG: [u8; 4] = *b"GTI\0";

/// Bytes per event across all columns.
const EVENT_WIDTH: usize = 7 * 8 + 4 + 8;

/// Upper bound on the metadata block (16 MiB).
const MAX_META_SIZE: usize = 16 * 1024 * 1024;

/// Encode an event table into a checksummed frame.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the metadata cannot be
/// serialized, or [`StoreError::Malformed`] if a block exceeds its length
/// field.
pub fn encode_table(table: &EventTable) -> Result<Vec<u8>, StoreError> {
    let meta = serde_json::to_vec(table.meta())?;
    let meta_len = u32::try_from(meta.len()).map_err(|err| StoreError::Malformed {
        what: "metadata",
        reason: format!("{} bytes: {err}", meta.len()),
    })?;
    let events = table.events();
    let intervals = table.gti().intervals();
    let interval_count = u32::try_from(intervals.len()).map_err(|err| StoreError::Malformed {
        what: "gti",
        reason: format!("{} intervals: {err}", intervals.len()),
    })?;

    let capacity = events
        .len()
        .saturating_mul(EVENT_WIDTH)
        .saturating_add(meta.len())
        .saturating_add(intervals.len().saturating_mul(16))
        .saturating_add(32);
    let mut out = Vec::with_capacity(capacity);

    out.extend_from_slice(&MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&meta_len.to_le_bytes());
    out.extend_from_slice(&meta);
    out.extend_from_slice(&table.meta().total_events.to_le_bytes());

    let columns: [fn(&Event) -> f64; 7] = [
        |e| e.true_position.lon,
        |e| e.true_position.lat,
        |e| e.true_energy,
        |e| e.reco_position.lon,
        |e| e.reco_position.lat,
        |e| e.reco_energy,
        |e| e.time,
    ];
    for column in columns {
        for event in events {
            out.extend_from_slice(&column(event).to_le_bytes());
        }
    }
    for event in events {
        out.extend_from_slice(&event.component_id.into_inner().to_le_bytes());
    }
    for event in events {
        out.extend_from_slice(&event.event_id.into_inner().to_le_bytes());
    }

    out.extend_from_slice(&GTI_TAG);
    out.extend_from_slice(&interval_count.to_le_bytes());
    for interval in intervals {
        out.extend_from_slice(&interval.start.to_le_bytes());
        out.extend_from_slice(&interval.stop.to_le_bytes());
    }

    let crc = checksum(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Decode a frame produced by [`encode_table`].
///
/// The checksum is verified before anything else is interpreted.
///
/// # Errors
///
/// Returns [`StoreError::Truncated`], [`StoreError::ChecksumMismatch`],
/// [`StoreError::BadMagic`], [`StoreError::UnsupportedVersion`] or
/// [`StoreError::Malformed`] for damaged input, and [`StoreError::Table`]
/// if the decoded parts are inconsistent.
pub fn decode_table(bytes: &[u8]) -> Result<EventTable, StoreError> {
    let body_len = bytes
        .len()
        .checked_sub(4)
        .ok_or(StoreError::Truncated { what: "checksum" })?;
    let (body, crc_bytes) = bytes.split_at(body_len);
    let stored = u32::from_le_bytes(to_array(crc_bytes, "checksum")?);
    let computed = checksum(body);
    if stored != computed {
        return Err(StoreError::ChecksumMismatch { stored, computed });
    }

    let mut reader = BlockReader::new(body);

    let magic = to_array(reader.take(4, "header")?, "header")?;
    if magic != MAGIC {
        return Err(StoreError::BadMagic { found: magic });
    }
    let version = reader.read_u8("header")?;
    if version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let meta_len = usize::try_from(reader.read_u32("metadata")?).unwrap_or(usize::MAX);
    if meta_len > MAX_META_SIZE {
        return Err(StoreError::Malformed {
            what: "metadata",
            reason: format!("size {meta_len} exceeds maximum {MAX_META_SIZE}"),
        });
    }
    let meta: EventTableMeta = serde_json::from_slice(reader.take(meta_len, "metadata")?)?;

    let count = usize::try_from(reader.read_u64("events")?).map_err(|err| StoreError::Malformed {
        what: "events",
        reason: err.to_string(),
    })?;
    if count.checked_mul(EVENT_WIDTH).is_none_or(|needed| needed > reader.remaining()) {
        return Err(StoreError::Truncated { what: "events" });
    }

    let mut columns: [Vec<f64>; 7] = Default::default();
    for column in &mut columns {
        *column = reader.read_f64_column(count, "events")?;
    }
    let mut component_ids = Vec::with_capacity(count);
    for _ in 0..count {
        component_ids.push(ComponentId::new(reader.read_u32("events")?));
    }
    let mut event_ids = Vec::with_capacity(count);
    for _ in 0..count {
        event_ids.push(EventId::new(reader.read_u64("events")?));
    }

    let [true_lon, true_lat, true_energy, reco_lon, reco_lat, reco_energy, time] = columns;
    let events = component_ids
        .into_iter()
        .zip(event_ids)
        .enumerate()
        .map(|(row, (component_id, event_id))| {
            let at = |column: &[f64]| column.get(row).copied().unwrap_or(f64::NAN);
            Event {
                event_id,
                component_id,
                true_position: SkyCoord {
                    lon: at(&true_lon),
                    lat: at(&true_lat),
                },
                true_energy: at(&true_energy),
                reco_position: SkyCoord {
                    lon: at(&reco_lon),
                    lat: at(&reco_lat),
                },
                reco_energy: at(&reco_energy),
                time: at(&time),
            }
        })
        .collect();

    let tag = to_array(reader.take(4, "gti")?, "gti")?;
    if tag != GTI_TAG {
        return Err(StoreError::Malformed {
            what: "gti",
            reason: format!("unexpected tag {tag:?}"),
        });
    }
    let interval_count = usize::try_from(reader.read_u32("gti")?).unwrap_or(usize::MAX);
    if interval_count.checked_mul(16).is_none_or(|needed| needed > reader.remaining()) {
        return Err(StoreError::Truncated { what: "gti" });
    }
    let mut intervals = Vec::with_capacity(interval_count);
    for _ in 0..interval_count {
        let start = reader.read_f64("gti")?;
        let stop = reader.read_f64("gti")?;
        intervals.push(TimeInterval { start, stop });
    }
    let gti = GoodTimeIntervals::new(intervals)?;

    if reader.remaining() != 0 {
        return Err(StoreError::Malformed {
            what: "trailer",
            reason: format!("{} unexpected bytes before the checksum", reader.remaining()),
        });
    }

    Ok(EventTable::from_parts(meta, gti, events)?)
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

fn to_array<const N: usize>(bytes: &[u8], what: &'static str) -> Result<[u8; N], StoreError> {
    bytes.try_into().ok().ok_or(StoreError::Truncated { what })
}

/// Cursor over the body of a frame.
struct BlockReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BlockReader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    const fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.position)
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], StoreError> {
        let end = self
            .position
            .checked_add(len)
            .ok_or(StoreError::Truncated { what })?;
        let slice = self
            .bytes
            .get(self.position..end)
            .ok_or(StoreError::Truncated { what })?;
        self.position = end;
        Ok(slice)
    }

    fn read_u8(&mut self, what: &'static str) -> Result<u8, StoreError> {
        Ok(u8::from_le_bytes(to_array(self.take(1, what)?, what)?))
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, StoreError> {
        Ok(u32::from_le_bytes(to_array(self.take(4, what)?, what)?))
    }

    fn read_u64(&mut self, what: &'static str) -> Result<u64, StoreError> {
        Ok(u64::from_le_bytes(to_array(self.take(8, what)?, what)?))
    }

    fn read_f64(&mut self, what: &'static str) -> Result<f64, StoreError> {
        Ok(f64::from_le_bytes(to_array(self.take(8, what)?, what)?))
    }

    fn read_f64_column(&mut self, count: usize, what: &'static str) -> Result<Vec<f64>, StoreError> {
        let mut column = Vec::with_capacity(count);
        for _ in 0..count {
            column.push(self.read_f64(what)?);
        }
        Ok(column)
    }
}

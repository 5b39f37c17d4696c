//! Observation index.
//!
//! Multi-observation campaigns write one event file per observation. The
//! [`ObservationIndex`] records, per observation id, which file holds its
//! events and a short summary, and is persisted as JSON alongside the
//! files. An observation id appears at most once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use gammasim_core::EventTable;
use gammasim_types::ObservationId;

use crate::error::StoreError;

/// Index record of one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEntry {
    /// Observation identifier.
    pub obs_id: ObservationId,
    /// Simulated object.
    pub object_name: String,
    /// Event file, relative to the index location.
    pub file: PathBuf,
    /// Number of events in the file.
    pub total_events: u64,
    /// Live time in seconds.
    pub livetime: f64,
    /// Start of the first good time interval.
    pub tstart: f64,
    /// Stop of the last good time interval.
    pub tstop: f64,
    /// Seed the observation was sampled with.
    pub seed: u64,
    /// Creation time of the event table.
    pub created_at: DateTime<Utc>,
}

impl ObservationEntry {
    /// Summarise `table`, stored at `file`.
    pub fn from_table(table: &EventTable, file: impl Into<PathBuf>) -> Self {
        let meta = table.meta();
        Self {
            obs_id: meta.obs_id,
            object_name: meta.object_name.clone(),
            file: file.into(),
            total_events: meta.total_events,
            livetime: meta.livetime,
            tstart: table.gti().start(),
            tstop: table.gti().stop(),
            seed: meta.seed,
            created_at: meta.created_at,
        }
    }
}

/// Observations keyed by id, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ObservationEntry>", into = "Vec<ObservationEntry>")]
pub struct ObservationIndex {
    entries: BTreeMap<ObservationId, ObservationEntry>,
}

impl ObservationIndex {
    /// Create an empty index.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add an observation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateObservation`] if the id is already
    /// indexed; the index is left unchanged.
    pub fn insert(&mut self, entry: ObservationEntry) -> Result<(), StoreError> {
        if self.entries.contains_key(&entry.obs_id) {
            return Err(StoreError::DuplicateObservation(entry.obs_id));
        }
        self.entries.insert(entry.obs_id, entry);
        Ok(())
    }

    /// Merge another index into this one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateObservation`] for the first id present
    /// in both; nothing is merged in that case.
    pub fn merge(&mut self, other: Self) -> Result<(), StoreError> {
        if let Some(id) = other.entries.keys().find(|id| self.entries.contains_key(id)) {
            return Err(StoreError::DuplicateObservation(*id));
        }
        self.entries.extend(other.entries);
        Ok(())
    }

    /// Look up an observation.
    pub fn get(&self, obs_id: ObservationId) -> Option<&ObservationEntry> {
        self.entries.get(&obs_id)
    }

    /// Entries in ascending observation id order.
    pub fn iter(&self) -> impl Iterator<Item = &ObservationEntry> {
        self.entries.values()
    }

    /// Number of indexed observations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Events across all observations.
    pub fn total_events(&self) -> u64 {
        self.entries
            .values()
            .fold(0_u64, |sum, entry| sum.saturating_add(entry.total_events))
    }

    /// Live time across all observations.
    pub fn total_livetime(&self) -> f64 {
        self.entries.values().map(|entry| entry.livetime).sum()
    }

    /// Write the index as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] or [`StoreError::Io`].
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), observations = self.len(), "Observation index written");
        Ok(())
    }

    /// Read an index written by [`ObservationIndex::save`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read and
    /// [`StoreError::Serialization`] if it is malformed or repeats an id.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let json = std::fs::read(path)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl TryFrom<Vec<ObservationEntry>> for ObservationIndex {
    type Error = StoreError;

    fn try_from(entries: Vec<ObservationEntry>) -> Result<Self, Self::Error> {
        let mut index = Self::new();
        for entry in entries {
            index.insert(entry)?;
        }
        Ok(index)
    }
}

impl From<ObservationIndex> for Vec<ObservationEntry> {
    fn from(index: ObservationIndex) -> Self {
        index.entries.into_values().collect()
    }
}

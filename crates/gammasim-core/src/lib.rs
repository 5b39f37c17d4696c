//! Event sampling engine for simulated gamma-ray observations.
//!
//! This crate turns expected-counts maps of model components into an
//! ordered table of individual photon events, each carrying true and
//! reconstructed direction and energy, an arrival time and the identifier
//! of the component it came from. A run is single-threaded and
//! reproducible bit for bit from its seed.
//!
//! # Modules
//!
//! - [`geom`] -- Energy, linear and time axes and the sky pixel grid.
//! - [`gti`] -- Good time intervals and active-time sampling.
//! - [`map`] -- Expected-counts maps and realised cell counts.
//! - [`irf`] -- PSF and energy-dispersion kernel tables.
//! - [`observation`] -- Read-only observation context.
//! - [`provider`] -- [`PredictedCounts`] trait and model components.
//! - [`rng`] -- Seeded random state.
//! - [`discrete`] -- Per-cell count realisation.
//! - [`resample`] -- Sub-cell placement of photons.
//! - [`response`] -- PSF and energy-dispersion perturbation.
//! - [`temporal`] -- Arrival times within good time intervals.
//! - [`compositor`] -- Batch concatenation and event numbering.
//! - [`table`] -- The output [`EventTable`] and its metadata.
//! - [`run`] -- The staged sampling pipeline for one observation.
//! - [`fake`] -- Binned fake counts, including on/off.
//! - [`summary`] -- Counts and rate summary of a table.
//! - [`config`] -- Campaign configuration from YAML.
//!
//! [`PredictedCounts`]: provider::PredictedCounts
//! [`EventTable`]: table::EventTable

pub mod compositor;
pub mod config;
pub mod discrete;
pub mod error;
pub mod fake;
pub mod geom;
pub mod gti;
pub mod irf;
pub mod map;
pub mod observation;
pub mod provider;
pub mod resample;
pub mod response;
pub mod rng;
pub mod run;
pub mod summary;
pub mod table;
pub mod temporal;

pub use error::{ErrorClass, SamplingError};
pub use run::{sample_events, EventSampler, RunStage, SamplerConfig};
pub use table::{EventTable, EventTableMeta};

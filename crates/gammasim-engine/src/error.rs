//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of a campaign so that `main`
//! can propagate with `?`.

use std::path::PathBuf;

use gammasim_types::ObservationId;

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: gammasim_core::config::ConfigError,
    },

    /// The input bundle could not be read.
    #[error("failed to read input bundle {path}: {source}")]
    BundleIo {
        /// Bundle location.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The input bundle is not valid JSON or violates an input invariant.
    #[error("failed to parse input bundle {path}: {source}")]
    BundleParse {
        /// Bundle location.
        path: PathBuf,
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// The configuration selects an observation the bundle does not hold.
    #[error("observation {0} is not in the input bundle")]
    UnknownObservation(ObservationId),

    /// The configuration lists an observation more than once.
    #[error("observation {0} is selected more than once")]
    DuplicateSelection(ObservationId),

    /// Sampling an observation failed.
    #[error("sampling observation {obs_id} failed: {source}")]
    Sampling {
        /// The observation being sampled.
        obs_id: ObservationId,
        /// The underlying sampling error.
        source: gammasim_core::SamplingError,
    },

    /// Writing event files or the index failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: gammasim_store::StoreError,
    },

    /// Creating the output directory failed.
    #[error("failed to prepare output directory {path}: {source}")]
    OutputDir {
        /// Directory location.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The worker pool was shut down before a permit was granted.
    #[error("worker pool closed: {0}")]
    Scheduler(#[from] tokio::sync::AcquireError),

    /// A sampling worker panicked or was cancelled.
    #[error("sampling worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

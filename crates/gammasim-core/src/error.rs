//! Error types for the `gammasim-core` crate.
//!
//! Every fallible sampling operation returns [`SamplingError`]. Errors fall
//! into two classes (see [`ErrorClass`]): precondition violations detected
//! before any random draw, and resource failures from external providers
//! which are passed through unchanged. Kernel domain violations are not
//! errors; they are handled by the configured policy and counted.

use gammasim_types::{ComponentId, ComponentKind};

/// Broad classification of a [`SamplingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input detected before sampling started.
    Precondition,
    /// An external map or kernel could not be materialised.
    Resource,
}

/// Errors that abort a sampling run.
#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    /// A cell holds a negative or non-finite expected count.
    #[error("invalid intensity {value} in component {component} at cell {cell}")]
    InvalidIntensity {
        /// Component whose map is malformed.
        component: ComponentId,
        /// Flat cell index.
        cell: usize,
        /// The offending value.
        value: f64,
    },

    /// An axis has fewer than two edges, non-increasing edges, or
    /// non-finite/non-positive values where positivity is required.
    #[error("degenerate {axis} axis: {reason}")]
    DegenerateAxis {
        /// Name of the axis.
        axis: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The data array does not match the product of the axis lengths.
    #[error("shape mismatch in {what}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// Which array is mismatched.
        what: &'static str,
        /// Number of values implied by the axes.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// The observation has no good time interval.
    #[error("good time interval set is empty")]
    EmptyGti,

    /// A good time interval is not a finite, positive-length range.
    #[error("invalid good time interval [{start}, {stop})")]
    InvalidGti {
        /// Interval start in seconds.
        start: f64,
        /// Interval stop in seconds.
        stop: f64,
    },

    /// A time bin carries intensity but does not overlap any good time interval.
    #[error("time bin {bin} of component {component} has intensity but no active time")]
    InactiveTimeBin {
        /// Component whose map is affected.
        component: ComponentId,
        /// Index of the time bin.
        bin: usize,
    },

    /// A response kernel table is malformed.
    #[error("invalid {kernel} kernel: {reason}")]
    InvalidKernel {
        /// Which kernel (`psf` or `edisp`).
        kernel: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A scalar parameter is outside its allowed range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The offending value.
        value: f64,
    },

    /// The run configuration does not name the output object.
    #[error("object name must be configured explicitly")]
    MissingObjectName,

    /// Two components share one Monte-Carlo identifier.
    #[error("duplicate component id {0}")]
    DuplicateComponent(ComponentId),

    /// Identifier 0 used by a source, or a background under another id.
    #[error("component {component} of kind {kind:?}: id 0 is reserved for the background")]
    InvalidComponentId {
        /// The offending identifier.
        component: ComponentId,
        /// Kind the component was registered with.
        kind: ComponentKind,
    },

    /// Two tables being stacked disagree on a component's identity.
    #[error("component {0} is mapped differently in the stacked tables")]
    ConflictingComponent(ComponentId),

    /// A predicted-counts provider failed to evaluate its map.
    #[error("failed to evaluate predicted counts for component {component}: {source}")]
    Resource {
        /// Component whose provider failed.
        component: ComponentId,
        /// The provider's own error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SamplingError {
    /// Classify this error.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Resource { .. } => ErrorClass::Resource,
            _ => ErrorClass::Precondition,
        }
    }
}

//! Read-only observation context for one sampling run.

use serde::{Deserialize, Serialize};

use gammasim_types::{ObservationId, SkyCoord};

use crate::error::SamplingError;
use crate::gti::GoodTimeIntervals;
use crate::irf::{EdispTable, PsfTable};

/// Everything the sampler needs to know about one observation.
///
/// Time axes of intensity maps are expressed relative to `start_time`; GTIs
/// and sampled arrival times are absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationContext {
    /// Observation identifier.
    pub obs_id: ObservationId,
    /// Telescope pointing direction.
    pub pointing: SkyCoord,
    /// Dead-time corrected observation time in seconds.
    pub livetime: f64,
    /// Absolute start time in seconds; reference for map time axes.
    pub start_time: f64,
    /// Good time intervals in absolute seconds.
    pub gti: GoodTimeIntervals,
    /// Point-spread function kernel.
    pub psf: PsfTable,
    /// Energy-dispersion kernel.
    pub edisp: EdispTable,
}

impl ObservationContext {
    /// Check the scalar fields.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidParameter`] if the live time is
    /// negative or non-finite, or the start time is non-finite.
    pub fn validate(&self) -> Result<(), SamplingError> {
        if !(self.livetime.is_finite() && self.livetime >= 0.0) {
            return Err(SamplingError::InvalidParameter {
                name: "livetime",
                value: self.livetime,
            });
        }
        if !self.start_time.is_finite() {
            return Err(SamplingError::InvalidParameter {
                name: "start_time",
                value: self.start_time,
            });
        }
        Ok(())
    }
}

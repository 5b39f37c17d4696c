//! Arrival-time assignment.
//!
//! A photon's time bin (or the whole observation, for maps without a time
//! axis) plus one uniform draw becomes an absolute arrival time. The draw
//! is mapped onto the active-time measure of the bin, i.e. the part of the
//! bin covered by good time intervals, so no photon lands in a GTI gap.
//!
//! Map time axes are relative to the observation start; GTIs are absolute.

use rand::Rng;

use gammasim_types::ComponentId;

use crate::error::SamplingError;
use crate::geom::TimeAxis;
use crate::gti::GoodTimeIntervals;
use crate::map::IntensityMap;
use crate::observation::ObservationContext;
use crate::rng::uniform;

/// Maps time bins and uniform draws to absolute arrival times.
#[derive(Debug, Clone, Copy)]
pub struct TemporalAssigner<'a> {
    gti: &'a GoodTimeIntervals,
    start_time: f64,
    time_axis: Option<&'a TimeAxis>,
}

impl<'a> TemporalAssigner<'a> {
    /// Create an assigner for a map's time axis within an observation.
    pub const fn new(gti: &'a GoodTimeIntervals, start_time: f64, time_axis: Option<&'a TimeAxis>) -> Self {
        Self {
            gti,
            start_time,
            time_axis,
        }
    }

    /// Create an assigner for `map` within `observation`.
    pub fn for_map(observation: &'a ObservationContext, map: &'a IntensityMap) -> Self {
        Self::new(&observation.gti, observation.start_time, map.time_axis())
    }

    /// Absolute bounds of a time bin, or of the whole GTI span when the
    /// map has no time axis.
    pub fn bin_bounds(&self, time_bin: Option<usize>) -> Option<(f64, f64)> {
        match (self.time_axis, time_bin) {
            (Some(axis), Some(bin)) => {
                let (low, high) = axis.bounds(bin)?;
                Some((self.start_time + low, self.start_time + high))
            }
            _ => Some((self.gti.start(), self.gti.stop())),
        }
    }

    /// Check that every time bin carrying intensity has active time.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InactiveTimeBin`] for the first bin with
    /// positive expected counts but no GTI coverage.
    pub fn validate(&self, component: ComponentId, map: &IntensityMap) -> Result<(), SamplingError> {
        if self.time_axis.is_none() {
            return Ok(());
        }
        for (bin, total) in map.time_bin_totals().into_iter().enumerate() {
            if total <= 0.0 {
                continue;
            }
            let active = self
                .bin_bounds(Some(bin))
                .map_or(0.0, |(low, high)| self.gti.active_time(low, high));
            if active <= 0.0 {
                return Err(SamplingError::InactiveTimeBin { component, bin });
            }
        }
        Ok(())
    }

    /// Draw an arrival time for a photon in `time_bin`.
    ///
    /// Consumes exactly one uniform.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InactiveTimeBin`] if the bin has no active
    /// time; [`TemporalAssigner::validate`] rules this out up front.
    pub fn assign<R: Rng + ?Sized>(
        &self,
        component: ComponentId,
        time_bin: Option<usize>,
        rng: &mut R,
    ) -> Result<f64, SamplingError> {
        let u = uniform(rng);
        self.bin_bounds(time_bin)
            .and_then(|(low, high)| self.gti.sample(low, high, u))
            .ok_or(SamplingError::InactiveTimeBin {
                component,
                bin: time_bin.unwrap_or(0),
            })
    }
}

//! Per-cell count realisation.
//!
//! Turns an expected-counts map into integer photon counts. In the default
//! [`CountMode::Poisson`] mode each cell is an independent Poisson draw
//! with the cell intensity as mean; [`CountMode::Rounded`] skips the draw
//! and rounds the intensity, which is only useful for reproducibility
//! checks.
//!
//! # Draw order
//!
//! Cells are visited in flat map order. Zero-intensity cells yield zero and
//! consume no random numbers; every positive cell consumes exactly one
//! Poisson variate.

use rand::Rng;
use rand_distr::{Distribution, Poisson};
use tracing::debug;

use gammasim_types::{ComponentId, CountMode};

use crate::error::SamplingError;
use crate::map::{CellCounts, IntensityMap};

/// Draws integer counts from expected-counts maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscreteSampler {
    mode: CountMode,
}

impl DiscreteSampler {
    /// Create a sampler for the given count mode.
    pub const fn new(mode: CountMode) -> Self {
        Self { mode }
    }

    /// The configured count mode.
    pub const fn mode(&self) -> CountMode {
        self.mode
    }

    /// Sample counts for every cell of `map`.
    ///
    /// The whole map is validated before the first draw, so an invalid map
    /// leaves `rng` untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidIntensity`] if any cell is negative
    /// or non-finite.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        component: ComponentId,
        map: &IntensityMap,
        rng: &mut R,
    ) -> Result<CellCounts, SamplingError> {
        map.validate(component)?;

        let mut counts = Vec::with_capacity(map.len());
        for (cell, &mean) in map.data().iter().enumerate() {
            let count = if mean > 0.0 {
                match self.mode {
                    CountMode::Poisson => poisson_draw(component, cell, mean, rng)?,
                    CountMode::Rounded => to_count(mean.round()),
                }
            } else {
                0
            };
            counts.push(count);
        }

        let counts = CellCounts::new(counts);
        debug!(
            component = %component,
            expected = map.total(),
            sampled = counts.total(),
            mode = ?self.mode,
            "Cell counts sampled"
        );
        Ok(counts)
    }
}

fn poisson_draw<R: Rng + ?Sized>(
    component: ComponentId,
    cell: usize,
    mean: f64,
    rng: &mut R,
) -> Result<u64, SamplingError> {
    let distribution = Poisson::new(mean).map_err(|err| {
        debug!(error = %err, cell, mean, "Poisson mean rejected");
        SamplingError::InvalidIntensity {
            component,
            cell,
            value: mean,
        }
    })?;
    let draw: f64 = distribution.sample(rng);
    Ok(to_count(draw))
}

/// Convert a non-negative integral float to a count.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_count(value: f64) -> u64 {
    // `as` saturates: negatives and NaN become 0, huge values u64::MAX.
    value as u64
}

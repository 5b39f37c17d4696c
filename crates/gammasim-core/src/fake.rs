//! Binned fake counts.
//!
//! The binned counterpart of event sampling: predicted counts are turned
//! into Poisson-realised counts per cell without placing individual
//! photons. [`fake_on_off`] additionally simulates an off region whose
//! background exposure is `1 / alpha` times the on region's.

use rand::Rng;

use gammasim_types::{ComponentId, CountMode};

use crate::discrete::DiscreteSampler;
use crate::error::SamplingError;
use crate::map::{CellCounts, IntensityMap};

/// Identifier errors in the signal map are reported under.
const SIGNAL: ComponentId = ComponentId::new(1);

/// On and off counts of an on/off simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnOffCounts {
    /// Signal plus background counts in the on region.
    pub on: CellCounts,
    /// Background counts in the off region.
    pub off: CellCounts,
}

impl OnOffCounts {
    /// Total on counts.
    pub fn n_on(&self) -> u64 {
        self.on.total()
    }

    /// Total off counts.
    pub fn n_off(&self) -> u64 {
        self.off.total()
    }
}

/// Poisson-realise every cell of a predicted-counts map.
///
/// # Errors
///
/// Returns [`SamplingError::InvalidIntensity`] if the map is malformed.
pub fn fake_counts<R: Rng + ?Sized>(
    component: ComponentId,
    npred: &IntensityMap,
    rng: &mut R,
) -> Result<CellCounts, SamplingError> {
    DiscreteSampler::new(CountMode::Poisson).sample(component, npred, rng)
}

/// Simulate on and off counts.
///
/// On counts are `Pois(signal) + Pois(background)` per cell; off counts
/// are `Pois(background / alpha)`. Draws happen in that order: the whole
/// signal map, then the background map, then the off map.
///
/// # Errors
///
/// Returns [`SamplingError::InvalidParameter`] unless `alpha` is finite and
/// positive, [`SamplingError::ShapeMismatch`] if the two maps differ in
/// size, and [`SamplingError::InvalidIntensity`] for malformed maps. All
/// checks run before the first draw.
pub fn fake_on_off<R: Rng + ?Sized>(
    signal: &IntensityMap,
    background: &IntensityMap,
    alpha: f64,
    rng: &mut R,
) -> Result<OnOffCounts, SamplingError> {
    if !(alpha.is_finite() && alpha > 0.0) {
        return Err(SamplingError::InvalidParameter {
            name: "alpha",
            value: alpha,
        });
    }
    if signal.len() != background.len() {
        return Err(SamplingError::ShapeMismatch {
            what: "on/off background map",
            expected: signal.len(),
            actual: background.len(),
        });
    }
    signal.validate(SIGNAL)?;
    background.validate(ComponentId::BACKGROUND)?;

    let off_data = background.data().iter().map(|value| value / alpha).collect();
    let off_map = IntensityMap::new(
        background.grid().clone(),
        background.energy_axis().clone(),
        background.time_axis().cloned(),
        off_data,
    )?;
    off_map.validate(ComponentId::BACKGROUND)?;

    let sampler = DiscreteSampler::new(CountMode::Poisson);
    let signal_counts = sampler.sample(SIGNAL, signal, rng)?;
    let background_counts = sampler.sample(ComponentId::BACKGROUND, background, rng)?;
    let off = sampler.sample(ComponentId::BACKGROUND, &off_map, rng)?;

    let on = signal_counts
        .as_slice()
        .iter()
        .zip(background_counts.as_slice())
        .map(|(s, b)| s.saturating_add(*b))
        .collect();

    Ok(OnOffCounts {
        on: CellCounts::new(on),
        off,
    })
}

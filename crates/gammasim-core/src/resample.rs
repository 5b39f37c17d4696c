//! Sub-cell placement of sampled photons.
//!
//! Within an occupied cell each photon gets continuous coordinates drawn
//! uniformly over the cell's extent, by inverting the locally uniform
//! cumulative distribution along each axis independently:
//!
//! - longitude and latitude: `pixel + U` in pixel coordinates, then
//!   projected to the sky;
//! - true energy: `exp(ln lo + U (ln hi - ln lo))`;
//! - time: the bin index is carried through; the time inside the bin is
//!   drawn later against the good time intervals.
//!
//! Uniform placement inside a cell is only as good as the binning is fine;
//! choosing fine enough bins is the caller's job.
//!
//! # Draw order
//!
//! Occupied cells in flat map order, photons of a cell consecutively, and
//! per photon `U_lon`, `U_lat`, `U_energy`.

use rand::Rng;

use gammasim_types::SkyCoord;

use crate::map::{CellCounts, CellIndex, IntensityMap};
use crate::rng::uniform;

/// True coordinates of one photon before the instrument response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruePhoton {
    /// True arrival direction.
    pub position: SkyCoord,
    /// True energy in TeV.
    pub energy: f64,
    /// Index of the true-energy bin the photon was drawn from.
    pub energy_bin: usize,
    /// Time bin the photon was drawn from, if the map is time-resolved.
    pub time_bin: Option<usize>,
}

/// Places photons uniformly within their cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseCdfResampler;

impl InverseCdfResampler {
    /// Create a resampler.
    pub const fn new() -> Self {
        Self
    }

    /// Draw coordinates for every photon in `counts`.
    ///
    /// `counts` must be aligned with `map`; cells beyond the map are
    /// ignored.
    pub fn resample<R: Rng + ?Sized>(
        &self,
        map: &IntensityMap,
        counts: &CellCounts,
        rng: &mut R,
    ) -> Vec<TruePhoton> {
        let total = usize::try_from(counts.total()).unwrap_or(usize::MAX);
        let mut photons = Vec::with_capacity(total.min(map.len().saturating_mul(64)));

        for (cell, count) in counts.occupied() {
            let Some(index) = map.cell(cell) else {
                continue;
            };
            for _ in 0..count {
                if let Some(photon) = self.sample_in_cell(map, index, rng) {
                    photons.push(photon);
                }
            }
        }
        photons
    }

    /// Draw one photon uniformly inside the cell `index`.
    ///
    /// Returns `None` if the energy bin does not exist on the map's axis.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample_in_cell<R: Rng + ?Sized>(
        &self,
        map: &IntensityMap,
        index: CellIndex,
        rng: &mut R,
    ) -> Option<TruePhoton> {
        let u_lon = uniform(rng);
        let u_lat = uniform(rng);
        let u_energy = uniform(rng);

        let x = index.ix as f64 + u_lon;
        let y = index.iy as f64 + u_lat;
        let position = map.grid().pix_to_coord(x, y);
        let energy = map.energy_axis().interpolate(index.energy, u_energy)?;

        Some(TruePhoton {
            position,
            energy,
            energy_bin: index.energy,
            time_bin: index.time,
        })
    }
}

//! Predicted-counts intensity maps and sampled per-cell counts.
//!
//! An [`IntensityMap`] holds the expected number of photons in every cell
//! of a `[time][energy][lat][lon]` grid. The layout is row-major with
//! longitude varying fastest; [`IntensityMap::cell_index`] and
//! [`IntensityMap::cell`] convert between flat and per-axis indices.

use serde::{Deserialize, Serialize};

use gammasim_types::ComponentId;

use crate::error::SamplingError;
use crate::geom::{EnergyAxis, SkyGrid, TimeAxis};

/// Per-axis index of one map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellIndex {
    /// Pixel column (longitude).
    pub ix: usize,
    /// Pixel row (latitude).
    pub iy: usize,
    /// True-energy bin.
    pub energy: usize,
    /// Time bin, if the map has a time axis.
    pub time: Option<usize>,
}

/// Immutable expected-counts map of one model component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawIntensityMap", into = "RawIntensityMap")]
pub struct IntensityMap {
    grid: SkyGrid,
    energy: EnergyAxis,
    time: Option<TimeAxis>,
    data: Vec<f64>,
}

/// Serialized form of [`IntensityMap`], shape-checked on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawIntensityMap {
    grid: SkyGrid,
    energy: EnergyAxis,
    #[serde(default)]
    time: Option<TimeAxis>,
    data: Vec<f64>,
}

impl IntensityMap {
    /// Create a map from its geometry and flat data.
    ///
    /// Values are not range-checked here; negative or non-finite
    /// intensities are rejected by [`IntensityMap::validate`] before any
    /// sampling starts.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::ShapeMismatch`] if `data` does not have one
    /// value per cell.
    pub fn new(
        grid: SkyGrid,
        energy: EnergyAxis,
        time: Option<TimeAxis>,
        data: Vec<f64>,
    ) -> Result<Self, SamplingError> {
        let expected = cell_count(&grid, &energy, time.as_ref());
        if data.len() != expected {
            return Err(SamplingError::ShapeMismatch {
                what: "intensity map",
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            grid,
            energy,
            time,
            data,
        })
    }

    /// Create a map with every cell at zero intensity.
    pub fn zeros(grid: SkyGrid, energy: EnergyAxis, time: Option<TimeAxis>) -> Self {
        let cells = cell_count(&grid, &energy, time.as_ref());
        Self {
            grid,
            energy,
            time,
            data: vec![0.0; cells],
        }
    }

    /// Spatial pixel grid.
    pub const fn grid(&self) -> &SkyGrid {
        &self.grid
    }

    /// True-energy axis.
    pub const fn energy_axis(&self) -> &EnergyAxis {
        &self.energy
    }

    /// Time axis, if the map is time-resolved.
    pub const fn time_axis(&self) -> Option<&TimeAxis> {
        self.time.as_ref()
    }

    /// Flat cell values in row-major `[time][energy][lat][lon]` order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the map has no cells. Never true for a validated geometry.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sum over all cells: the expected total number of photons.
    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Value of one cell.
    pub fn get(&self, cell: usize) -> Option<f64> {
        self.data.get(cell).copied()
    }

    /// Flat index of a per-axis cell index.
    pub fn cell_index(&self, index: CellIndex) -> Option<usize> {
        if index.ix >= self.grid.nx()
            || index.iy >= self.grid.ny()
            || index.energy >= self.energy.nbins()
        {
            return None;
        }
        let time = match (index.time, &self.time) {
            (Some(bin), Some(axis)) if bin < axis.nbins() => bin,
            (None, None) => 0,
            _ => return None,
        };
        time.checked_mul(self.energy.nbins())?
            .checked_add(index.energy)?
            .checked_mul(self.grid.ny())?
            .checked_add(index.iy)?
            .checked_mul(self.grid.nx())?
            .checked_add(index.ix)
    }

    /// Per-axis index of a flat cell index.
    pub fn cell(&self, cell: usize) -> Option<CellIndex> {
        if cell >= self.data.len() {
            return None;
        }
        let nx = self.grid.nx();
        let ny = self.grid.ny();
        let ne = self.energy.nbins();

        let ix = cell.checked_rem(nx)?;
        let rest = cell.checked_div(nx)?;
        let iy = rest.checked_rem(ny)?;
        let rest = rest.checked_div(ny)?;
        let energy = rest.checked_rem(ne)?;
        let time_bin = rest.checked_div(ne)?;

        Some(CellIndex {
            ix,
            iy,
            energy,
            time: self.time.as_ref().map(|_| time_bin),
        })
    }

    /// Expected counts summed per time bin.
    pub fn time_bin_totals(&self) -> Vec<f64> {
        let per_bin = self.grid.npix().saturating_mul(self.energy.nbins()).max(1);
        self.data
            .chunks(per_bin)
            .map(|chunk| chunk.iter().sum())
            .collect()
    }

    /// Check that every cell is a finite, non-negative expected count.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidIntensity`] for the first offending
    /// cell.
    pub fn validate(&self, component: ComponentId) -> Result<(), SamplingError> {
        match self
            .data
            .iter()
            .enumerate()
            .find(|(_, value)| !(value.is_finite() && **value >= 0.0))
        {
            Some((cell, &value)) => Err(SamplingError::InvalidIntensity {
                component,
                cell,
                value,
            }),
            None => Ok(()),
        }
    }
}

fn cell_count(grid: &SkyGrid, energy: &EnergyAxis, time: Option<&TimeAxis>) -> usize {
    grid.npix()
        .saturating_mul(energy.nbins())
        .saturating_mul(time.map_or(1, TimeAxis::nbins))
}

impl TryFrom<RawIntensityMap> for IntensityMap {
    type Error = SamplingError;

    fn try_from(raw: RawIntensityMap) -> Result<Self, Self::Error> {
        Self::new(raw.grid, raw.energy, raw.time, raw.data)
    }
}

impl From<IntensityMap> for RawIntensityMap {
    fn from(map: IntensityMap) -> Self {
        Self {
            grid: map.grid,
            energy: map.energy,
            time: map.time,
            data: map.data,
        }
    }
}

/// Sampled integer counts aligned with the cells of an [`IntensityMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCounts {
    counts: Vec<u64>,
}

impl CellCounts {
    /// Wrap per-cell counts.
    pub const fn new(counts: Vec<u64>) -> Self {
        Self { counts }
    }

    /// Per-cell counts in map cell order.
    pub fn as_slice(&self) -> &[u64] {
        &self.counts
    }

    /// Count of one cell.
    pub fn get(&self, cell: usize) -> Option<u64> {
        self.counts.get(cell).copied()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether there are no cells.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of sampled photons.
    pub fn total(&self) -> u64 {
        self.counts.iter().fold(0_u64, |acc, c| acc.saturating_add(*c))
    }

    /// Occupied cells as `(cell, count)` pairs, in cell order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(cell, count)| (cell, *count))
    }
}

//! Binning geometry: energy axes, linear axes and the spatial pixel grid.
//!
//! The geometry is built upstream; this module only validates it and
//! answers the questions the sampler asks: how many bins, where a bin's
//! edges are, which bin a value falls in, and how pixel coordinates map to
//! the sky.
//!
//! Energy axes are interpolated in log-space. Sampling a value inside an
//! energy bin linearly would bias steep spectra towards the upper edge.

use serde::{Deserialize, Serialize};

use gammasim_types::SkyCoord;
use gammasim_types::coords::longitude_difference;

use crate::error::SamplingError;

/// Validate a list of bin edges: at least two, finite, strictly increasing.
fn validate_edges(axis: &'static str, edges: &[f64]) -> Result<(), SamplingError> {
    if edges.len() < 2 {
        return Err(SamplingError::DegenerateAxis {
            axis,
            reason: format!("need at least 2 edges, got {}", edges.len()),
        });
    }
    if let Some(bad) = edges.iter().find(|edge| !edge.is_finite()) {
        return Err(SamplingError::DegenerateAxis {
            axis,
            reason: format!("non-finite edge {bad}"),
        });
    }
    for (index, pair) in edges.windows(2).enumerate() {
        if let [low, high] = pair {
            if high <= low {
                return Err(SamplingError::DegenerateAxis {
                    axis,
                    reason: format!("bin {index} has non-positive width [{low}, {high}]"),
                });
            }
        }
    }
    Ok(())
}

/// Index of the half-open bin `[edge_i, edge_{i+1})` containing `value`.
fn find_bin(edges: &[f64], value: f64) -> Option<usize> {
    let first = *edges.first()?;
    let last = *edges.last()?;
    if !(value >= first && value < last) {
        return None;
    }
    // partition_point returns the number of edges <= value, which is >= 1 here.
    edges.partition_point(|edge| *edge <= value).checked_sub(1)
}

/// Index of the bin nearest to `value` (first or last bin when outside).
fn nearest_bin(edges: &[f64], value: f64) -> usize {
    let nbins = edges.len().saturating_sub(1);
    find_bin(edges, value).unwrap_or_else(|| {
        if edges.first().is_some_and(|first| value < *first) {
            0
        } else {
            nbins.saturating_sub(1)
        }
    })
}

/// Result of looking a value up on an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinLookup {
    /// The value lies inside this bin.
    Inside(usize),
    /// The value lies outside the axis; this is the nearest bin.
    Outside(usize),
}

// ---------------------------------------------------------------------------
// Energy axis
// ---------------------------------------------------------------------------

/// An energy axis with positive edges in TeV, interpolated in log-space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct EnergyAxis {
    edges: Vec<f64>,
}

impl EnergyAxis {
    /// Create an energy axis from explicit edges.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::DegenerateAxis`] if there are fewer than two
    /// edges, any edge is non-positive or non-finite, or the edges are not
    /// strictly increasing.
    pub fn new(edges: Vec<f64>) -> Result<Self, SamplingError> {
        validate_edges("energy", &edges)?;
        if let Some(bad) = edges.iter().find(|edge| **edge <= 0.0) {
            return Err(SamplingError::DegenerateAxis {
                axis: "energy",
                reason: format!("edge {bad} is not positive"),
            });
        }
        Ok(Self { edges })
    }

    /// Create an axis of `nbins` bins equally spaced in log-energy.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::DegenerateAxis`] if `nbins` is zero or the
    /// range is empty or non-positive.
    #[allow(clippy::cast_precision_loss)]
    pub fn log_spaced(min: f64, max: f64, nbins: usize) -> Result<Self, SamplingError> {
        if nbins == 0 || min <= 0.0 || !(max > min) {
            return Err(SamplingError::DegenerateAxis {
                axis: "energy",
                reason: format!("cannot split [{min}, {max}] into {nbins} log bins"),
            });
        }
        let (log_min, log_max) = (min.ln(), max.ln());
        let step = (log_max - log_min) / nbins as f64;
        let mut edges: Vec<f64> = (0..nbins)
            .map(|index| (step.mul_add(index as f64, log_min)).exp())
            .collect();
        edges.push(max);
        Self::new(edges)
    }

    /// Number of bins.
    pub fn nbins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    /// The bin edges in TeV.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Lower and upper edge of bin `index`.
    pub fn bounds(&self, index: usize) -> Option<(f64, f64)> {
        let low = *self.edges.get(index)?;
        let high = *self.edges.get(index.checked_add(1)?)?;
        Some((low, high))
    }

    /// Half-open bin containing `energy`, if any.
    pub fn find_bin(&self, energy: f64) -> Option<usize> {
        find_bin(&self.edges, energy)
    }

    /// Bin containing `energy`, or the nearest bin when outside the axis.
    pub fn lookup(&self, energy: f64) -> BinLookup {
        self.find_bin(energy).map_or_else(
            || BinLookup::Outside(nearest_bin(&self.edges, energy)),
            BinLookup::Inside,
        )
    }

    /// Energy at fraction `u` of bin `index`, interpolated in log-space:
    /// `exp(ln lo + u (ln hi - ln lo))`.
    pub fn interpolate(&self, index: usize, u: f64) -> Option<f64> {
        let (low, high) = self.bounds(index)?;
        let (log_low, log_high) = (low.ln(), high.ln());
        Some(u.mul_add(log_high - log_low, log_low).exp())
    }
}

impl TryFrom<Vec<f64>> for EnergyAxis {
    type Error = SamplingError;

    fn try_from(edges: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(edges)
    }
}

impl From<EnergyAxis> for Vec<f64> {
    fn from(axis: EnergyAxis) -> Self {
        axis.edges
    }
}

// ---------------------------------------------------------------------------
// Linear axis
// ---------------------------------------------------------------------------

/// An axis interpolated linearly: time bins, field-of-view offsets and
/// point-spread radii.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct LinearAxis {
    edges: Vec<f64>,
}

/// Time bins, as seconds relative to the observation start.
pub type TimeAxis = LinearAxis;

impl LinearAxis {
    /// Create a linear axis from explicit edges.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::DegenerateAxis`] if there are fewer than two
    /// edges, any edge is non-finite, or the edges are not strictly
    /// increasing.
    pub fn new(edges: Vec<f64>) -> Result<Self, SamplingError> {
        validate_edges("linear", &edges)?;
        Ok(Self { edges })
    }

    /// Number of bins.
    pub fn nbins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    /// The bin edges.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Lower and upper edge of bin `index`.
    pub fn bounds(&self, index: usize) -> Option<(f64, f64)> {
        let low = *self.edges.get(index)?;
        let high = *self.edges.get(index.checked_add(1)?)?;
        Some((low, high))
    }

    /// Half-open bin containing `value`, if any.
    pub fn find_bin(&self, value: f64) -> Option<usize> {
        find_bin(&self.edges, value)
    }

    /// Bin containing `value`, or the nearest bin when outside the axis.
    pub fn lookup(&self, value: f64) -> BinLookup {
        self.find_bin(value).map_or_else(
            || BinLookup::Outside(nearest_bin(&self.edges, value)),
            BinLookup::Inside,
        )
    }

    /// Value at fraction `u` of bin `index`: `lo + u (hi - lo)`.
    pub fn interpolate(&self, index: usize, u: f64) -> Option<f64> {
        let (low, high) = self.bounds(index)?;
        Some(u.mul_add(high - low, low))
    }
}

impl TryFrom<Vec<f64>> for LinearAxis {
    type Error = SamplingError;

    fn try_from(edges: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(edges)
    }
}

impl From<LinearAxis> for Vec<f64> {
    fn from(axis: LinearAxis) -> Self {
        axis.edges
    }
}

// ---------------------------------------------------------------------------
// Spatial grid
// ---------------------------------------------------------------------------

/// A rectangular pixel grid in plate-carrée (CAR) projection.
///
/// Pixel `(ix, iy)` covers pixel coordinates `[ix, ix + 1) x [iy, iy + 1)`.
/// The grid centre sits at pixel coordinate `(nx / 2, ny / 2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSkyGrid", into = "RawSkyGrid")]
pub struct SkyGrid {
    center: SkyCoord,
    bin_size: f64,
    nx: usize,
    ny: usize,
}

/// Serialized form of [`SkyGrid`], validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSkyGrid {
    center: SkyCoord,
    bin_size: f64,
    nx: usize,
    ny: usize,
}

impl SkyGrid {
    /// Create a grid of `nx` by `ny` square pixels of `bin_size` degrees.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::DegenerateAxis`] if either dimension is zero,
    /// the pixel size is not a positive finite number, or the grid would
    /// extend beyond a celestial pole.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(center: SkyCoord, bin_size: f64, nx: usize, ny: usize) -> Result<Self, SamplingError> {
        if nx == 0 || ny == 0 {
            return Err(SamplingError::DegenerateAxis {
                axis: "spatial",
                reason: format!("grid has zero pixels ({nx} x {ny})"),
            });
        }
        if !(bin_size.is_finite() && bin_size > 0.0) {
            return Err(SamplingError::DegenerateAxis {
                axis: "spatial",
                reason: format!("pixel size {bin_size} is not positive"),
            });
        }
        let half_height = bin_size * ny as f64 / 2.0;
        if center.lat + half_height > 90.0 || center.lat - half_height < -90.0 {
            return Err(SamplingError::DegenerateAxis {
                axis: "spatial",
                reason: "grid extends beyond a pole".to_owned(),
            });
        }
        Ok(Self {
            center: SkyCoord::new(center.lon, center.lat),
            bin_size,
            nx,
            ny,
        })
    }

    /// Grid centre.
    pub const fn center(&self) -> SkyCoord {
        self.center
    }

    /// Pixel size in degrees.
    pub const fn bin_size(&self) -> f64 {
        self.bin_size
    }

    /// Number of pixels along longitude.
    pub const fn nx(&self) -> usize {
        self.nx
    }

    /// Number of pixels along latitude.
    pub const fn ny(&self) -> usize {
        self.ny
    }

    /// Total number of pixels.
    pub const fn npix(&self) -> usize {
        self.nx.saturating_mul(self.ny)
    }

    /// Convert continuous pixel coordinates to a sky position.
    #[allow(clippy::cast_precision_loss)]
    pub fn pix_to_coord(&self, x: f64, y: f64) -> SkyCoord {
        let lon = (x - self.nx as f64 / 2.0).mul_add(self.bin_size, self.center.lon);
        let lat = (y - self.ny as f64 / 2.0).mul_add(self.bin_size, self.center.lat);
        SkyCoord::new(lon, lat)
    }

    /// Convert a sky position to continuous pixel coordinates.
    #[allow(clippy::cast_precision_loss)]
    pub fn coord_to_pix(&self, coord: &SkyCoord) -> (f64, f64) {
        let x = longitude_difference(coord.lon, self.center.lon) / self.bin_size + self.nx as f64 / 2.0;
        let y = (coord.lat - self.center.lat) / self.bin_size + self.ny as f64 / 2.0;
        (x, y)
    }
}

impl TryFrom<RawSkyGrid> for SkyGrid {
    type Error = SamplingError;

    fn try_from(raw: RawSkyGrid) -> Result<Self, Self::Error> {
        Self::new(raw.center, raw.bin_size, raw.nx, raw.ny)
    }
}

impl From<SkyGrid> for RawSkyGrid {
    fn from(grid: SkyGrid) -> Self {
        Self {
            center: grid.center,
            bin_size: grid.bin_size,
            nx: grid.nx,
            ny: grid.ny,
        }
    }
}

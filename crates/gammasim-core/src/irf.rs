//! Discretized instrument response kernels.
//!
//! Both kernels are lookup tables consumed as opaque inputs: they are
//! loaded and calibrated elsewhere. Each table row is an unnormalised
//! weight vector over the observed quantity, addressed by the bin of the
//! true quantity.
//!
//! | Kernel | Row address                         | Row axis                 |
//! |--------|-------------------------------------|--------------------------|
//! | PSF    | (true energy bin, FoV offset bin)   | angular radius (deg)     |
//! | EDISP  | true energy bin                     | reconstructed energy     |

use serde::{Deserialize, Serialize};

use crate::error::SamplingError;
use crate::geom::{EnergyAxis, LinearAxis};

fn validate_weights(kernel: &'static str, data: &[f64], expected: usize) -> Result<(), SamplingError> {
    if data.len() != expected {
        return Err(SamplingError::ShapeMismatch {
            what: kernel,
            expected,
            actual: data.len(),
        });
    }
    if let Some(bad) = data.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
        return Err(SamplingError::InvalidKernel {
            kernel,
            reason: format!("weight {bad} is negative or not finite"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Point-spread function
// ---------------------------------------------------------------------------

/// Point-spread function table.
///
/// `data` is laid out `[energy_true][offset][rad]`; each row holds the
/// probability weight of each radial bin, i.e. the PSF density already
/// integrated over the bin's solid angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPsfTable", into = "RawPsfTable")]
pub struct PsfTable {
    energy_true: EnergyAxis,
    offset: LinearAxis,
    rad: LinearAxis,
    data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPsfTable {
    energy_true: EnergyAxis,
    offset: LinearAxis,
    rad: LinearAxis,
    data: Vec<f64>,
}

impl PsfTable {
    /// Create a PSF table.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::ShapeMismatch`] if `data` does not match
    /// the axes, and [`SamplingError::InvalidKernel`] if a weight is
    /// negative or non-finite or the radial axis starts below zero.
    pub fn new(
        energy_true: EnergyAxis,
        offset: LinearAxis,
        rad: LinearAxis,
        data: Vec<f64>,
    ) -> Result<Self, SamplingError> {
        if rad.edges().first().is_some_and(|r| *r < 0.0) {
            return Err(SamplingError::InvalidKernel {
                kernel: "psf",
                reason: "radial axis starts below zero".to_owned(),
            });
        }
        let expected = energy_true
            .nbins()
            .saturating_mul(offset.nbins())
            .saturating_mul(rad.nbins());
        validate_weights("psf", &data, expected)?;
        Ok(Self {
            energy_true,
            offset,
            rad,
            data,
        })
    }

    /// True-energy axis.
    pub const fn energy_axis(&self) -> &EnergyAxis {
        &self.energy_true
    }

    /// Field-of-view offset axis in degrees.
    pub const fn offset_axis(&self) -> &LinearAxis {
        &self.offset
    }

    /// Radial axis in degrees.
    pub const fn rad_axis(&self) -> &LinearAxis {
        &self.rad
    }

    /// Radial weight row for one (energy, offset) bin pair.
    pub fn row(&self, energy: usize, offset: usize) -> Option<&[f64]> {
        if energy >= self.energy_true.nbins() || offset >= self.offset.nbins() {
            return None;
        }
        let nrad = self.rad.nbins();
        let start = energy
            .checked_mul(self.offset.nbins())?
            .checked_add(offset)?
            .checked_mul(nrad)?;
        self.data.get(start..start.checked_add(nrad)?)
    }
}

impl TryFrom<RawPsfTable> for PsfTable {
    type Error = SamplingError;

    fn try_from(raw: RawPsfTable) -> Result<Self, Self::Error> {
        Self::new(raw.energy_true, raw.offset, raw.rad, raw.data)
    }
}

impl From<PsfTable> for RawPsfTable {
    fn from(table: PsfTable) -> Self {
        Self {
            energy_true: table.energy_true,
            offset: table.offset,
            rad: table.rad,
            data: table.data,
        }
    }
}

// ---------------------------------------------------------------------------
// Energy dispersion
// ---------------------------------------------------------------------------

/// Energy-dispersion (migration) table.
///
/// `data` is laid out `[energy_true][energy_reco]`; row `i` holds the
/// probability weight of each reconstructed-energy bin for photons in true
/// energy bin `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEdispTable", into = "RawEdispTable")]
pub struct EdispTable {
    energy_true: EnergyAxis,
    energy_reco: EnergyAxis,
    data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEdispTable {
    energy_true: EnergyAxis,
    energy_reco: EnergyAxis,
    data: Vec<f64>,
}

impl EdispTable {
    /// Create an energy-dispersion table.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::ShapeMismatch`] if `data` does not match
    /// the axes, and [`SamplingError::InvalidKernel`] if a weight is
    /// negative or non-finite.
    pub fn new(
        energy_true: EnergyAxis,
        energy_reco: EnergyAxis,
        data: Vec<f64>,
    ) -> Result<Self, SamplingError> {
        let expected = energy_true.nbins().saturating_mul(energy_reco.nbins());
        validate_weights("edisp", &data, expected)?;
        Ok(Self {
            energy_true,
            energy_reco,
            data,
        })
    }

    /// Perfect-resolution kernel: every true bin maps onto the same
    /// reconstructed bin. Requires identical axes.
    pub fn diagonal(axis: EnergyAxis) -> Self {
        let n = axis.nbins();
        let mut data = vec![0.0; n.saturating_mul(n)];
        for (index, weight) in data.iter_mut().enumerate() {
            if index.checked_rem(n.saturating_add(1)) == Some(0) {
                *weight = 1.0;
            }
        }
        Self {
            energy_true: axis.clone(),
            energy_reco: axis,
            data,
        }
    }

    /// True-energy axis.
    pub const fn energy_true_axis(&self) -> &EnergyAxis {
        &self.energy_true
    }

    /// Reconstructed-energy axis.
    pub const fn energy_reco_axis(&self) -> &EnergyAxis {
        &self.energy_reco
    }

    /// Migration row for one true-energy bin.
    pub fn row(&self, energy: usize) -> Option<&[f64]> {
        if energy >= self.energy_true.nbins() {
            return None;
        }
        let nreco = self.energy_reco.nbins();
        let start = energy.checked_mul(nreco)?;
        self.data.get(start..start.checked_add(nreco)?)
    }
}

impl TryFrom<RawEdispTable> for EdispTable {
    type Error = SamplingError;

    fn try_from(raw: RawEdispTable) -> Result<Self, Self::Error> {
        Self::new(raw.energy_true, raw.energy_reco, raw.data)
    }
}

impl From<EdispTable> for RawEdispTable {
    fn from(table: EdispTable) -> Self {
        Self {
            energy_true: table.energy_true,
            energy_reco: table.energy_reco,
            data: table.data,
        }
    }
}

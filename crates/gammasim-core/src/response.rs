//! Instrument response perturbation.
//!
//! Each true photon is pushed through the point-spread function and the
//! energy dispersion by the same two-step inverse-CDF technique the
//! resampler uses: a weighted choice of kernel bin from the row's
//! cumulative weights, then a uniform draw inside the chosen bin.
//!
//! - **PSF**: the row is selected by (true energy bin, offset of the true
//!   position from the pointing). A radius is drawn linearly inside the
//!   chosen radial bin, a position angle uniformly in `[0, 360)`, and the
//!   true position is moved by that radius along that angle.
//! - **EDISP**: the row is selected by true energy bin. The reconstructed
//!   energy is drawn log-uniformly inside the chosen reconstructed bin.
//!
//! # Domain violations
//!
//! A true energy or offset outside the kernel axes is handled by the
//! configured [`DomainPolicy`]: `Drop` discards the photon, `Clamp` uses
//! the nearest kernel bin. A kernel row with zero total weight cannot be
//! sampled under either policy and drops the photon. Every affected photon
//! is counted in the returned [`DomainReport`].
//!
//! # Draw order
//!
//! Per photon, five uniforms are always drawn, in this order and whether
//! or not the photon survives: PSF `U_bin`, `U_rad`, `U_pa`, then EDISP
//! `U_bin`, `U_e`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use gammasim_types::{DomainPolicy, SkyCoord};

use crate::geom::BinLookup;
use crate::irf::{EdispTable, PsfTable};
use crate::observation::ObservationContext;
use crate::resample::TruePhoton;
use crate::rng::uniform;

/// Counts of photons affected by kernel domain violations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainReport {
    /// Photons removed from the batch.
    pub dropped: u64,
    /// Photons kept after clamping a kernel lookup to the nearest bin.
    pub clamped: u64,
}

impl DomainReport {
    /// Add another report to this one.
    pub const fn absorb(&mut self, other: Self) {
        self.dropped = self.dropped.saturating_add(other.dropped);
        self.clamped = self.clamped.saturating_add(other.clamped);
    }

    /// Total number of affected photons.
    pub const fn affected(&self) -> u64 {
        self.dropped.saturating_add(self.clamped)
    }
}

/// Reconstructed quantities of one photon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconstructed {
    /// Reconstructed direction.
    pub position: SkyCoord,
    /// Reconstructed energy in TeV.
    pub energy: f64,
}

/// Outcome of perturbing one photon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseOutcome {
    /// Both kernels were sampled inside their domain.
    Valid(Reconstructed),
    /// At least one kernel lookup was clamped to the nearest bin.
    Clamped(Reconstructed),
    /// The photon could not be reconstructed and is removed.
    Dropped,
}

/// The five uniforms consumed per photon.
#[derive(Debug, Clone, Copy)]
struct ResponseDraws {
    psf_bin: f64,
    psf_rad: f64,
    psf_angle: f64,
    edisp_bin: f64,
    edisp_energy: f64,
}

impl ResponseDraws {
    fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            psf_bin: uniform(rng),
            psf_rad: uniform(rng),
            psf_angle: uniform(rng),
            edisp_bin: uniform(rng),
            edisp_energy: uniform(rng),
        }
    }
}

/// A kernel lookup resolved under the domain policy.
enum Resolved {
    Exact(usize),
    Clamped(usize),
    Invalid,
}

fn resolve(lookup: BinLookup, policy: DomainPolicy) -> Resolved {
    match (lookup, policy) {
        (BinLookup::Inside(index), _) => Resolved::Exact(index),
        (BinLookup::Outside(index), DomainPolicy::Clamp) => Resolved::Clamped(index),
        (BinLookup::Outside(_), DomainPolicy::Drop) => Resolved::Invalid,
    }
}

/// Choose a bin from unnormalised weights by inverting their cumulative sum.
///
/// Returns `None` if the weights sum to zero.
pub fn choose_bin(weights: &[f64], u: f64) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total.is_nan() || total <= 0.0 {
        return None;
    }
    let target = u * total;
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (index, &weight) in weights.iter().enumerate() {
        if weight > 0.0 {
            cumulative += weight;
            last_positive = Some(index);
            if target < cumulative {
                return Some(index);
            }
        }
    }
    // Rounding can leave `target` a hair above the running sum.
    last_positive
}

/// Applies PSF and energy dispersion to true photons.
#[derive(Debug, Clone, Copy)]
pub struct ResponsePerturber<'a> {
    psf: &'a PsfTable,
    edisp: &'a EdispTable,
    pointing: SkyCoord,
    policy: DomainPolicy,
}

impl<'a> ResponsePerturber<'a> {
    /// Create a perturber from explicit kernels.
    pub const fn new(psf: &'a PsfTable, edisp: &'a EdispTable, pointing: SkyCoord, policy: DomainPolicy) -> Self {
        Self {
            psf,
            edisp,
            pointing,
            policy,
        }
    }

    /// Create a perturber from an observation's kernels and pointing.
    pub const fn for_observation(observation: &'a ObservationContext, policy: DomainPolicy) -> Self {
        Self::new(&observation.psf, &observation.edisp, observation.pointing, policy)
    }

    /// Perturb one photon.
    pub fn perturb<R: Rng + ?Sized>(&self, photon: &TruePhoton, rng: &mut R) -> ResponseOutcome {
        let draws = ResponseDraws::draw(rng);

        let mut clamped = false;
        let Some(position) = self.sample_psf(photon, &draws, &mut clamped) else {
            return ResponseOutcome::Dropped;
        };
        let Some(energy) = self.sample_edisp(photon, &draws, &mut clamped) else {
            return ResponseOutcome::Dropped;
        };

        let reconstructed = Reconstructed { position, energy };
        if clamped {
            ResponseOutcome::Clamped(reconstructed)
        } else {
            ResponseOutcome::Valid(reconstructed)
        }
    }

    /// Perturb a batch of photons, keeping input order.
    ///
    /// Returns the surviving `(photon, reconstructed)` pairs and the domain
    /// report for the batch.
    pub fn perturb_all<R: Rng + ?Sized>(
        &self,
        photons: &[TruePhoton],
        rng: &mut R,
    ) -> (Vec<(TruePhoton, Reconstructed)>, DomainReport) {
        let mut kept = Vec::with_capacity(photons.len());
        let mut report = DomainReport::default();
        for photon in photons {
            match self.perturb(photon, rng) {
                ResponseOutcome::Valid(reco) => kept.push((*photon, reco)),
                ResponseOutcome::Clamped(reco) => {
                    report.clamped = report.clamped.saturating_add(1);
                    kept.push((*photon, reco));
                }
                ResponseOutcome::Dropped => report.dropped = report.dropped.saturating_add(1),
            }
        }
        (kept, report)
    }

    fn sample_psf(&self, photon: &TruePhoton, draws: &ResponseDraws, clamped: &mut bool) -> Option<SkyCoord> {
        let offset = self.pointing.separation(&photon.position);
        let energy_bin = self.resolve(self.psf.energy_axis().lookup(photon.energy), clamped)?;
        let offset_bin = self.resolve(self.psf.offset_axis().lookup(offset), clamped)?;

        let row = self.psf.row(energy_bin, offset_bin)?;
        let rad_bin = choose_bin(row, draws.psf_bin)?;
        let radius = self.psf.rad_axis().interpolate(rad_bin, draws.psf_rad)?;
        let position_angle = draws.psf_angle * 360.0;

        Some(photon.position.offset_by(position_angle, radius))
    }

    fn sample_edisp(&self, photon: &TruePhoton, draws: &ResponseDraws, clamped: &mut bool) -> Option<f64> {
        let energy_bin = self.resolve(self.edisp.energy_true_axis().lookup(photon.energy), clamped)?;
        let row = self.edisp.row(energy_bin)?;
        let reco_bin = choose_bin(row, draws.edisp_bin)?;
        self.edisp.energy_reco_axis().interpolate(reco_bin, draws.edisp_energy)
    }

    fn resolve(&self, lookup: BinLookup, clamped: &mut bool) -> Option<usize> {
        match resolve(lookup, self.policy) {
            Resolved::Exact(index) => Some(index),
            Resolved::Clamped(index) => {
                *clamped = true;
                Some(index)
            }
            Resolved::Invalid => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::geom::{EnergyAxis, LinearAxis};
    use crate::rng::random_state;

    fn psf() -> PsfTable {
        PsfTable::new(
            EnergyAxis::new(vec![0.1, 10.0]).unwrap(),
            LinearAxis::new(vec![0.0, 2.0]).unwrap(),
            LinearAxis::new(vec![0.0, 0.1, 0.2]).unwrap(),
            vec![0.0, 1.0],
        )
        .unwrap()
    }

    fn edisp() -> EdispTable {
        let axis = EnergyAxis::new(vec![0.1, 1.0, 10.0]).unwrap();
        EdispTable::new(axis.clone(), axis, vec![1.0, 0.0, 0.25, 0.75]).unwrap()
    }

    fn photon(lon: f64, energy: f64) -> TruePhoton {
        TruePhoton {
            position: SkyCoord::new(lon, 0.0),
            energy,
            energy_bin: 0,
            time_bin: None,
        }
    }

    #[test]
    fn choose_bin_follows_cumulative_weights() {
        let weights = [1.0, 0.0, 3.0];
        assert_eq!(choose_bin(&weights, 0.0), Some(0));
        assert_eq!(choose_bin(&weights, 0.2499), Some(0));
        assert_eq!(choose_bin(&weights, 0.25), Some(2));
        assert_eq!(choose_bin(&weights, 0.999_999), Some(2));
        assert_eq!(choose_bin(&[0.0, 0.0], 0.5), None);
    }

    #[test]
    fn psf_radius_comes_from_weighted_bin() {
        let (psf, edisp) = (psf(), edisp());
        let perturber = ResponsePerturber::new(&psf, &edisp, SkyCoord::new(0.0, 0.0), DomainPolicy::Drop);
        let mut rng = random_state(8);
        for _ in 0..1000 {
            let true_photon = photon(0.5, 0.5);
            match perturber.perturb(&true_photon, &mut rng) {
                ResponseOutcome::Valid(reco) => {
                    let radius = true_photon.position.separation(&reco.position);
                    assert!((0.1 - 1e-9..=0.2 + 1e-9).contains(&radius), "radius = {radius}");
                    assert!((0.1..1.0).contains(&reco.energy));
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
    }

    #[test]
    fn out_of_domain_offset_is_dropped() {
        let (psf, edisp) = (psf(), edisp());
        let perturber = ResponsePerturber::new(&psf, &edisp, SkyCoord::new(0.0, 0.0), DomainPolicy::Drop);
        let (kept, report) = perturber.perturb_all(&[photon(5.0, 0.5), photon(1.0, 0.5)], &mut random_state(1));
        assert_eq!(kept.len(), 1);
        assert_eq!(report, DomainReport { dropped: 1, clamped: 0 });
    }

    #[test]
    fn out_of_domain_energy_is_clamped_under_clamp_policy() {
        let (psf, edisp) = (psf(), edisp());
        let perturber = ResponsePerturber::new(&psf, &edisp, SkyCoord::new(0.0, 0.0), DomainPolicy::Clamp);
        let (kept, report) = perturber.perturb_all(&[photon(1.0, 50.0)], &mut random_state(1));
        assert_eq!(kept.len(), 1);
        assert_eq!(report, DomainReport { dropped: 0, clamped: 1 });
        // Clamped onto the top EDISP row, which migrates into [0.1, 10).
        assert!(kept[0].1.energy >= 0.1 && kept[0].1.energy < 10.0);
    }

    #[test]
    fn dropped_photons_still_consume_draws() {
        let (psf, edisp) = (psf(), edisp());
        let perturber = ResponsePerturber::new(&psf, &edisp, SkyCoord::new(0.0, 0.0), DomainPolicy::Drop);
        let mut rng = random_state(4);
        assert_eq!(perturber.perturb(&photon(9.0, 0.5), &mut rng), ResponseOutcome::Dropped);
        let mut reference = random_state(4);
        for _ in 0..5 {
            uniform(&mut reference);
        }
        assert_eq!(uniform(&mut rng).to_bits(), uniform(&mut reference).to_bits());
    }

    #[test]
    fn zero_rows_drop_even_under_clamp_policy() {
        let energy = EnergyAxis::new(vec![0.1, 1.0, 10.0]).unwrap();
        // Offset bin [2, 4) has no PSF weight for either energy bin.
        let psf = PsfTable::new(
            energy.clone(),
            LinearAxis::new(vec![0.0, 2.0, 4.0]).unwrap(),
            LinearAxis::new(vec![0.0, 0.1, 0.2]).unwrap(),
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        )
        .unwrap();
        // True bin [1, 10) never migrates anywhere.
        let edisp = EdispTable::new(energy.clone(), energy, vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        let perturber = ResponsePerturber::new(&psf, &edisp, SkyCoord::new(0.0, 0.0), DomainPolicy::Clamp);

        let zero_psf_row = photon(3.0, 0.5);
        let zero_edisp_row = photon(1.0, 5.0);
        let clamped_onto_zero_row = photon(1.0, 50.0);
        for true_photon in [zero_psf_row, zero_edisp_row, clamped_onto_zero_row] {
            let mut rng = random_state(21);
            assert_eq!(perturber.perturb(&true_photon, &mut rng), ResponseOutcome::Dropped);
            let mut reference = random_state(21);
            for _ in 0..5 {
                uniform(&mut reference);
            }
            assert_eq!(uniform(&mut rng).to_bits(), uniform(&mut reference).to_bits());

            let (kept, report) = perturber.perturb_all(&[true_photon], &mut random_state(21));
            assert!(kept.is_empty());
            assert_eq!(report, DomainReport { dropped: 1, clamped: 0 });
        }

        let (kept, report) = perturber.perturb_all(&[photon(1.0, 0.5)], &mut random_state(21));
        assert_eq!(kept.len(), 1);
        assert_eq!(report, DomainReport::default());
    }

    #[test]
    fn report_absorbs() {
        let mut total = DomainReport { dropped: 1, clamped: 2 };
        total.absorb(DomainReport { dropped: 3, clamped: 4 });
        assert_eq!(total, DomainReport { dropped: 4, clamped: 6 });
        assert_eq!(total.affected(), 10);
    }
}

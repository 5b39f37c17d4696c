//! One sampling run: from model components to an event table.
//!
//! A run moves through a fixed sequence of stages (see [`RunStage`]):
//!
//! 1. **Init** -- configuration and observation checked, components
//!    ordered by identifier, duplicates rejected, id 0 reserved for the
//!    background.
//! 2. **`MapReady`** -- providers evaluated into snapshots and every map
//!    validated, including GTI coverage of time bins carrying intensity.
//!    No random number has been drawn yet.
//! 3. **`CountsSampled`** -- per-cell counts for every component.
//! 4. **`CoordinatesSampled`** -- true coordinates for every photon.
//! 5. **`ResponseApplied`** -- PSF and energy dispersion for every photon,
//!    domain violations counted.
//! 6. **Composed** -- arrival times drawn for surviving photons, batches
//!    concatenated and numbered.
//! 7. **Done**.
//!
//! Each random phase walks the components in ascending identifier order
//! and consumes draws in the order documented on the respective sampler.
//! Together with the single generator per run this fixes the complete draw
//! order, so a run is reproducible bit for bit from its seed and inputs.
//! Any failure aborts the run; no partial table is produced.

use core::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use gammasim_types::{ComponentId, ComponentInfo, CountMode, DomainPolicy, Event, EventId};

use crate::compositor::{EventBatch, EventCompositor, TableHeader};
use crate::discrete::DiscreteSampler;
use crate::error::SamplingError;
use crate::map::CellCounts;
use crate::observation::ObservationContext;
use crate::provider::{ComponentSnapshot, ModelComponent};
use crate::resample::{InverseCdfResampler, TruePhoton};
use crate::response::{DomainReport, Reconstructed, ResponsePerturber};
use crate::rng::random_state;
use crate::table::EventTable;
use crate::temporal::TemporalAssigner;

/// Stages of a sampling run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunStage {
    /// Inputs received, nothing checked yet.
    Init,
    /// All maps materialised and validated.
    MapReady,
    /// Cell counts drawn.
    CountsSampled,
    /// True photon coordinates drawn.
    CoordinatesSampled,
    /// Instrument response applied.
    ResponseApplied,
    /// Event table assembled.
    Composed,
    /// Run finished.
    Done,
}

impl RunStage {
    /// The stage following this one, if any.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::MapReady),
            Self::MapReady => Some(Self::CountsSampled),
            Self::CountsSampled => Some(Self::CoordinatesSampled),
            Self::CoordinatesSampled => Some(Self::ResponseApplied),
            Self::ResponseApplied => Some(Self::Composed),
            Self::Composed => Some(Self::Done),
            Self::Done => None,
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::MapReady => "map_ready",
            Self::CountsSampled => "counts_sampled",
            Self::CoordinatesSampled => "coordinates_sampled",
            Self::ResponseApplied => "response_applied",
            Self::Composed => "composed",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Settings of one sampling run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Name of the simulated object. Required; there is no default.
    pub object_name: Option<String>,
    /// Seed of the run's generator.
    pub seed: u64,
    /// How counts are realised.
    pub count_mode: CountMode,
    /// How kernel domain violations are handled.
    pub domain_policy: DomainPolicy,
    /// Creation time stamped on the table; the wall clock when unset.
    pub created_at: Option<DateTime<Utc>>,
}

impl SamplerConfig {
    /// Configuration with the default modes.
    pub fn new(object_name: impl Into<String>, seed: u64) -> Self {
        Self {
            object_name: Some(object_name.into()),
            seed,
            ..Self::default()
        }
    }

    /// Set the count mode.
    #[must_use]
    pub const fn with_count_mode(mut self, count_mode: CountMode) -> Self {
        self.count_mode = count_mode;
        self
    }

    /// Set the domain policy.
    #[must_use]
    pub const fn with_domain_policy(mut self, domain_policy: DomainPolicy) -> Self {
        self.domain_policy = domain_policy;
        self
    }

    /// Pin the creation time, making encoded tables byte-reproducible.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Replace the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn require_object_name(&self) -> Result<&str, SamplingError> {
        self.object_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(SamplingError::MissingObjectName)
    }
}

/// Tracks and logs stage transitions of one run.
struct Progress {
    stage: RunStage,
    obs_id: u64,
}

impl Progress {
    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            self.stage = next;
            debug!(obs_id = self.obs_id, stage = %self.stage, "Run stage reached");
        }
    }
}

/// Runs the sampling pipeline for one observation.
#[derive(Debug, Clone)]
pub struct EventSampler {
    config: SamplerConfig,
}

impl EventSampler {
    /// Create a sampler with the given configuration.
    pub const fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// The run configuration.
    pub const fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Evaluate every component's provider and sample its events.
    ///
    /// # Errors
    ///
    /// Returns a precondition error for malformed configuration or inputs,
    /// or [`SamplingError::Resource`] if a provider fails. Nothing is drawn
    /// before all inputs have been checked.
    pub fn run(&self, observation: &ObservationContext, components: &[ModelComponent]) -> Result<EventTable, SamplingError> {
        let mut ordered: Vec<&ModelComponent> = components.iter().collect();
        ordered.sort_by_key(|component| component.info().id);
        reject_duplicates(ordered.iter().map(|component| component.info().id))?;
        ordered.iter().try_for_each(|component| check_identity(component.info()))?;

        let snapshots = ordered
            .into_iter()
            .map(|component| component.snapshot(observation))
            .collect::<Result<Vec<_>, _>>()?;
        self.run_snapshots(observation, snapshots)
    }

    /// Sample events from already materialised component maps.
    ///
    /// # Errors
    ///
    /// As for [`EventSampler::run`], minus provider failures.
    pub fn run_snapshots(
        &self,
        observation: &ObservationContext,
        mut snapshots: Vec<ComponentSnapshot>,
    ) -> Result<EventTable, SamplingError> {
        let mut progress = Progress {
            stage: RunStage::Init,
            obs_id: observation.obs_id.into_inner(),
        };

        // --- Init ---
        let object_name = self.config.require_object_name()?.to_owned();
        observation.validate()?;
        snapshots.sort_by_key(|snapshot| snapshot.info.id);
        reject_duplicates(snapshots.iter().map(|snapshot| snapshot.info.id))?;
        snapshots.iter().try_for_each(|snapshot| check_identity(&snapshot.info))?;

        info!(
            obs_id = %observation.obs_id,
            object = %object_name,
            components = snapshots.len(),
            seed = self.config.seed,
            "Sampling run started"
        );

        for snapshot in &snapshots {
            snapshot.map.validate(snapshot.info.id)?;
            TemporalAssigner::for_map(observation, &snapshot.map).validate(snapshot.info.id, &snapshot.map)?;
        }
        progress.advance();

        // --- Counts ---
        let mut rng = random_state(self.config.seed);
        let sampler = DiscreteSampler::new(self.config.count_mode);
        let counts = snapshots
            .iter()
            .map(|snapshot| sampler.sample(snapshot.info.id, &snapshot.map, &mut rng))
            .collect::<Result<Vec<CellCounts>, _>>()?;
        progress.advance();

        // --- Coordinates ---
        let resampler = InverseCdfResampler::new();
        let photons: Vec<Vec<TruePhoton>> = snapshots
            .iter()
            .zip(&counts)
            .map(|(snapshot, cell_counts)| resampler.resample(&snapshot.map, cell_counts, &mut rng))
            .collect();
        progress.advance();

        // --- Response ---
        let perturber = ResponsePerturber::for_observation(observation, self.config.domain_policy);
        let perturbed: Vec<(Vec<(TruePhoton, Reconstructed)>, DomainReport)> = photons
            .iter()
            .map(|batch| perturber.perturb_all(batch, &mut rng))
            .collect();
        progress.advance();

        // --- Times and composition ---
        let mut batches = Vec::with_capacity(snapshots.len());
        for ((snapshot, cell_counts), (kept, report)) in snapshots.into_iter().zip(&counts).zip(perturbed) {
            let id = snapshot.info.id;
            let assigner = TemporalAssigner::for_map(observation, &snapshot.map);
            let mut events = Vec::with_capacity(kept.len());
            for (photon, reco) in kept {
                let time = assigner.assign(id, photon.time_bin, &mut rng)?;
                events.push(Event {
                    event_id: EventId::default(),
                    component_id: id,
                    true_position: photon.position,
                    true_energy: photon.energy,
                    reco_position: reco.position,
                    reco_energy: reco.energy,
                    time,
                });
            }
            batches.push(EventBatch {
                expected: snapshot.map.total(),
                sampled: cell_counts.total(),
                info: snapshot.info,
                events,
                report,
            });
        }

        let header = TableHeader {
            object_name,
            obs_id: observation.obs_id,
            seed: self.config.seed,
            created_at: self.config.created_at.unwrap_or_else(Utc::now),
            count_mode: self.config.count_mode,
            domain_policy: self.config.domain_policy,
            livetime: observation.livetime,
            gti: observation.gti.clone(),
        };
        let table = EventCompositor::new().compose(header, batches)?;
        progress.advance();

        let domain = table.meta().domain_total();
        info!(
            obs_id = %observation.obs_id,
            events = table.len(),
            dropped = domain.dropped,
            clamped = domain.clamped,
            "Sampling run finished"
        );
        progress.advance();
        Ok(table)
    }
}

/// Sample one observation with `config`.
///
/// Shorthand for [`EventSampler::run`].
///
/// # Errors
///
/// See [`EventSampler::run`].
pub fn sample_events(
    config: &SamplerConfig,
    observation: &ObservationContext,
    components: &[ModelComponent],
) -> Result<EventTable, SamplingError> {
    EventSampler::new(config.clone()).run(observation, components)
}

/// Fail on the first repeated identifier of a sorted sequence.
fn reject_duplicates(ids: impl Iterator<Item = ComponentId>) -> Result<(), SamplingError> {
    let mut previous = None;
    for id in ids {
        if previous == Some(id) {
            return Err(SamplingError::DuplicateComponent(id));
        }
        previous = Some(id);
    }
    Ok(())
}

/// Id 0 is reserved for the background and the background only.
const fn check_identity(info: &ComponentInfo) -> Result<(), SamplingError> {
    if info.id.is_background() == info.kind.is_background() {
        Ok(())
    } else {
        Err(SamplingError::InvalidComponentId {
            component: info.id,
            kind: info.kind,
        })
    }
}

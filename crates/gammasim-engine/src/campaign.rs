//! Multi-observation campaigns.
//!
//! Every selected observation is sampled independently on the blocking
//! pool, at most `campaign.max_parallel` at a time. Each one gets its own
//! seed, derived from the base seed and its position in the campaign, so
//! the output does not depend on scheduling. Event files land in the
//! output directory and the [`ObservationIndex`] is written last.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info};

use gammasim_core::EventSampler;
use gammasim_core::config::SimulationConfig;
use gammasim_core::rng::observation_seed;
use gammasim_store::{ObservationEntry, ObservationIndex, StoreError, event_file_name, write_event_file};

use crate::bundle::ObservationInput;
use crate::error::EngineError;

/// Sample every observation, write its event file and the index.
///
/// Observations are indexed by id; files are named after the id.
///
/// # Errors
///
/// Fails on the first observation that cannot be sampled or written, if
/// two observations share an id, or if the output directory cannot be
/// created. Files already written by other workers are left in place.
pub async fn run_campaign(
    config: &SimulationConfig,
    observations: Vec<ObservationInput>,
) -> Result<ObservationIndex, EngineError> {
    let mut seen = BTreeSet::new();
    if let Some(dup) = observations
        .iter()
        .map(|input| input.observation.obs_id)
        .find(|id| !seen.insert(*id))
    {
        return Err(StoreError::DuplicateObservation(dup).into());
    }

    let dir = config.output.dir.clone();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| EngineError::OutputDir {
            path: dir.clone(),
            source,
        })?;

    info!(
        observations = observations.len(),
        max_parallel = config.campaign.max_parallel,
        output = %dir.display(),
        "Campaign started"
    );

    let workers = Arc::new(Semaphore::new(config.campaign.max_parallel.max(1)));
    let mut handles = Vec::with_capacity(observations.len());
    for (input, position) in observations.into_iter().zip(0_u64..) {
        let seed = observation_seed(config.sampling.seed, position);
        let sampler = EventSampler::new(config.sampling.sampler_config(seed));
        let workers = Arc::clone(&workers);
        let dir = dir.clone();
        handles.push(tokio::spawn(async move {
            let _permit = workers.acquire_owned().await?;
            tokio::task::spawn_blocking(move || sample_observation(&sampler, &input, &dir)).await?
        }));
    }

    let mut index = ObservationIndex::new();
    for handle in handles {
        let entry = handle.await??;
        index.insert(entry)?;
    }

    let index_path = config.output.index_path();
    index.save(&index_path)?;
    info!(
        observations = index.len(),
        total_events = index.total_events(),
        livetime = index.total_livetime(),
        index = %index_path.display(),
        "Campaign finished"
    );
    Ok(index)
}

fn sample_observation(
    sampler: &EventSampler,
    input: &ObservationInput,
    dir: &Path,
) -> Result<ObservationEntry, EngineError> {
    let obs_id = input.observation.obs_id;
    debug!(%obs_id, seed = sampler.config().seed, components = input.components.len(), "Sampling observation");

    let table = sampler
        .run(&input.observation, &input.model_components())
        .map_err(|source| EngineError::Sampling { obs_id, source })?;

    let name = event_file_name(obs_id);
    let path: PathBuf = dir.join(&name);
    write_event_file(&path, &table)?;
    Ok(ObservationEntry::from_table(&table, name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use gammasim_core::geom::{EnergyAxis, LinearAxis, SkyGrid};
    use gammasim_core::gti::GoodTimeIntervals;
    use gammasim_core::irf::{EdispTable, PsfTable};
    use gammasim_core::map::IntensityMap;
    use gammasim_core::observation::ObservationContext;
    use gammasim_store::read_event_file;
    use gammasim_types::{ComponentId, ComponentKind, ObservationId, SkyCoord};

    use crate::bundle::ComponentInput;

    fn input(id: u64) -> ObservationInput {
        let energy = EnergyAxis::new(vec![0.1, 1.0, 10.0]).unwrap();
        let grid = SkyGrid::new(SkyCoord::new(83.6, 22.0), 0.1, 3, 3).unwrap();
        ObservationInput {
            observation: ObservationContext {
                obs_id: ObservationId::new(id),
                pointing: SkyCoord::new(83.6, 22.0),
                livetime: 600.0,
                start_time: 0.0,
                gti: GoodTimeIntervals::from_pairs(&[(0.0, 300.0), (400.0, 700.0)]).unwrap(),
                psf: PsfTable::new(
                    energy.clone(),
                    LinearAxis::new(vec![0.0, 5.0]).unwrap(),
                    LinearAxis::new(vec![0.0, 0.05]).unwrap(),
                    vec![1.0, 1.0],
                )
                .unwrap(),
                edisp: EdispTable::diagonal(energy.clone()),
            },
            components: vec![
                ComponentInput {
                    id: ComponentId::BACKGROUND,
                    name: "bkg".to_owned(),
                    kind: ComponentKind::Background,
                    map: IntensityMap::new(grid.clone(), energy.clone(), None, vec![2.0; 18]).unwrap(),
                },
                ComponentInput {
                    id: ComponentId::new(1),
                    name: "crab".to_owned(),
                    kind: ComponentKind::PointSource,
                    map: IntensityMap::new(grid, energy, None, vec![0.5; 18]).unwrap(),
                },
            ],
        }
    }

    fn config(dir: &Path) -> SimulationConfig {
        let mut config =
            SimulationConfig::parse("sampling:\n  object_name: Crab\n  seed: 7\ncampaign:\n  max_parallel: 2\n").unwrap();
        config.output.dir = dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn campaign_writes_files_and_index() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        let index = run_campaign(&config, vec![input(3), input(1), input(2)]).await.unwrap();

        assert_eq!(index.len(), 3);
        let loaded = ObservationIndex::load(&config.output.index_path()).unwrap();
        assert_eq!(loaded, index);

        for entry in index.iter() {
            let table = read_event_file(&tmp.path().join(&entry.file)).unwrap();
            assert_eq!(table.meta().obs_id, entry.obs_id);
            assert_eq!(table.meta().total_events, entry.total_events);
            assert_eq!(table.meta().object_name, "Crab");
        }

        // Seeds follow campaign order, not id order.
        assert_eq!(index.get(ObservationId::new(3)).unwrap().seed, 7);
        assert_eq!(index.get(ObservationId::new(1)).unwrap().seed, 8);
        assert_eq!(index.get(ObservationId::new(2)).unwrap().seed, 9);
    }

    #[tokio::test]
    async fn output_does_not_depend_on_parallelism() {
        let serial_dir = tempfile::tempdir().unwrap();
        let mut serial = config(serial_dir.path());
        serial.campaign.max_parallel = 1;
        let parallel_dir = tempfile::tempdir().unwrap();
        let parallel = config(parallel_dir.path());

        let inputs = vec![input(10), input(11), input(12), input(13)];
        let a = run_campaign(&serial, inputs.clone()).await.unwrap();
        let b = run_campaign(&parallel, inputs).await.unwrap();

        for (x, y) in a.iter().zip(b.iter()) {
            let tx = read_event_file(&serial_dir.path().join(&x.file)).unwrap();
            let ty = read_event_file(&parallel_dir.path().join(&y.file)).unwrap();
            assert_eq!(tx.events(), ty.events());
            assert_eq!(tx.meta().components, ty.meta().components);
        }
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected_before_sampling() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        let config = config(&out);
        let result = run_campaign(&config, vec![input(5), input(5)]).await;
        assert!(matches!(
            result,
            Err(EngineError::Store {
                source: StoreError::DuplicateObservation(_)
            })
        ));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn missing_object_name_fails_the_observation() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.sampling.object_name = None;
        let result = run_campaign(&config, vec![input(1)]).await;
        assert!(matches!(result, Err(EngineError::Sampling { .. })));
        assert!(!config.output.index_path().exists());
    }

    #[tokio::test]
    async fn unusable_output_dir_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let config = config(&blocker.join("events"));
        let result = run_campaign(&config, vec![input(1)]).await;
        assert!(matches!(result, Err(EngineError::OutputDir { .. })));
    }
}

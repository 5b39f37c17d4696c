//! Assembly of per-component batches into one event table.

use chrono::{DateTime, Utc};
use tracing::debug;

use gammasim_types::{ComponentInfo, ComponentMapping, CountMode, DomainPolicy, Event, ObservationId};

use crate::error::SamplingError;
use crate::gti::GoodTimeIntervals;
use crate::response::DomainReport;
use crate::table::{number_events, ComponentSummary, EventTable, EventTableMeta};

/// The events of one component, in sampling order.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBatch {
    /// Component the events came from.
    pub info: ComponentInfo,
    /// Total expected counts of the component's map.
    pub expected: f64,
    /// Photons realised before the response was applied.
    pub sampled: u64,
    /// Surviving events; identifiers are assigned on composition.
    pub events: Vec<Event>,
    /// Domain violations met while applying the response.
    pub report: DomainReport,
}

/// Run-level provenance stamped on the composed table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableHeader {
    /// Name of the simulated object.
    pub object_name: String,
    /// Observation the events belong to.
    pub obs_id: ObservationId,
    /// Seed of the run's generator.
    pub seed: u64,
    /// Creation time recorded in the metadata.
    pub created_at: DateTime<Utc>,
    /// Count realisation mode of the run.
    pub count_mode: CountMode,
    /// Domain policy of the run.
    pub domain_policy: DomainPolicy,
    /// Live time of the observation in seconds.
    pub livetime: f64,
    /// Good time intervals of the observation.
    pub gti: GoodTimeIntervals,
}

/// Concatenates batches in ascending component order and numbers events.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventCompositor;

impl EventCompositor {
    /// Create a compositor.
    pub const fn new() -> Self {
        Self
    }

    /// Compose `batches` into an event table.
    ///
    /// Batches may arrive in any order; the output is grouped by ascending
    /// component identifier with each batch's internal order preserved.
    /// Every event appears exactly once and identifiers run `1..=N`.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::DuplicateComponent`] if two batches share a
    /// component identifier.
    pub fn compose(&self, header: TableHeader, mut batches: Vec<EventBatch>) -> Result<EventTable, SamplingError> {
        batches.sort_by_key(|batch| batch.info.id);
        let duplicate = batches.windows(2).find_map(|pair| match pair {
            [first, second] if first.info.id == second.info.id => Some(second.info.id),
            _ => None,
        });
        if let Some(id) = duplicate {
            return Err(SamplingError::DuplicateComponent(id));
        }

        let total: usize = batches.iter().map(|batch| batch.events.len()).sum();
        let mut events = Vec::with_capacity(total);
        let mut mapping = ComponentMapping::new();
        let mut components = Vec::with_capacity(batches.len());

        for batch in batches {
            debug!(
                component = %batch.info.id,
                name = %batch.info.name,
                events = batch.events.len(),
                dropped = batch.report.dropped,
                clamped = batch.report.clamped,
                "Batch composed"
            );
            components.push(ComponentSummary {
                id: batch.info.id,
                expected: batch.expected,
                sampled: batch.sampled,
                domain: batch.report,
            });
            mapping.insert(batch.info);
            events.extend(batch.events);
        }
        number_events(&mut events);

        let meta = EventTableMeta {
            object_name: header.object_name,
            obs_id: header.obs_id,
            total_events: u64::try_from(events.len()).unwrap_or(u64::MAX),
            created_at: header.created_at,
            seed: header.seed,
            count_mode: header.count_mode,
            domain_policy: header.domain_policy,
            livetime: header.livetime,
            mapping,
            components,
        };
        EventTable::from_parts(meta, header.gti, events)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use gammasim_types::{ComponentId, ComponentKind, EventId, SkyCoord};

    use super::*;

    fn header() -> TableHeader {
        TableHeader {
            object_name: "rx_j1713".to_owned(),
            obs_id: ObservationId::new(23523),
            seed: 0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            count_mode: CountMode::Poisson,
            domain_policy: DomainPolicy::Drop,
            livetime: 1800.0,
            gti: GoodTimeIntervals::from_pairs(&[(0.0, 1800.0)]).unwrap(),
        }
    }

    fn batch(id: u32, times: &[f64]) -> EventBatch {
        let component_id = ComponentId::new(id);
        EventBatch {
            info: ComponentInfo {
                id: component_id,
                name: format!("component-{id}"),
                kind: if id == 0 {
                    ComponentKind::Background
                } else {
                    ComponentKind::Template
                },
            },
            expected: 2.5,
            sampled: u64::try_from(times.len()).unwrap() + 1,
            events: times
                .iter()
                .map(|&time| Event {
                    event_id: EventId::default(),
                    component_id,
                    true_position: SkyCoord::new(0.0, 0.0),
                    true_energy: 1.0,
                    reco_position: SkyCoord::new(0.0, 0.0),
                    reco_energy: 1.0,
                    time,
                })
                .collect(),
            report: DomainReport { dropped: 1, clamped: 0 },
        }
    }

    #[test]
    fn background_first_then_sources_in_id_order() {
        let batches = vec![batch(2, &[5.0, 3.0]), batch(0, &[9.0]), batch(1, &[1.0, 7.0])];
        let table = EventCompositor::new().compose(header(), batches).unwrap();

        let layout: Vec<_> = table
            .events()
            .iter()
            .map(|e| (e.event_id.into_inner(), e.component_id.into_inner(), e.time))
            .collect();
        assert_eq!(
            layout,
            [(1, 0, 9.0), (2, 1, 1.0), (3, 1, 7.0), (4, 2, 5.0), (5, 2, 3.0)]
        );
    }

    #[test]
    fn metadata_carries_bookkeeping() {
        let table = EventCompositor::new()
            .compose(header(), vec![batch(0, &[1.0]), batch(1, &[2.0, 3.0])])
            .unwrap();
        let meta = table.meta();
        assert_eq!(meta.total_events, 3);
        assert_eq!(meta.object_name, "rx_j1713");
        assert_eq!(meta.components.len(), 2);
        assert_eq!(meta.components[1].sampled, 3);
        assert_eq!(meta.components[1].kept(), 2);
        assert_eq!(meta.domain_total().dropped, 2);
        assert_eq!(meta.mapping.name_of(ComponentId::new(1)), Some("component-1"));
    }

    #[test]
    fn duplicate_component_is_rejected() {
        let result = EventCompositor::new().compose(header(), vec![batch(1, &[]), batch(1, &[1.0])]);
        assert!(matches!(result, Err(SamplingError::DuplicateComponent(id)) if id == ComponentId::new(1)));
    }

    #[test]
    fn empty_batches_compose_to_empty_table() {
        let table = EventCompositor::new().compose(header(), vec![batch(0, &[])]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.meta().mapping.len(), 1);
    }
}

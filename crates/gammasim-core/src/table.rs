//! The ordered event table produced by one sampling run.
//!
//! An [`EventTable`] is the only output of a run. Events are ordered by
//! ascending component identifier (background first) and carry sequential
//! identifiers `1..=N` in that order. The table metadata records enough
//! provenance to reproduce the run: seed, count mode, domain policy, the
//! component mapping and per-component bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gammasim_types::{ComponentId, ComponentMapping, CountMode, DomainPolicy, Event, EventId, ObservationId};

use crate::error::SamplingError;
use crate::gti::GoodTimeIntervals;
use crate::response::DomainReport;

/// Per-component bookkeeping of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    /// Component identifier.
    pub id: ComponentId,
    /// Total expected counts of the component's map.
    pub expected: f64,
    /// Photons realised by the counts draw.
    pub sampled: u64,
    /// Photons affected by kernel domain violations.
    pub domain: DomainReport,
}

impl ComponentSummary {
    /// Photons that made it into the table.
    pub const fn kept(&self) -> u64 {
        self.sampled.saturating_sub(self.domain.dropped)
    }

    fn absorb(&mut self, other: &Self) {
        self.expected += other.expected;
        self.sampled = self.sampled.saturating_add(other.sampled);
        self.domain.absorb(other.domain);
    }
}

/// Provenance and bookkeeping attached to an event table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTableMeta {
    /// Name of the simulated object.
    pub object_name: String,
    /// Observation the events belong to.
    pub obs_id: ObservationId,
    /// Number of events in the table.
    pub total_events: u64,
    /// When the table was produced.
    pub created_at: DateTime<Utc>,
    /// Seed the run's generator was created from.
    pub seed: u64,
    /// How counts were realised.
    pub count_mode: CountMode,
    /// How kernel domain violations were handled.
    pub domain_policy: DomainPolicy,
    /// Live time of the observation in seconds.
    pub livetime: f64,
    /// Component identifier to name mapping.
    pub mapping: ComponentMapping,
    /// Per-component bookkeeping in ascending identifier order.
    pub components: Vec<ComponentSummary>,
}

impl EventTableMeta {
    /// Bookkeeping for one component.
    pub fn component(&self, id: ComponentId) -> Option<&ComponentSummary> {
        self.components.iter().find(|summary| summary.id == id)
    }

    /// Domain violations summed over all components.
    pub fn domain_total(&self) -> DomainReport {
        let mut total = DomainReport::default();
        for summary in &self.components {
            total.absorb(summary.domain);
        }
        total
    }
}

/// An ordered, immutable table of simulated events.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    meta: EventTableMeta,
    gti: GoodTimeIntervals,
    events: Vec<Event>,
}

impl EventTable {
    /// Assemble a table from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::ShapeMismatch`] if the metadata event count
    /// disagrees with the events supplied.
    pub fn from_parts(meta: EventTableMeta, gti: GoodTimeIntervals, events: Vec<Event>) -> Result<Self, SamplingError> {
        let actual = events.len();
        if usize::try_from(meta.total_events).ok() != Some(actual) {
            return Err(SamplingError::ShapeMismatch {
                what: "event table",
                expected: usize::try_from(meta.total_events).unwrap_or(usize::MAX),
                actual,
            });
        }
        Ok(Self { meta, gti, events })
    }

    /// Table metadata.
    pub const fn meta(&self) -> &EventTableMeta {
        &self.meta
    }

    /// Good time intervals of the observation.
    pub const fn gti(&self) -> &GoodTimeIntervals {
        &self.gti
    }

    /// All events in table order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the table holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Source name of an event, resolved through the component mapping.
    pub fn source_name(&self, event: &Event) -> Option<&str> {
        self.meta.mapping.name_of(event.component_id)
    }

    /// Events of one component, in table order.
    pub fn events_of(&self, id: ComponentId) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().filter(move |event| event.component_id == id)
    }

    /// Split the table into its parts.
    pub fn into_parts(self) -> (EventTableMeta, GoodTimeIntervals, Vec<Event>) {
        (self.meta, self.gti, self.events)
    }

    /// Stack another table onto this one.
    ///
    /// Events are regrouped by ascending component identifier, keeping this
    /// table's events ahead of `other`'s within a component, and renumbered
    /// from 1. GTIs are united, live times and bookkeeping summed. The
    /// provenance fields (object name, observation, seed, creation time,
    /// modes) are kept from `self`.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::ConflictingComponent`] if the two mappings
    /// disagree on a component's name or kind.
    pub fn stack(self, other: Self) -> Result<Self, SamplingError> {
        let (mut meta, gti, mut events) = self.into_parts();
        let (other_meta, other_gti, other_events) = other.into_parts();

        for info in other_meta.mapping.iter() {
            match meta.mapping.get(info.id) {
                Some(existing) if existing != info => {
                    return Err(SamplingError::ConflictingComponent(info.id));
                }
                Some(_) => {}
                None => {
                    meta.mapping.insert(info.clone());
                }
            }
        }

        for summary in &other_meta.components {
            match meta.components.iter_mut().find(|own| own.id == summary.id) {
                Some(own) => own.absorb(summary),
                None => meta.components.push(*summary),
            }
        }
        meta.components.sort_by_key(|summary| summary.id);

        events.extend(other_events);
        events.sort_by_key(|event| event.component_id);
        number_events(&mut events);

        meta.total_events = u64::try_from(events.len()).unwrap_or(u64::MAX);
        meta.livetime += other_meta.livetime;

        Ok(Self {
            meta,
            gti: gti.union(&other_gti),
            events,
        })
    }
}

/// Assign identifiers `1..=N` in slice order.
pub(crate) fn number_events(events: &mut [Event]) {
    for (id, event) in (1_u64..).zip(events.iter_mut()) {
        event.event_id = EventId::new(id);
    }
}

//! Simulated photon events and the component provenance carried with them.

use serde::{Deserialize, Serialize};

use crate::coords::SkyCoord;
use crate::enums::ComponentKind;
use crate::ids::{ComponentId, EventId};

/// One simulated photon.
///
/// Created once by the sampler and never mutated afterwards, except for
/// the event identifier which the compositor assigns when the final table
/// order is known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Sequential identifier within the event table (1-based).
    pub event_id: EventId,
    /// Originating model component.
    pub component_id: ComponentId,
    /// True arrival direction.
    pub true_position: SkyCoord,
    /// True energy in TeV.
    pub true_energy: f64,
    /// Reconstructed direction after the point-spread function.
    pub reco_position: SkyCoord,
    /// Reconstructed energy in TeV after energy dispersion.
    pub reco_energy: f64,
    /// Absolute time of arrival in seconds (mission elapsed time).
    pub time: f64,
}

/// Identity of one model component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// Monte-Carlo identifier stamped on every event of this component.
    pub id: ComponentId,
    /// Source name resolved for events carrying `id`.
    pub name: String,
    /// What kind of model produced the component.
    pub kind: ComponentKind,
}

/// Explicit component identifier to name mapping carried with an event table.
///
/// Entries are kept sorted by identifier so that the mapping serializes the
/// same way regardless of the order components were registered in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ComponentInfo>", into = "Vec<ComponentInfo>")]
pub struct ComponentMapping {
    entries: Vec<ComponentInfo>,
}

impl ComponentMapping {
    /// Create an empty mapping.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert a component, returning `false` if its identifier is already
    /// mapped (the existing entry is kept).
    pub fn insert(&mut self, info: ComponentInfo) -> bool {
        match self.entries.binary_search_by_key(&info.id, |entry| entry.id) {
            Ok(_) => false,
            Err(position) => {
                self.entries.insert(position, info);
                true
            }
        }
    }

    /// Look up a component by identifier.
    pub fn get(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
            .and_then(|position| self.entries.get(position))
    }

    /// Resolve the source name for a component identifier.
    pub fn name_of(&self, id: ComponentId) -> Option<&str> {
        self.get(id).map(|info| info.name.as_str())
    }

    /// All mapped components in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.entries.iter()
    }

    /// Number of mapped components.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no component is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<ComponentInfo> for ComponentMapping {
    fn from_iter<I: IntoIterator<Item = ComponentInfo>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for info in iter {
            mapping.insert(info);
        }
        mapping
    }
}

impl From<Vec<ComponentInfo>> for ComponentMapping {
    fn from(entries: Vec<ComponentInfo>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<ComponentMapping> for Vec<ComponentInfo> {
    fn from(mapping: ComponentMapping) -> Self {
        mapping.entries
    }
}

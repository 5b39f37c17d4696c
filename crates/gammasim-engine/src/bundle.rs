//! JSON input bundles.
//!
//! A bundle holds everything a campaign samples from: per observation the
//! read-only context (pointing, live time, GTIs, PSF and EDISP tables) and
//! the materialised expected-counts map of every model component. All
//! shape and range checks of the core types run while the bundle is
//! parsed, so a bundle that loads is structurally valid.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use gammasim_core::map::IntensityMap;
use gammasim_core::observation::ObservationContext;
use gammasim_core::provider::ModelComponent;
use gammasim_types::{ComponentId, ComponentKind, ObservationId};

use crate::error::EngineError;

/// One model component with its evaluated map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInput {
    /// Monte-Carlo identifier (0 for the background).
    pub id: ComponentId,
    /// Source name.
    pub name: String,
    /// Model kind.
    pub kind: ComponentKind,
    /// Expected counts for this observation.
    pub map: IntensityMap,
}

/// One observation and its components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationInput {
    /// Observation context.
    pub observation: ObservationContext,
    /// Model components to sample.
    pub components: Vec<ComponentInput>,
}

impl ObservationInput {
    /// Register the components for a sampling run.
    pub fn model_components(&self) -> Vec<ModelComponent> {
        self.components
            .iter()
            .map(|input| ModelComponent::new(input.id, input.name.clone(), input.kind, input.map.clone()))
            .collect()
    }
}

/// The inputs of a campaign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputBundle {
    /// Observations in campaign order.
    pub observations: Vec<ObservationInput>,
}

impl InputBundle {
    /// Read a bundle from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::BundleIo`] if the file cannot be read and
    /// [`EngineError::BundleParse`] if it is not a valid bundle.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let bytes = std::fs::read(path).map_err(|source| EngineError::BundleIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| EngineError::BundleParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Keep only the listed observations, in the listed order.
    ///
    /// An empty list keeps every observation in bundle order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateSelection`] if an id is listed
    /// twice and [`EngineError::UnknownObservation`] for an id the bundle
    /// does not contain.
    pub fn select(self, ids: &[u64]) -> Result<Vec<ObservationInput>, EngineError> {
        if ids.is_empty() {
            return Ok(self.observations);
        }
        let mut requested = BTreeSet::new();
        if let Some(&dup) = ids.iter().find(|&&raw| !requested.insert(raw)) {
            return Err(EngineError::DuplicateSelection(ObservationId::new(dup)));
        }
        let mut available = self.observations;
        ids.iter()
            .map(|&raw| {
                let id = ObservationId::new(raw);
                available
                    .iter()
                    .position(|input| input.observation.obs_id == id)
                    .map(|position| available.swap_remove(position))
                    .ok_or(EngineError::UnknownObservation(id))
            })
            .collect()
    }
}

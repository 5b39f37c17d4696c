//! Predicted-counts providers and read-only component snapshots.
//!
//! Every model component, whatever its spatial or spectral shape, is seen
//! by the sampler through one capability: [`PredictedCounts::npred`], which
//! evaluates its expected-counts map for an observation. The
//! [`ComponentKind`] tag records what kind of model it was for provenance
//! only.
//!
//! Providers are evaluated exactly once per run, before sampling, into
//! [`ComponentSnapshot`]s. The sampler never sees a provider again, so a
//! model mutated elsewhere cannot leak into a run halfway through.

use gammasim_types::{ComponentId, ComponentInfo, ComponentKind};

use crate::error::SamplingError;
use crate::map::IntensityMap;
use crate::observation::ObservationContext;

/// Error type returned by providers; passed through unchanged.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// A source of expected-counts maps.
///
/// Implementations might evaluate a parametric model against exposure and
/// response, read a precomputed map from disk, or return a fixed map.
pub trait PredictedCounts: Send + Sync {
    /// Evaluate the expected-counts map for `observation`.
    ///
    /// # Errors
    ///
    /// Returns any failure to materialise the map. The sampler wraps it in
    /// [`SamplingError::Resource`] without inspecting it.
    fn npred(&self, observation: &ObservationContext) -> Result<IntensityMap, ProviderError>;
}

impl PredictedCounts for IntensityMap {
    fn npred(&self, _observation: &ObservationContext) -> Result<IntensityMap, ProviderError> {
        Ok(self.clone())
    }
}

/// One model component registered for a sampling run.
pub struct ModelComponent {
    info: ComponentInfo,
    provider: Box<dyn PredictedCounts>,
}

impl ModelComponent {
    /// Register a component under an explicit Monte-Carlo identifier.
    pub fn new(
        id: ComponentId,
        name: impl Into<String>,
        kind: ComponentKind,
        provider: impl PredictedCounts + 'static,
    ) -> Self {
        Self {
            info: ComponentInfo {
                id,
                name: name.into(),
                kind,
            },
            provider: Box::new(provider),
        }
    }

    /// Identity of this component.
    pub const fn info(&self) -> &ComponentInfo {
        &self.info
    }

    /// Evaluate the provider into a read-only snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::Resource`] if the provider fails.
    pub fn snapshot(&self, observation: &ObservationContext) -> Result<ComponentSnapshot, SamplingError> {
        let map = self
            .provider
            .npred(observation)
            .map_err(|source| SamplingError::Resource {
                component: self.info.id,
                source,
            })?;
        Ok(ComponentSnapshot {
            info: self.info.clone(),
            map,
        })
    }
}

impl core::fmt::Debug for ModelComponent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModelComponent")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// A component's materialised expected-counts map.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSnapshot {
    /// Identity of the component.
    pub info: ComponentInfo,
    /// Expected counts, immutable for the rest of the run.
    pub map: IntensityMap,
}

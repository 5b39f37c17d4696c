//! Enumeration types shared by the sampler, the store and the engine.

use serde::{Deserialize, Serialize};

/// The kind of model component a predicted-counts map came from.
///
/// This is a capability tag only: every kind is sampled the same way once
/// its intensity map has been evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Instrumental (residual hadron) background.
    Background,
    /// Spatially unresolved source.
    PointSource,
    /// Extended source described by a spatial template.
    Template,
    /// Large-scale diffuse emission.
    Diffuse,
}

impl ComponentKind {
    /// Whether this component is the instrumental background.
    pub const fn is_background(self) -> bool {
        matches!(self, Self::Background)
    }
}

/// How per-cell event counts are realised from the expected intensity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// Independent Poisson draw per cell.
    #[default]
    Poisson,
    /// Rounded intensity, no random draws. For reproducibility checks.
    Rounded,
}

/// What to do with a photon whose true energy or offset lies outside a
/// response kernel's domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPolicy {
    /// Remove the photon from the batch and count the drop.
    #[default]
    Drop,
    /// Look up the nearest valid kernel bin and count the clamp.
    Clamp,
}

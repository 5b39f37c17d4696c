//! Shared type definitions for the gammasim event sampler.
//!
//! This crate holds the plain data that flows between the sampling engine,
//! the event store and the engine binary. It carries no sampling logic.
//!
//! # Modules
//!
//! - [`ids`] -- Integer identifier newtypes (observation, component, event)
//! - [`coords`] -- Spherical sky coordinates and great-circle helpers
//! - [`enums`] -- Component kinds, count realisation mode, domain policy
//! - [`event`] -- The simulated [`Event`] record and component provenance

pub mod coords;
pub mod enums;
pub mod event;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use coords::SkyCoord;
pub use enums::{ComponentKind, CountMode, DomainPolicy};
pub use event::{ComponentInfo, ComponentMapping, Event};
pub use ids::{ComponentId, EventId, ObservationId};

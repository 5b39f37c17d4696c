//! Type-safe integer identifier wrappers.
//!
//! Observations, model components and events are all numbered with plain
//! integers in the output tables. Wrapping each in its own newtype prevents
//! an observation id from being passed where a component id is expected.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around an unsigned integer with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Wrap a raw integer value.
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Return the inner integer value.
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of one observation (pointing run).
    ObservationId(u64)
}

define_id! {
    /// Monte-Carlo identifier of a model component.
    ///
    /// `0` is reserved for the background; sources and diffuse components
    /// use `1..` in the order the caller assigns them.
    ComponentId(u32)
}

define_id! {
    /// Sequential identifier of an event within one event table (1-based).
    EventId(u64)
}

impl ComponentId {
    /// The identifier reserved for the instrumental background.
    pub const BACKGROUND: Self = Self(0);

    /// Whether this identifier denotes the background component.
    pub const fn is_background(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_id_is_zero() {
        assert!(ComponentId::BACKGROUND.is_background());
        assert!(!ComponentId::new(1).is_background());
        assert_eq!(ComponentId::BACKGROUND.into_inner(), 0);
    }

    #[test]
    fn id_serializes_transparently() {
        let json = serde_json::to_string(&ObservationId::new(23523)).ok();
        assert_eq!(json.as_deref(), Some("23523"));
        let restored: Result<ObservationId, _> = serde_json::from_str("23523");
        assert_eq!(restored.ok(), Some(ObservationId(23523)));
    }

    #[test]
    fn ids_order_numerically() {
        assert!(ComponentId::new(0) < ComponentId::new(2));
        assert_eq!(EventId::new(7).to_string(), "7");
    }
}

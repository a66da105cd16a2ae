//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every addressable object in the environment has a strongly-typed ID so
//! that an entity identifier can never be handed to an API expecting a
//! place or portal identifier. IDs use UUID v7 (time-ordered), which also
//! gives places a stable canonical order for lock acquisition.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a transparent newtype around [`Uuid`].
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// A fresh, time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// The underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// A world entity, static or mobile.
    EntityId
}

define_id! {
    /// A place.
    PlaceId
}

define_id! {
    /// A portal between two places.
    PortalId
}

define_id! {
    /// An agent emitting influences.
    AgentId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn later_ids_sort_after_earlier_ones() {
        let first = PlaceId::new();
        let second = PlaceId::new();
        assert!(first < second);
    }

    #[test]
    fn display_parses_back() {
        let id = EntityId::new();
        assert_eq!(id.to_string().parse::<EntityId>().unwrap(), id);
        assert!("not-a-uuid".parse::<EntityId>().is_err());
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let id = PortalId::from(Uuid::nil());
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"00000000-0000-0000-0000-000000000000\""
        );
    }
}

//
// Copyright 2025 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Stable identifiers
//!
//! Live world objects are never held by reference. Components keep one of
//! these ids and resolve the object on demand, so a record can outlive the
//! world object (and vice versa) without dangling structures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Compact hyphen-free form, used in generated file and definition names
            pub fn as_simple(&self) -> String {
                self.0.simple().to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::from_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id! {
    /// Identity of a configured citizen record
    CitizenId
}

uuid_id! {
    /// Identity of a world instance
    WorldId
}

uuid_id! {
    /// Identity of a live in-world actor
    ActorId
}

uuid_id! {
    /// Identity of a connected player
    PlayerId
}

uuid_id! {
    /// Identity of a name-display entity
    DisplayId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(CitizenId::new(), CitizenId::new());
    }

    #[test]
    fn test_roundtrip_through_string() {
        let id = CitizenId::new();
        let parsed: CitizenId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_simple_form_has_no_hyphens() {
        let id = CitizenId::new();
        assert!(!id.as_simple().contains('-'));
        assert_eq!(id.as_simple().len(), 32);
    }

    #[test]
    fn test_serde_transparent() {
        let id = WorldId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: WorldId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}

//! Opaque identifier newtypes.
//!
//! Every id in the sync core is an opaque string on the wire but gets a
//! small newtype wrapper locally so call sites can't accidentally mix a
//! session id with a queue item id. Mirrors the `TaskID`/`PlaceID` shape
//! the rest of the pack uses for domain identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

opaque_id!(SessionId);
opaque_id!(QueueItemId);
opaque_id!(DeviceId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_roundtrip_through_json() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);

        let json = serde_json::to_string(&a).unwrap();
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }
}

//! Strongly-typed ID wrappers for tracked entity types
//!
//! Newtype wrappers keep keys of different entity types from being mixed up
//! at compile time, while the revision log files every key as a plain UUID.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Macro to generate ID newtype wrappers
macro_rules! define_id {
    ($name:ident, $display_prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse an ID, with or without its display prefix
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                s.parse()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                let s = s.strip_prefix($display_prefix).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id!(BookId, "book-");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_id_creation() {
        let id = BookId::new();
        assert!(!id.as_uuid().is_nil());
        assert_ne!(id, BookId::new());
    }

    #[test]
    fn test_display_carries_full_uuid() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = BookId::parse(uuid_str).unwrap();
        assert_eq!(id.to_string(), format!("book-{}", uuid_str));
    }

    #[test]
    fn test_display_parses_back() {
        let id = BookId::new();
        let parsed: BookId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_serializes_as_bare_uuid() {
        let id = BookId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(BookId::parse("book-not-a-uuid").is_err());
    }
}

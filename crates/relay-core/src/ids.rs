//! Opaque identifier newtypes.
//!
//! Every identifier in the system is a thin wrapper around `String` rather
//! than a bare `String` threaded through every signature. This keeps
//! `task_id` and `request_id` from being accidentally swapped at a call site.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

string_id!(TaskId);
string_id!(SessionId);
string_id!(UserId);
string_id!(RequestId);
string_id!(ElicitationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrips_the_raw_value() {
        let id = TaskId::new("task-123");
        assert_eq!(id.to_string(), "task-123");
        assert_eq!(id.as_str(), "task-123");
    }

    #[test]
    fn ordering_is_lexicographic_on_the_wrapped_string() {
        let a = TaskId::new("task-1");
        let b = TaskId::new("task-2");
        assert!(a < b);
    }

    #[test]
    fn generate_produces_distinct_ids() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }
}

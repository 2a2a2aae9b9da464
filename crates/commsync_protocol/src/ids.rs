//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an id from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Thread (chat or calendar community) id.
    ThreadId
);
string_id!(
    /// User id.
    UserId
);
string_id!(
    /// Calendar entry id.
    EntryId
);
string_id!(
    /// Opaque session handle (cookie or generated session id).
    SessionId
);

/// Server-assigned message id. Higher ids were assigned later.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_transparently() {
        let id = ThreadId::new("256");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"256\"");
        assert_eq!(serde_json::to_string(&MessageId(7)).unwrap(), "7");
        assert_eq!(id.to_string(), "256");
        assert_eq!(UserId::from("5").as_str(), "5");
    }

    #[test]
    fn message_ids_order_by_assignment() {
        assert!(MessageId(9) < MessageId(10));
    }
}

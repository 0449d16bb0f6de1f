//! Identifier types for the chat history store.
//!
//! Conversations and messages are addressed by UUID newtypes so the two can
//! never be swapped at a call site. Owners are opaque strings handed to us by
//! the authentication layer; [`OwnerId`] only checks that they are usable.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::core::errors::{HistoryError, HistoryResult};

/// Declare a UUID newtype with a consistent API.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Create a new random identifier.
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[inline]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the underlying UUID.
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Whether this is the all-zero UUID, which is never a valid identity.
            #[inline]
            #[must_use]
            pub const fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Parse a stored or user-supplied string.
            ///
            /// # Errors
            /// Returns a validation error if the text is not a UUID.
            pub fn parse(value: &str) -> HistoryResult<Self> {
                value.parse().map_err(|err| {
                    HistoryError::Validation(format!(
                        "invalid {} {value:?}: {err}",
                        stringify!($name)
                    ))
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_uuid_id!(
    /// Business identity of a conversation. Unique across the whole store.
    ConversationId
);

define_uuid_id!(
    /// Identity of one message node. Unique across the whole store.
    MessageId
);

/// Identifier of the user owning a conversation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    /// Hard ceiling to prevent pathological payloads.
    pub const MAX_LEN: usize = 256;

    /// Build a validated `OwnerId`.
    ///
    /// Rules:
    /// - Non-empty after trimming.
    /// - At most [`Self::MAX_LEN`] bytes.
    /// - No control characters.
    ///
    /// # Errors
    /// Returns a validation error when any rule is broken.
    pub fn new(value: impl Into<String>) -> HistoryResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(HistoryError::Validation(
                "owner id must not be empty".to_string(),
            ));
        }
        if value.len() > Self::MAX_LEN {
            return Err(HistoryError::Validation(format!(
                "owner id too long: got {}, max {}",
                value.len(),
                Self::MAX_LEN
            )));
        }
        if let Some((index, ch)) = value.char_indices().find(|(_, ch)| ch.is_control()) {
            return Err(HistoryError::Validation(format!(
                "owner id contains control character {ch:?} at index {index}"
            )));
        }
        Ok(Self(value))
    }

    /// Borrow as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OwnerId {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for OwnerId {
    type Error = HistoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        value.0
    }
}

impl AsRef<str> for OwnerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

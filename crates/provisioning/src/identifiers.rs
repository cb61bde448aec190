//! Newtype domain identifiers.
//!
//! Every value that identifies something (a message, a GitLab project, a
//! configured backend instance) is a distinct newtype wrapping a primitive.
//! This prevents accidentally passing a [`UserId`] where a [`ProjectId`] is
//! expected even though both are `u64` on the wire.
//!
//! Deserialisation enforces the same invariants as the constructors, so a
//! payload that decodes successfully never carries an empty name or a
//! non-numeric id.

use serde::{de, Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display,
// and a Deserialize impl that rejects blank values.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).ok_or_else(|| de::Error::custom("must not be blank"))
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (GitLab-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display, and a Deserialize impl
// accepting either a JSON number or a numeric string.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                NumericId::deserialize(deserializer)?
                    .into_u64()
                    .map(Self)
                    .map_err(de::Error::custom)
            }
        }
    };
}

/// Wire shape of a numeric id: producers send both `42` and `"42"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericId {
    Number(u64),
    Text(String),
}

impl NumericId {
    fn into_u64(self) -> Result<u64, String> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("expected a non-negative integer, got {s:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers: GitLab-integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies a GitLab project (the numeric project id, not its path).
    ProjectId
}

u64_id! {
    /// Identifies a GitLab user.
    UserId
}

u64_id! {
    /// Identifies a GitLab namespace (group or user namespace) by id.
    NamespaceId
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Producer-assigned identifier of one message (`header.messageId`).
    MessageId
}

string_id! {
    /// Identifier tying together messages that belong to one business flow.
    CorrelationId
}

string_id! {
    /// Logical name of a configured GitLab instance (the payload's `gitType`).
    ///
    /// Names are matched case-insensitively; see [`InstanceName::lookup_key`].
    InstanceName
}

string_id! {
    /// Display name of a GitLab project to be created.
    ProjectName
}

string_id! {
    /// A Git branch name (e.g. `"main"`).
    BranchName
}

impl MessageId {
    /// Generates a new random message id (UUID v4).
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl InstanceName {
    /// Returns the key used for registry lookups.
    ///
    /// Two instance names that differ only by letter case share a key.
    pub fn lookup_key(&self) -> String {
        self.0.to_lowercase()
    }
}

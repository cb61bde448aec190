//! Shared value types for the provisioning domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! values with invariants (access levels come from a fixed GitLab scale,
//! timestamps are UTC) and participate in handler decisions.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::NamespaceId;

// ---------------------------------------------------------------------------
// Access levels
// ---------------------------------------------------------------------------

/// A GitLab project membership access level.
///
/// GitLab encodes roles as integers: 5 = Minimal access, 10 = Guest,
/// 15 = Planner, 20 = Reporter, 30 = Developer, 40 = Maintainer, 50 = Owner.
/// Any other value is rejected at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AccessLevel(u8);

impl AccessLevel {
    /// Developer role; applied when a message omits `access_level`.
    pub const DEVELOPER: Self = Self(30);

    /// Maintainer role; used for protected-branch push and merge rights.
    pub const MAINTAINER: Self = Self(40);

    const VALID: [u8; 7] = [5, 10, 15, 20, 30, 40, 50];

    /// Creates an [`AccessLevel`], returning `None` for values outside the
    /// GitLab role scale.
    #[must_use]
    pub fn new(value: u64) -> Option<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| Self::VALID.contains(v))
            .map(Self)
    }

    /// Returns the numeric level as sent to the GitLab API.
    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl Default for AccessLevel {
    fn default() -> Self {
        Self::DEVELOPER
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for AccessLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        let value = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n,
            Raw::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| de::Error::custom(format!("invalid access level {s:?}")))?,
        };
        Self::new(value)
            .ok_or_else(|| de::Error::custom(format!("unsupported access level {value}")))
    }
}

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

/// Target namespace for a fork.
///
/// Producers send either the numeric namespace id or the full namespace path;
/// both are forwarded to GitLab unchanged under the matching parameter name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Namespace {
    /// Numeric namespace id (`namespace_id`).
    Id(NamespaceId),
    /// Full namespace path such as `"group/subgroup"` (`namespace_path`).
    Path(String),
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an ISO-8601 / RFC 3339 timestamp.
    ///
    /// A missing offset is read as UTC, matching producers that emit
    /// `2024-05-01T10:00:00` without a zone designator.
    pub fn parse(value: &str) -> Option<Self> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(Self(dt.with_timezone(&Utc)));
        }
        chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| Self(naive.and_utc()))
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

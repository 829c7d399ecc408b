// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Schema Version
//!
//! Semver-style version value object for schema definitions.
//!
//! A version is a `(major, minor, patch)` triple plus a creation timestamp
//! and free-form description. Ordering compares only the numeric triple, so
//! two registrations of the same triple at different times are the same
//! version. A version with `major >= 1` is a breaking change: the registry
//! refuses to treat it as compatible with older active versions.
//!
//! # Examples
//!
//! ```
//! use docpipe_domain::value_objects::SchemaVersion;
//!
//! let v1 = SchemaVersion::new(1, 0, 0);
//! let v2 = SchemaVersion::new(1, 2, 3);
//! assert!(v1 < v2);
//! assert!(v2.is_breaking());
//! assert_eq!(v2.to_string(), "1.2.3");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::PipelineError;

/// Represents a schema version with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version number; `>= 1` marks a breaking change
    pub major: u32,
    /// Minor version number
    pub minor: u32,
    /// Patch version number
    pub patch: u32,
    /// When this version was created (UTC)
    #[serde(with = "crate::services::datetime_serde")]
    pub created_at: DateTime<Utc>,
    /// Version change description
    #[serde(default)]
    pub description: String,
}

impl SchemaVersion {
    /// Creates a version stamped with the current UTC time.
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            created_at: Utc::now(),
            description: String::new(),
        }
    }

    /// Creates a version with a change description.
    pub fn with_description(major: u32, minor: u32, patch: u32, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::new(major, minor, patch)
        }
    }

    /// Checks if this version represents a breaking change.
    pub fn is_breaking(&self) -> bool {
        self.major >= 1
    }

    /// The numeric triple, for ordering and file naming.
    pub fn triple(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

// Equality and ordering consider the numeric triple only; created_at and
// description are metadata about the registration, not identity.
impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.triple() == other.triple()
    }
}

impl Eq for SchemaVersion {}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple().cmp(&other.triple())
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(PipelineError::validation(format!(
                "Invalid schema version '{}': expected MAJOR.MINOR.PATCH",
                s
            )));
        }
        let parse = |part: &str| {
            part.parse::<u32>().map_err(|e| {
                PipelineError::validation(format!("Invalid schema version '{}': {}", s, e))
            })
        };
        Ok(Self::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }
}

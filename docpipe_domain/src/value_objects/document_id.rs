// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document Identifier
//!
//! Type-safe UUID v4 identifier for documents and their lineage records.
//!
//! Wrapping the raw `Uuid` prevents accidental mixing with other id-shaped
//! strings and gives the lineage store a total order over records: a
//! multi-record mutation (the Referenced/Dereferenced side-effect pairs,
//! the detach cascade on delete) applies its side effects in ascending
//! `DocumentId` order under the store-wide lock, so history timestamps
//! across the touched records come out deterministic.
//!
//! # Examples
//!
//! ```
//! use docpipe_domain::value_objects::DocumentId;
//! use std::str::FromStr;
//!
//! let id = DocumentId::new();
//! let parsed = DocumentId::from_str(&id.to_string()).unwrap();
//! assert_eq!(id, parsed);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::PipelineError;

/// Unique identifier for a document.
///
/// Generated as UUID v4 at load time when the source does not supply one.
/// Equality, hashing, and ordering all delegate to the underlying UUID;
/// the ordering is what multi-record lineage mutations iterate their
/// side effects in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generates a fresh random (v4) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// The nil identifier. Only meaningful as a sentinel in tests.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| PipelineError::validation(format!("Invalid document id '{}': {}", s, e)))
    }
}

impl From<Uuid> for DocumentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

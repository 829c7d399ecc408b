// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document Lineage
//!
//! Entities for tracking document lineage: source provenance, version
//! history, and the relationship graph (parent/children and the directed
//! reference graph).
//!
//! ## Entity Characteristics
//!
//! A `DocumentLineage` is an entity keyed by its `DocumentId`. It mutates
//! over time but its identity persists; every mutation appends exactly one
//! `ChangeRecord` to an append-only history.
//!
//! ## Invariants
//!
//! - `history` is append-only and strictly version-ordered: the record at
//!   index `i` carries `version == i + 1`, and `current_version` equals the
//!   version of the last record.
//! - `children_ids` of X is exactly the set of records whose `parent_id`
//!   is X; `referenced_by_ids` of X is exactly the set of records whose
//!   `reference_ids` contain X. The lineage store maintains both sides of
//!   each pair atomically.
//! - The reference graph is acyclic at every observable state (enforced by
//!   the store's cycle check, not by this entity).
//!
//! Collections are ordered (`BTreeSet` / `BTreeMap`) so serialization is
//! deterministic and the JSON round-trip preserves every field, including
//! history order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::services::datetime_serde;
use crate::value_objects::DocumentId;
use crate::PipelineError;

/// Kind of change made to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Lineage record was created
    Created,
    /// Document content or metadata changed
    Updated,
    /// Lineage record was removed
    Deleted,
    /// A pipeline stage processed the document (also used for
    /// parent-side bookkeeping when children attach or detach)
    Processed,
    /// An outgoing reference was added
    Referenced,
    /// An outgoing reference was removed
    Dereferenced,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeType::Created => "created",
            ChangeType::Updated => "updated",
            ChangeType::Deleted => "deleted",
            ChangeType::Processed => "processed",
            ChangeType::Referenced => "referenced",
            ChangeType::Dereferenced => "dereferenced",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ChangeType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(ChangeType::Created),
            "updated" => Ok(ChangeType::Updated),
            "deleted" => Ok(ChangeType::Deleted),
            "processed" => Ok(ChangeType::Processed),
            "referenced" => Ok(ChangeType::Referenced),
            "dereferenced" => Ok(ChangeType::Dereferenced),
            _ => Err(PipelineError::validation(format!("Unknown change type: {}", s))),
        }
    }
}

/// Information about a document's source system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Identifier of the document inside the source system
    pub source_id: String,
    /// Type of source (e.g. filesystem, export, api)
    pub source_type: String,
    /// Location within the source
    pub location: String,
    /// Source-specific metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SourceInfo {
    pub fn new(
        source_id: impl Into<String>,
        source_type: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_type: source_type.into(),
            location: location.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Record of a single change made to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// When the change occurred (UTC)
    #[serde(with = "datetime_serde")]
    pub timestamp: DateTime<Utc>,
    /// Kind of change
    pub change_type: ChangeType,
    /// Document the change belongs to
    pub document_id: DocumentId,
    /// Version assigned by this change; equals the record's 1-based
    /// position in the history
    pub version: u64,
    /// Source snapshot, when the change carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_info: Option<SourceInfo>,
    /// Change-specific metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Parent assigned by this change, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<DocumentId>,
    /// Related documents involved in a reference change
    #[serde(default)]
    pub related_ids: BTreeSet<DocumentId>,
}

/// Complete lineage information for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLineage {
    /// Document this lineage belongs to
    pub document_id: DocumentId,
    /// Version assigned by the latest change (monotone, >= 1 once created)
    pub current_version: u64,
    /// Current source information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_info: Option<SourceInfo>,
    /// Parent document, when derived from one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<DocumentId>,
    /// Documents whose `parent_id` is this document
    #[serde(default)]
    pub children_ids: BTreeSet<DocumentId>,
    /// Outgoing references
    #[serde(default)]
    pub reference_ids: BTreeSet<DocumentId>,
    /// Incoming references
    #[serde(default)]
    pub referenced_by_ids: BTreeSet<DocumentId>,
    /// Append-only, version-ordered change history
    #[serde(default)]
    pub history: Vec<ChangeRecord>,
    /// Per-stage processing steps, in start-time order; retained for the
    /// life of this record
    #[serde(default)]
    pub processing_steps: Vec<crate::entities::ProcessingStep>,
    /// Current document metadata accumulated across changes
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Arguments for appending a change record.
///
/// All fields are optional; `ChangeType` alone is enough for a bare
/// version bump. The explicit struct keeps `add_change` call sites
/// readable where the original grew a long positional parameter list.
#[derive(Debug, Clone, Default)]
pub struct ChangeInput {
    pub source_info: Option<SourceInfo>,
    pub metadata: Option<BTreeMap<String, String>>,
    pub parent_id: Option<DocumentId>,
    pub related_ids: Option<BTreeSet<DocumentId>>,
}

impl ChangeInput {
    pub fn with_metadata(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(key.into(), value.into());
        Self {
            metadata: Some(metadata),
            ..Self::default()
        }
    }

    pub fn with_related(related: impl IntoIterator<Item = DocumentId>) -> Self {
        Self {
            related_ids: Some(related.into_iter().collect()),
            ..Self::default()
        }
    }
}

impl DocumentLineage {
    /// Creates an empty lineage shell with no history.
    ///
    /// Callers append the Created record immediately; an empty history is
    /// never observable outside the store's creation critical section.
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            current_version: 0,
            source_info: None,
            parent_id: None,
            children_ids: BTreeSet::new(),
            reference_ids: BTreeSet::new(),
            referenced_by_ids: BTreeSet::new(),
            history: Vec::new(),
            processing_steps: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Appends a change record and applies its side effects to this record.
    ///
    /// The assigned version is the record's 1-based position in the history,
    /// so the first (Created) record carries version 1 and
    /// `current_version` always equals `history.len()`.
    ///
    /// Side effects by change kind:
    /// - any: `source_info` replaces the current one when supplied;
    ///   metadata entries are merged in; a supplied `parent_id` is adopted
    /// - `Referenced`: related ids are added to `reference_ids`
    /// - `Dereferenced`: related ids are removed from `reference_ids`
    ///
    /// Symmetric mutation of the *other* record in a reference pair is the
    /// store's job, under its lock.
    pub fn add_change(&mut self, change_type: ChangeType, input: ChangeInput) -> &ChangeRecord {
        let version = self.history.len() as u64 + 1;
        self.current_version = version;

        if let Some(ref source_info) = input.source_info {
            self.source_info = Some(source_info.clone());
        }
        if let Some(ref metadata) = input.metadata {
            self.metadata.extend(metadata.clone());
        }
        if let Some(parent_id) = input.parent_id {
            self.parent_id = Some(parent_id);
        }
        if let Some(ref related) = input.related_ids {
            match change_type {
                ChangeType::Referenced => self.reference_ids.extend(related.iter().copied()),
                ChangeType::Dereferenced => {
                    for id in related {
                        self.reference_ids.remove(id);
                    }
                }
                _ => {}
            }
        }

        self.history.push(ChangeRecord {
            timestamp: Utc::now(),
            change_type,
            document_id: self.document_id,
            version,
            source_info: input.source_info,
            metadata: input.metadata.unwrap_or_default(),
            parent_id: input.parent_id,
            related_ids: input.related_ids.unwrap_or_default(),
        });
        // push cannot leave history empty here
        self.history.last().unwrap_or_else(|| unreachable!())
    }

    /// All changes strictly after the given version.
    pub fn changes_since(&self, version: u64) -> Vec<&ChangeRecord> {
        self.history.iter().filter(|c| c.version > version).collect()
    }

    /// Every document related to this one: parent, children, references,
    /// and documents referencing this one.
    pub fn related_documents(&self) -> BTreeSet<DocumentId> {
        let mut related = BTreeSet::new();
        if let Some(parent) = self.parent_id {
            related.insert(parent);
        }
        related.extend(self.children_ids.iter().copied());
        related.extend(self.reference_ids.iter().copied());
        related.extend(self.referenced_by_ids.iter().copied());
        related
    }

    /// True when the record participates in any relationship.
    pub fn has_relationships(&self) -> bool {
        self.parent_id.is_some()
            || !self.children_ids.is_empty()
            || !self.reference_ids.is_empty()
            || !self.referenced_by_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(id: DocumentId) -> DocumentLineage {
        let mut lineage = DocumentLineage::new(id);
        lineage.add_change(ChangeType::Created, ChangeInput::default());
        lineage
    }

    #[test]
    fn test_created_record_carries_version_one() {
        let lineage = created(DocumentId::new());
        assert_eq!(lineage.current_version, 1);
        assert_eq!(lineage.history.len(), 1);
        assert_eq!(lineage.history[0].version, 1);
        assert_eq!(lineage.history[0].change_type, ChangeType::Created);
    }

    #[test]
    fn test_versions_equal_one_based_history_index() {
        let mut lineage = created(DocumentId::new());
        lineage.add_change(ChangeType::Updated, ChangeInput::default());
        lineage.add_change(ChangeType::Processed, ChangeInput::default());
        for (i, record) in lineage.history.iter().enumerate() {
            assert_eq!(record.version, i as u64 + 1);
        }
        assert_eq!(lineage.current_version, 3);
    }

    #[test]
    fn test_referenced_change_extends_reference_ids() {
        let mut lineage = created(DocumentId::new());
        let target = DocumentId::new();
        lineage.add_change(ChangeType::Referenced, ChangeInput::with_related([target]));
        assert!(lineage.reference_ids.contains(&target));

        lineage.add_change(ChangeType::Dereferenced, ChangeInput::with_related([target]));
        assert!(lineage.reference_ids.is_empty());
    }

    #[test]
    fn test_metadata_merges_across_changes() {
        let mut lineage = created(DocumentId::new());
        lineage.add_change(ChangeType::Updated, ChangeInput::with_metadata("a", "1"));
        lineage.add_change(ChangeType::Updated, ChangeInput::with_metadata("b", "2"));
        assert_eq!(lineage.metadata.get("a").map(String::as_str), Some("1"));
        assert_eq!(lineage.metadata.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_changes_since_filters_by_version() {
        let mut lineage = created(DocumentId::new());
        lineage.add_change(ChangeType::Updated, ChangeInput::default());
        lineage.add_change(ChangeType::Processed, ChangeInput::default());
        let recent = lineage.changes_since(1);
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|c| c.version > 1));
    }

    #[test]
    fn test_related_documents_union() {
        let mut lineage = created(DocumentId::new());
        let parent = DocumentId::new();
        let child = DocumentId::new();
        let reference = DocumentId::new();
        let referrer = DocumentId::new();
        lineage.parent_id = Some(parent);
        lineage.children_ids.insert(child);
        lineage.reference_ids.insert(reference);
        lineage.referenced_by_ids.insert(referrer);

        let related = lineage.related_documents();
        assert_eq!(related.len(), 4);
        assert!(lineage.has_relationships());
    }

    #[test]
    fn test_serde_round_trip_preserves_history_order() {
        let mut lineage = created(DocumentId::new());
        lineage.add_change(
            ChangeType::Referenced,
            ChangeInput::with_related([DocumentId::new()]),
        );
        lineage.add_change(ChangeType::Updated, ChangeInput::with_metadata("k", "v"));

        let json = serde_json::to_string(&lineage).unwrap();
        let back: DocumentLineage = serde_json::from_str(&json).unwrap();
        assert_eq!(lineage, back);
        let versions: Vec<u64> = back.history.iter().map(|c| c.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_change_type_display_and_parse() {
        for kind in [
            ChangeType::Created,
            ChangeType::Updated,
            ChangeType::Deleted,
            ChangeType::Processed,
            ChangeType::Referenced,
            ChangeType::Dereferenced,
        ] {
            let parsed: ChangeType = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("unknown".parse::<ChangeType>().is_err());
    }
}

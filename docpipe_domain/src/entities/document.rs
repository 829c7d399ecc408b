// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document
//!
//! The document aggregate flowing through the pipeline: content, metadata,
//! embeddings, and relationships. Stages enrich a document in place and
//! hand it to the next stage; the lineage store records what happened to
//! it, keyed by the same `DocumentId`.
//!
//! ## Invariants
//!
//! - `id` is unique across a run (generated at load when the source does
//!   not supply one)
//! - `content.body` is UTF-8 (guaranteed by `String`) and is truncated to
//!   the configured maximum with a recorded warning step
//! - any embedding present is finite-valued with its declared dimension
//!   (enforced by [`EmbeddingVector`])
//! - any `relationships` id that is present must resolve in the lineage
//!   store (enforced there, not here)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::services::datetime_serde;
use crate::value_objects::{DocumentId, EmbeddingVector};
use crate::PipelineError;

/// Version tag for embeddings produced by the current pipeline.
pub const EMBEDDING_VERSION: &str = "v1";

/// Version tag recorded when embedding generation failed entirely.
pub const EMBEDDING_VERSION_FAILED: &str = "v1_failed";

/// Document content: the body text and an optional generated summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Required document metadata plus free-form extras.
///
/// The extras map carries stage annotations (PII analysis, clustering) as
/// JSON values; required fields are explicit so their presence is checked
/// at construction instead of at every consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub source: String,
    #[serde(with = "datetime_serde")]
    pub timestamp: DateTime<Utc>,
    pub path: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DocumentMetadata {
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            timestamp,
            path: path.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Inserts a stage annotation under the given key.
    pub fn annotate(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.extra.insert(key.into(), value);
    }
}

/// Embedding record: document-level vectors, model identity, and the
/// per-chunk vectors they were averaged from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEmbeddings {
    /// Vector over the full body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<EmbeddingVector>,
    /// Vector over the summary, when one was generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<EmbeddingVector>,
    /// Model identifier that produced the vectors
    pub model: String,
    /// Version tag; `v1_failed` when generation failed wholesale
    pub version: String,
    /// Per-chunk vectors, when chunked embedding ran
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<EmbeddingVector>,
    /// Failure description when generation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentEmbeddings {
    /// An empty record for a document that has not been embedded yet.
    pub fn empty(model: impl Into<String>) -> Self {
        Self {
            body: None,
            summary: None,
            model: model.into(),
            version: EMBEDDING_VERSION.to_string(),
            chunks: Vec::new(),
            error: None,
        }
    }

    /// Marks the record as failed, clearing any partial vectors.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.body = None;
        self.summary = None;
        self.chunks.clear();
        self.version = EMBEDDING_VERSION_FAILED.to_string();
        self.error = Some(error.into());
    }

    pub fn is_failed(&self) -> bool {
        self.version == EMBEDDING_VERSION_FAILED
    }
}

/// Relationship declarations carried on the document itself.
///
/// The lineage store is the authority for the relationship graph; these
/// fields are what the loader observed in the source and what the store
/// validates on creation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentRelationships {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<DocumentId>,
    #[serde(default)]
    pub reference_ids: BTreeSet<DocumentId>,
}

/// A document moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub content: DocumentContent,
    pub metadata: DocumentMetadata,
    pub embeddings: DocumentEmbeddings,
    #[serde(default)]
    pub relationships: DocumentRelationships,
}

impl Document {
    /// Builds a document with a fresh id and an empty embedding record.
    pub fn new(body: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: DocumentId::new(),
            content: DocumentContent {
                body: body.into(),
                summary: None,
            },
            metadata,
            embeddings: DocumentEmbeddings::empty("unassigned"),
            relationships: DocumentRelationships::default(),
        }
    }

    /// Validates the shape every stage relies on.
    ///
    /// The body must be non-empty; an embedding marked failed must carry
    /// its error; a summary, when present, must be non-empty.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.content.body.is_empty() {
            return Err(PipelineError::validation(format!(
                "Document {} has an empty body",
                self.id
            )));
        }
        if let Some(ref summary) = self.content.summary {
            if summary.is_empty() {
                return Err(PipelineError::validation(format!(
                    "Document {} has an empty summary",
                    self.id
                )));
            }
        }
        if self.embeddings.is_failed() && self.embeddings.error.is_none() {
            return Err(PipelineError::validation(format!(
                "Document {} marked embedding-failed without an error",
                self.id
            )));
        }
        Ok(())
    }

    /// Truncates the body to at most `max_len` bytes on a char boundary.
    ///
    /// Returns `true` when truncation happened so the caller can record
    /// a warning step for it.
    pub fn truncate_body(&mut self, max_len: usize) -> bool {
        if self.content.body.len() <= max_len {
            return false;
        }
        let mut cut = max_len;
        while cut > 0 && !self.content.body.is_char_boundary(cut) {
            cut -= 1;
        }
        self.content.body.truncate(cut);
        true
    }

    /// Whitespace-separated word count of the body.
    pub fn word_count(&self) -> usize {
        self.content.body.split_whitespace().count()
    }

    /// True when the document carries a usable body vector.
    pub fn has_body_vector(&self) -> bool {
        self.embeddings.body.is_some() && !self.embeddings.is_failed()
    }
}

// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Vector Index Port
//!
//! Collaborator contract for the external vector index. The index itself
//! (storage, ANN search, replication) is out of scope; the pipeline
//! consumes exactly these five operations:
//!
//! - `upsert_batch`: idempotent insert-or-update by id; reports per-item
//!   failures without failing the batch
//! - `delete`: idempotent; a missing id reports `NotFound`, which the
//!   caller treats as success-with-warning
//! - `update`: overwrites only supplied fields; a supplied vector
//!   replaces the stored one wholesale
//! - `semantic_search` / `hybrid_search`: scored retrieval
//!
//! Adapters own connection handling, per-request timeouts, and wire
//! formats. Retry with backoff is the indexer stage's policy, not the
//! client's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::value_objects::DocumentId;
use crate::PipelineError;

/// One record offered to the index in an upsert batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: DocumentId,
    /// Content payload stored alongside the vector
    pub content: serde_json::Value,
    /// Body vector
    pub vector: Vec<f32>,
}

/// Per-item failure inside an otherwise successful batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertItemError {
    pub id: DocumentId,
    pub message: String,
}

/// Outcome of a batch upsert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertReport {
    pub ok_count: usize,
    #[serde(default)]
    pub item_errors: Vec<UpsertItemError>,
}

/// Outcome of a delete; missing ids are reported, not errored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// A single search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: DocumentId,
    pub content: String,
    pub metadata: serde_json::Value,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Port to the external vector index.
#[async_trait]
pub trait VectorIndexClient: Send + Sync {
    /// Upserts a batch into the named class. Item errors do not fail the
    /// call; communication failures do.
    async fn upsert_batch(
        &self,
        class_name: &str,
        records: &[IndexRecord],
    ) -> Result<UpsertReport, PipelineError>;

    /// Deletes by id. Idempotent.
    async fn delete(&self, id: DocumentId) -> Result<DeleteOutcome, PipelineError>;

    /// Partial update; `vector`, when supplied, replaces the stored one.
    async fn update(
        &self,
        id: DocumentId,
        partial_fields: serde_json::Value,
        vector: Option<Vec<f32>>,
    ) -> Result<(), PipelineError>;

    /// Nearest-neighbour search over vectors.
    async fn semantic_search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        extra_props: Option<&[String]>,
    ) -> Result<Vec<SearchResult>, PipelineError>;

    /// Blended keyword/vector search; `alpha` weights the vector side.
    async fn hybrid_search(
        &self,
        text: &str,
        vector: &[f32],
        limit: usize,
        alpha: f32,
        extra_props: Option<&[String]>,
    ) -> Result<Vec<SearchResult>, PipelineError>;
}

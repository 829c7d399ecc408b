// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Lineage Manager
//!
//! The read-through facade over [`LineageStore`] and [`LineageCache`]
//! that every stage talks to. It enforces the invalidation ordering rule:
//! for any mutation, the touched ids (the record itself plus everything
//! its relationship sets involve) go pending *before* the store mutation,
//! and the pending set clears only after the mutation committed; so a
//! concurrent reader either sees the old version from the store or
//! nothing from the cache, never a stale payload after commit.

use std::collections::BTreeSet;
use std::sync::Arc;

use docpipe_domain::{
    ChangeInput, ChangeRecord, ChangeType, DocumentId, DocumentLineage, PipelineError,
    ProcessingStep, SourceInfo,
};

use super::cache::LineageCache;
use super::store::LineageStore;

/// Facade coupling the lineage store with its cache.
pub struct LineageManager {
    store: Arc<LineageStore>,
    cache: Arc<LineageCache>,
}

impl LineageManager {
    pub fn new(store: Arc<LineageStore>, cache: Arc<LineageCache>) -> Self {
        Self { store, cache }
    }

    /// The underlying store, for invariant assertions in tests.
    pub fn store(&self) -> &Arc<LineageStore> {
        &self.store
    }

    /// The cache layer, exposed for pending-set assertions.
    pub fn cache(&self) -> &Arc<LineageCache> {
        &self.cache
    }

    /// Creates a lineage record, invalidating the parent's cache entry
    /// alongside the new id.
    pub async fn create(
        &self,
        id: DocumentId,
        source_info: Option<SourceInfo>,
        parent_id: Option<DocumentId>,
    ) -> Result<DocumentLineage, PipelineError> {
        let mut touched = BTreeSet::from([id]);
        touched.extend(parent_id);
        self.cache.begin_invalidation(touched).await;
        let result = self.store.create(id, source_info, parent_id);
        self.cache.clear_pending().await;
        result
    }

    /// Appends a change, flushing the cache entries of the record and of
    /// every related id before the mutation lands.
    pub async fn update(
        &self,
        id: DocumentId,
        change_type: ChangeType,
        input: ChangeInput,
    ) -> Result<DocumentLineage, PipelineError> {
        let mut touched = BTreeSet::from([id]);
        if let Some(related) = &input.related_ids {
            touched.extend(related.iter().copied());
        }
        // relationship neighbours can also change (e.g. version bumps on
        // symmetric Referenced entries recorded on targets)
        if let Some(existing) = self.store.get(id) {
            touched.extend(existing.related_documents());
        }
        self.cache.begin_invalidation(touched).await;
        let result = self.store.update(id, change_type, input);
        self.cache.clear_pending().await;
        result
    }

    /// Deletes a record; every relationship neighbour is flushed since
    /// the detach mutates them all.
    pub async fn delete(&self, id: DocumentId) -> Result<(), PipelineError> {
        let mut touched = BTreeSet::from([id]);
        if let Some(existing) = self.store.get(id) {
            touched.extend(existing.related_documents());
        }
        self.cache.begin_invalidation(touched).await;
        let result = self.store.delete(id);
        self.cache.clear_pending().await;
        result
    }

    /// Read-through get: cache first, then store (populating the cache on
    /// the way out).
    pub async fn get(&self, id: DocumentId) -> Option<DocumentLineage> {
        if let Some(cached) = self.cache.get(id).await {
            return Some(cached);
        }
        let lineage = self.store.get(id)?;
        self.cache.set(&lineage).await;
        Some(lineage)
    }

    /// Change history straight from the store.
    pub fn history(
        &self,
        id: DocumentId,
        since_version: Option<u64>,
    ) -> Result<Vec<ChangeRecord>, PipelineError> {
        self.store.history(id, since_version)
    }

    /// Appends a processing step and drops the cached payload so the next
    /// read sees it.
    pub async fn record_step(
        &self,
        id: DocumentId,
        step: ProcessingStep,
    ) -> Result<(), PipelineError> {
        self.cache.begin_invalidation([id]).await;
        let result = self.store.record_step(id, step);
        self.cache.clear_pending().await;
        result
    }

    /// Ensures a lineage record exists for the document, tolerating
    /// records created by an earlier run.
    pub async fn ensure_created(
        &self,
        id: DocumentId,
        source_info: Option<SourceInfo>,
        parent_id: Option<DocumentId>,
    ) -> Result<(), PipelineError> {
        match self.create(id, source_info, parent_id).await {
            Ok(_) => Ok(()),
            Err(PipelineError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

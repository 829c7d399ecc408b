// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Lineage Cache
//!
//! JSON cache for lineage records keyed by document id, layered over any
//! [`CacheBackend`]. Payloads round-trip every field, including the
//! ordering of `history`.
//!
//! ## Pending Invalidation
//!
//! The consistency rule: when a lineage is mutated, its cache entry and
//! the entries of every record whose relationship sets reference it must
//! be invalidated *before* the mutation is visible. The pending set is
//! that mechanism; an id in the set forces `get` to return empty and
//! turns `set` into a no-op until the set is cleared, so a single logical
//! operation touching N records can flush them all before reads resume.
//!
//! The pending set is taken under its own lock and held for the duration
//! of a multi-record invalidation.
//!
//! Backend failures degrade to no-cache: they are logged and swallowed,
//! never surfaced to the pipeline.

use tokio::sync::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use docpipe_domain::services::CacheBackend;
use docpipe_domain::{DocumentId, DocumentLineage};

/// Key namespace for lineage payloads.
const NAMESPACE: &str = "lineage";

/// Cache manager for document lineage payloads.
pub struct LineageCache {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
    pending_invalidations: Mutex<BTreeSet<DocumentId>>,
}

impl LineageCache {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            pending_invalidations: Mutex::new(BTreeSet::new()),
        }
    }

    fn key(document_id: DocumentId) -> String {
        format!("{}:{}", NAMESPACE, document_id)
    }

    async fn is_pending(&self, document_id: DocumentId) -> bool {
        self.pending_invalidations.lock().await.contains(&document_id)
    }

    /// Fetches a cached lineage; empty while the id is pending
    /// invalidation or on any backend/deserialization problem.
    pub async fn get(&self, document_id: DocumentId) -> Option<DocumentLineage> {
        if self.is_pending(document_id).await {
            return None;
        }
        let payload = match self.backend.get(&Self::key(document_id)).await {
            Ok(payload) => payload?,
            Err(e) => {
                tracing::warn!("Lineage cache read failed for {}: {}", document_id, e);
                return None;
            }
        };
        match serde_json::from_slice::<DocumentLineage>(&payload) {
            Ok(lineage) => Some(lineage),
            Err(e) => {
                tracing::warn!("Corrupt lineage cache entry for {}: {}", document_id, e);
                let _ = self.backend.delete(&Self::key(document_id)).await;
                None
            }
        }
    }

    /// Caches a lineage; a no-op while the id is pending invalidation.
    pub async fn set(&self, lineage: &DocumentLineage) {
        if self.is_pending(lineage.document_id).await {
            return;
        }
        let payload = match serde_json::to_vec(lineage) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    "Failed to serialize lineage {} for caching: {}",
                    lineage.document_id,
                    e
                );
                return;
            }
        };
        if let Err(e) = self
            .backend
            .set(&Self::key(lineage.document_id), payload, Some(self.default_ttl))
            .await
        {
            tracing::warn!("Lineage cache write failed for {}: {}", lineage.document_id, e);
        }
    }

    /// Marks a set of ids pending and deletes their backend entries.
    ///
    /// The pending lock is held across the whole flush so no interleaved
    /// `set` can resurrect a stale payload mid-invalidation.
    pub async fn begin_invalidation(&self, ids: impl IntoIterator<Item = DocumentId>) {
        let mut pending = self.pending_invalidations.lock().await;
        let ids: Vec<DocumentId> = ids.into_iter().collect();
        pending.extend(ids.iter().copied());
        for id in &ids {
            if let Err(e) = self.backend.delete(&Self::key(*id)).await {
                tracing::warn!("Lineage cache delete failed for {}: {}", id, e);
            }
        }
    }

    /// Clears the pending set, re-enabling reads and writes.
    pub async fn clear_pending(&self) {
        self.pending_invalidations.lock().await.clear();
    }

    /// Ids currently pending invalidation; a snapshot for assertions.
    pub async fn pending(&self) -> BTreeSet<DocumentId> {
        self.pending_invalidations.lock().await.clone()
    }

    /// Drops every cached lineage and the pending set.
    pub async fn clear(&self) {
        if let Err(e) = self.backend.clear().await {
            tracing::warn!("Lineage cache clear failed: {}", e);
        }
        self.clear_pending().await;
    }
}

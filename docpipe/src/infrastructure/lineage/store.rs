// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Lineage Store
//!
//! In-memory store for document lineage records with the relationship
//! invariants enforced under one lock:
//!
//! - `children_ids` of X is exactly { Y : Y.parent_id = X }
//! - every target of `reference_ids` lists the source in its
//!   `referenced_by_ids`
//! - the reference graph never contains a directed cycle
//! - history appends are monotone: a reader that observed version V will
//!   only ever observe >= V afterwards
//!
//! ## Locking Discipline
//!
//! All mutations run under the store-wide write lock, so a single logical
//! operation that touches N records (Referenced, Dereferenced, delete
//! detach) is atomic: no reader observes half of a symmetric pair. The
//! cycle check runs under the same lock that applies the mutation.
//! Within a multi-record operation, side effects are applied in ascending
//! id order; the order is observable in history timestamps and must stay
//! deterministic.
//!
//! Reads clone the record out of the map so no lock is held while callers
//! inspect history.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use docpipe_domain::{
    ChangeInput, ChangeRecord, ChangeType, DocumentId, DocumentLineage, PipelineError,
    ProcessingStep, SourceInfo,
};

/// Configuration for the lineage store.
#[derive(Debug, Clone)]
pub struct LineageStoreConfig {
    /// Safety bound on reference-chain traversal during the cycle check.
    pub max_reference_depth: usize,
}

impl Default for LineageStoreConfig {
    fn default() -> Self {
        Self {
            max_reference_depth: 10_000,
        }
    }
}

/// Thread-safe in-memory lineage store.
pub struct LineageStore {
    records: RwLock<HashMap<DocumentId, DocumentLineage>>,
    config: LineageStoreConfig,
}

impl LineageStore {
    pub fn new(config: LineageStoreConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Creates a lineage record for a document.
    ///
    /// Fails with `Conflict` when the id already has a record and with
    /// `Validation` when a parent is named but unknown. When a parent is
    /// set, the parent gains the child in `children_ids` plus a Processed
    /// change naming it, all inside the same critical section.
    pub fn create(
        &self,
        id: DocumentId,
        source_info: Option<SourceInfo>,
        parent_id: Option<DocumentId>,
    ) -> Result<DocumentLineage, PipelineError> {
        let mut records = self.records.write();

        if records.contains_key(&id) {
            return Err(PipelineError::conflict(format!(
                "Lineage already exists for document {}",
                id
            )));
        }
        if let Some(parent) = parent_id {
            if !records.contains_key(&parent) {
                return Err(PipelineError::validation(format!(
                    "Parent document {} not found",
                    parent
                )));
            }
        }

        let mut lineage = DocumentLineage::new(id);
        lineage.add_change(
            ChangeType::Created,
            ChangeInput {
                source_info,
                parent_id,
                ..Default::default()
            },
        );

        if let Some(parent) = parent_id {
            if let Some(parent_record) = records.get_mut(&parent) {
                parent_record.children_ids.insert(id);
                parent_record.add_change(
                    ChangeType::Processed,
                    ChangeInput::with_metadata("child_document", id.to_string()),
                );
            }
        }

        records.insert(id, lineage.clone());
        Ok(lineage)
    }

    /// Appends a change to a document and applies its symmetric side
    /// effects.
    ///
    /// For `Referenced`, the cycle check runs first; a detected cycle
    /// fails the whole operation with the offending path and leaves every
    /// record untouched. For `Dereferenced`, the symmetric entries are
    /// removed without a cycle check. Other kinds mutate only the named
    /// record.
    pub fn update(
        &self,
        id: DocumentId,
        change_type: ChangeType,
        input: ChangeInput,
    ) -> Result<DocumentLineage, PipelineError> {
        let mut records = self.records.write();

        if !records.contains_key(&id) {
            return Err(PipelineError::not_found(format!(
                "No lineage found for document {}",
                id
            )));
        }

        if let Some(related) = &input.related_ids {
            let missing: Vec<String> = related
                .iter()
                .filter(|r| !records.contains_key(r))
                .map(|r| r.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(PipelineError::validation(format!(
                    "Related documents not found: {}",
                    missing.join(", ")
                )));
            }
            if change_type == ChangeType::Referenced {
                self.check_cycles(&records, id, related)?;
            }
        }

        let related: BTreeSet<DocumentId> = input.related_ids.clone().unwrap_or_default();

        // unwrap is safe: presence checked above, lock still held
        let lineage = records
            .get_mut(&id)
            .ok_or_else(|| PipelineError::internal("lineage vanished under write lock"))?;
        lineage.add_change(change_type, input);
        let updated = lineage.clone();

        // Symmetric side effects, ascending id order (BTreeSet iteration)
        match change_type {
            ChangeType::Referenced => {
                for target in &related {
                    if let Some(target_record) = records.get_mut(target) {
                        target_record.referenced_by_ids.insert(id);
                        target_record.add_change(
                            ChangeType::Referenced,
                            ChangeInput::with_metadata("referenced_by", id.to_string()),
                        );
                    }
                }
            }
            ChangeType::Dereferenced => {
                for target in &related {
                    if let Some(target_record) = records.get_mut(target) {
                        target_record.referenced_by_ids.remove(&id);
                        target_record.add_change(
                            ChangeType::Dereferenced,
                            ChangeInput::with_metadata("dereferenced_by", id.to_string()),
                        );
                    }
                }
            }
            _ => {}
        }

        Ok(updated)
    }

    /// Deletes a lineage record after detaching every relationship.
    ///
    /// Detach order: parent loses the child (Processed change with
    /// `removed_child`), each referenced target loses the incoming edge
    /// (Dereferenced change), each referrer loses its outgoing edge
    /// (Dereferenced change). A final Deleted change is appended before
    /// the record is dropped. A second delete of the same id yields
    /// `NotFound` with graph state unchanged.
    pub fn delete(&self, id: DocumentId) -> Result<(), PipelineError> {
        let mut records = self.records.write();

        let lineage = records.get(&id).cloned().ok_or_else(|| {
            PipelineError::not_found(format!("No lineage found for document {}", id))
        })?;

        if let Some(parent_id) = lineage.parent_id {
            if let Some(parent) = records.get_mut(&parent_id) {
                parent.children_ids.remove(&id);
                parent.add_change(
                    ChangeType::Processed,
                    ChangeInput::with_metadata("removed_child", id.to_string()),
                );
            }
        }

        for target in &lineage.reference_ids {
            if let Some(target_record) = records.get_mut(target) {
                target_record.referenced_by_ids.remove(&id);
                target_record.add_change(
                    ChangeType::Dereferenced,
                    ChangeInput::with_metadata("dereferenced_by", id.to_string()),
                );
            }
        }

        for referrer in &lineage.referenced_by_ids {
            if let Some(referrer_record) = records.get_mut(referrer) {
                referrer_record.reference_ids.remove(&id);
                referrer_record.add_change(
                    ChangeType::Dereferenced,
                    ChangeInput::with_metadata("removed_reference", id.to_string()),
                );
            }
        }

        if let Some(record) = records.get_mut(&id) {
            record.add_change(ChangeType::Deleted, ChangeInput::default());
        }
        records.remove(&id);
        Ok(())
    }

    /// Read-only snapshot of a record.
    pub fn get(&self, id: DocumentId) -> Option<DocumentLineage> {
        self.records.read().get(&id).cloned()
    }

    /// Change history, optionally only the records after `since_version`.
    pub fn history(
        &self,
        id: DocumentId,
        since_version: Option<u64>,
    ) -> Result<Vec<ChangeRecord>, PipelineError> {
        let records = self.records.read();
        let lineage = records.get(&id).ok_or_else(|| {
            PipelineError::not_found(format!("No lineage found for document {}", id))
        })?;
        Ok(match since_version {
            Some(version) => lineage.changes_since(version).into_iter().cloned().collect(),
            None => lineage.history.clone(),
        })
    }

    /// Appends a processing step to a document's lineage.
    ///
    /// Steps are observability records, not change records: they do not
    /// bump `current_version`.
    pub fn record_step(&self, id: DocumentId, step: ProcessingStep) -> Result<(), PipelineError> {
        let mut records = self.records.write();
        let lineage = records.get_mut(&id).ok_or_else(|| {
            PipelineError::not_found(format!("No lineage found for document {}", id))
        })?;
        lineage.processing_steps.push(step);
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// All stored ids; a snapshot, not a live view.
    pub fn ids(&self) -> Vec<DocumentId> {
        self.records.read().keys().copied().collect()
    }

    /// Worklist DFS over the reference graph looking for a path from any
    /// proposed target back to `source`.
    ///
    /// Runs under the caller's write lock so the graph cannot move under
    /// the check. The traversal carries the path for diagnostics and is
    /// bounded by the configured depth limit.
    fn check_cycles(
        &self,
        records: &HashMap<DocumentId, DocumentLineage>,
        source: DocumentId,
        proposed: &BTreeSet<DocumentId>,
    ) -> Result<(), PipelineError> {
        // Each stack entry is the path from source to the node at the end
        let mut stack: Vec<Vec<DocumentId>> = proposed.iter().map(|r| vec![*r]).collect();

        while let Some(path) = stack.pop() {
            let current = match path.last() {
                Some(current) => *current,
                None => continue,
            };
            if current == source {
                let mut rendered = vec![source];
                rendered.extend(path);
                return Err(PipelineError::cycle(rendered));
            }
            if path.len() >= self.config.max_reference_depth {
                return Err(PipelineError::validation(format!(
                    "Reference chain from {} exceeds depth limit {}",
                    source, self.config.max_reference_depth
                )));
            }
            if let Some(record) = records.get(&current) {
                for next in &record.reference_ids {
                    if path.contains(next) {
                        // re-walking this path cannot reach source first
                        continue;
                    }
                    let mut extended = path.clone();
                    extended.push(*next);
                    stack.push(extended);
                }
            }
        }
        Ok(())
    }
}

impl Default for LineageStore {
    fn default() -> Self {
        Self::new(LineageStoreConfig::default())
    }
}

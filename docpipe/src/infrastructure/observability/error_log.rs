// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Error Log
//!
//! Bounded in-memory record of errors raised during a run, keyed by stage
//! and optionally by document. The structured log file carries the full
//! chain; this buffer is what health aggregation and the end-of-run
//! summary read without re-parsing log files.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;

use docpipe_domain::{DocumentId, PipelineError};

/// One recorded error.
#[derive(Debug, Clone)]
pub struct LoggedError {
    pub timestamp: DateTime<Utc>,
    pub stage: String,
    pub document_id: Option<DocumentId>,
    pub category: &'static str,
    pub message: String,
}

/// Bounded ring buffer of run errors.
pub struct ErrorLog {
    entries: Mutex<VecDeque<LoggedError>>,
    capacity: usize,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Records an error; the oldest entry is dropped at capacity.
    pub fn record(&self, stage: &str, document_id: Option<DocumentId>, error: &PipelineError) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LoggedError {
            timestamp: Utc::now(),
            stage: stage.to_string(),
            document_id,
            category: error.category(),
            message: error.to_string(),
        });
    }

    /// Snapshot of all recorded errors, oldest first.
    pub fn entries(&self) -> Vec<LoggedError> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of recorded errors.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Errors recorded for one stage.
    pub fn for_stage(&self, stage: &str) -> Vec<LoggedError> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.stage == stage)
            .cloned()
            .collect()
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let log = ErrorLog::new(8);
        log.record("embedder", Some(DocumentId::new()), &PipelineError::processing("embedder", "x"));
        log.record("indexer", None, &PipelineError::indexing("y"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.for_stage("embedder").len(), 1);
        assert_eq!(log.entries()[1].category, "indexing");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let log = ErrorLog::new(2);
        for i in 0..4 {
            log.record("loader", None, &PipelineError::Io(format!("e{}", i)));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].message.contains("e2"));
        assert!(entries[1].message.contains("e3"));
    }
}

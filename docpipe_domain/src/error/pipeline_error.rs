// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the hierarchical error system for the document
//! enrichment pipeline. Failures are categorized so callers can decide
//! between retry, per-document isolation, and run abortion without string
//! matching.
//!
//! ## Error Categories
//!
//! - **Validation**: bad parameters, bad input shape, schema-constraint
//!   violations, references to nonexistent records
//! - **CycleDetected**: a reference or schema-dependency update would
//!   introduce a cycle; the message names the offending path
//! - **Conflict**: an attempt to create an entity that already exists
//! - **NotFound**: lookup of a missing entity
//! - **Processing**: document-scoped failure inside a stage (PII,
//!   summarizer, embedder, clusterer); recorded as a step, never propagated
//!   past the failing document
//! - **Indexing**: vector-index communication failure or partial upsert
//! - **Resource**: backend connection, timeout, or quota exhaustion
//! - **StageFailed**: stage-scoped fatal error wrapping the underlying
//!   cause; aborts the run
//!
//! ## Propagation Rules
//!
//! Document-scoped errors (`Processing`, per-item `Indexing` failures) are
//! converted into processing-step records at the stage boundary and do not
//! cross it. Stage-scoped errors propagate as `StageFailed` tagged with the
//! stage name. Cache failures degrade to no-cache and are logged, never
//! fatal. Validation errors on CLI input are terminal before any stage runs.

use thiserror::Error;

/// Domain-specific errors for the document enrichment pipeline.
///
/// Each variant carries a descriptive message. Variants map one-to-one to
/// the failure taxonomy used at stage and store boundaries, so exhaustive
/// matching is a compile-time obligation for callers that partition
/// failures into retryable / document-scoped / fatal.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cycle detected: {0}")]
    CycleDetected(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Processing failed in stage '{stage}': {message}")]
    Processing { stage: String, message: String },

    #[error("Indexing error: {0}")]
    Indexing(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Creates a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a cycle error from the path that closed the cycle.
    ///
    /// The path is rendered `A -> B -> C -> A` so diagnostics name every
    /// record involved.
    pub fn cycle(path: impl IntoIterator<Item = impl ToString>) -> Self {
        let rendered = path
            .into_iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        Self::CycleDetected(rendered)
    }

    /// Creates a new conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Creates a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a document-scoped processing error for the named stage
    pub fn processing(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Processing {
            stage: stage.into(),
            message: msg.into(),
        }
    }

    /// Creates a new indexing error
    pub fn indexing(msg: impl Into<String>) -> Self {
        Self::Indexing(msg.into())
    }

    /// Creates a new resource error
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wraps an error as a stage-scoped fatal failure.
    ///
    /// Stage-scoped errors abort the run; the wrapper preserves the cause
    /// chain so the log line carries the full context.
    pub fn stage_failed(stage: impl Into<String>, cause: PipelineError) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            source: Box::new(cause),
        }
    }

    /// Checks if the error is recoverable by retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Timeout(_) | PipelineError::Resource(_) | PipelineError::Io(_)
        )
    }

    /// Checks whether this error is document-scoped.
    ///
    /// Document-scoped errors are recorded as step records and never abort
    /// the run; everything else is fatal to the operation that raised it.
    pub fn is_document_scoped(&self) -> bool {
        matches!(self, PipelineError::Processing { .. })
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::CycleDetected(_) => "cycle",
            PipelineError::Conflict(_) => "conflict",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::Processing { .. } => "processing",
            PipelineError::Indexing(_) => "indexing",
            PipelineError::Resource(_) => "resource",
            PipelineError::StageFailed { .. } => "stage",
            PipelineError::InvalidConfiguration(_) => "configuration",
            PipelineError::Io(_) => "io",
            PipelineError::Serialization(_) => "serialization",
            PipelineError::Timeout(_) => "timeout",
            PipelineError::Cancelled(_) => "cancellation",
            PipelineError::Internal(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

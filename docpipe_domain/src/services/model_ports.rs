// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Model Ports
//!
//! Interface boundaries for the external enrichment models. The embedding
//! and summarization models are remote services, so their ports are async
//! with per-request timeouts owned by the adapter; the entity recognizer
//! wraps a local NER library and stays synchronous.
//!
//! These contracts are frozen collaborator boundaries: the pipeline never
//! sees model internals, only these methods. Test doubles implement the
//! same traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::EmbeddingVector;
use crate::PipelineError;

/// Port to the external embedding model.
#[async_trait]
pub trait EmbeddingModelService: Send + Sync {
    /// Identifier recorded on every embedding this model produces.
    fn model_id(&self) -> &str;

    /// Dimensionality of the produced vectors.
    fn dimension(&self) -> usize;

    /// Embeds a single text segment.
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, PipelineError>;
}

/// Port to the external summarization model.
#[async_trait]
pub trait SummarizationModelService: Send + Sync {
    /// Summarizes one text segment within the given word-length bounds.
    async fn summarize(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
    ) -> Result<String, PipelineError>;
}

/// Entity categories the PII stage understands.
///
/// NER library labels are mapped into this closed set at the adapter
/// boundary; labels outside the set are dropped there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Organization,
    Location,
    Facility,
    Money,
    Product,
    Event,
    Law,
    Group,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Person => "person",
            EntityKind::Organization => "organization",
            EntityKind::Location => "location",
            EntityKind::Facility => "facility",
            EntityKind::Money => "money",
            EntityKind::Product => "product",
            EntityKind::Event => "event",
            EntityKind::Law => "law",
            EntityKind::Group => "group",
        };
        write!(f, "{}", s)
    }
}

/// A named entity found in text, with byte offsets into the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpan {
    pub kind: EntityKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Port to the NER library wrapper.
///
/// Synchronous: recognition is CPU-bound local work, per the convention
/// that only I/O-bound ports are async.
pub trait EntityRecognizer: Send + Sync {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, PipelineError>;
}

// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain entities: objects with identity that change state over time.

pub mod document;
pub mod document_lineage;
pub mod processing_step;
pub mod schema_definition;

pub use document::{
    Document, DocumentContent, DocumentEmbeddings, DocumentMetadata, DocumentRelationships,
    EMBEDDING_VERSION, EMBEDDING_VERSION_FAILED,
};
pub use document_lineage::{ChangeInput, ChangeRecord, ChangeType, DocumentLineage, SourceInfo};
pub use processing_step::{ProcessingStep, StepStatus};
pub use schema_definition::{
    FieldConstraints, FieldDefinition, FieldType, SchemaDefinition, SchemaKind, SchemaViolation,
};

//! # Document Pipeline Domain
//!
//! The domain layer of the document enrichment pipeline: the business
//! objects and rules that are independent of databases, HTTP clients,
//! file systems, and user interfaces.
//!
//! ## Module Structure
//!
//! - [`entities`]: objects with identity: [`entities::Document`],
//!   [`entities::DocumentLineage`], [`entities::ProcessingStep`],
//!   [`entities::SchemaDefinition`]
//! - [`value_objects`]: immutable self-validating values:
//!   [`value_objects::DocumentId`], [`value_objects::SchemaVersion`],
//!   [`value_objects::EmbeddingVector`]
//! - [`services`]: pure domain services (text chunking, vector math,
//!   content hashing, datetime serialization) and the async ports the
//!   infrastructure layer implements (cache backend, embedding and
//!   summarization models, entity recognizer, vector index client)
//! - [`error`]: the [`PipelineError`] taxonomy shared by every layer
//!
//! ## Business Rules Enforced Here
//!
//! ### Lineage Rules
//! - change history is append-only and strictly version-ordered; the
//!   record at index `i` carries version `i + 1`
//! - relationship side effects (reference additions/removals) are applied
//!   together with the change record that describes them
//!
//! ### Document Rules
//! - bodies are UTF-8 and bounded; truncation is observable as a warning
//! - embeddings are finite-valued vectors of a fixed dimension; a failed
//!   embedding run is visible as a tagged version plus an error, never as
//!   a silently absent vector
//!
//! ### Schema Rules
//! - field types come from a closed set; `schema_ref` fields must name
//!   their target; redefining a parent field requires the override flag
//!
//! Graph-level rules (reference-cycle rejection, parent/child symmetry)
//! need the whole record set and therefore live with the stores in the
//! application crate, built on the primitives defined here.

pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

// Re-export the error type at the crate root; every layer names it
pub use error::PipelineError;

pub use entities::{
    ChangeInput, ChangeRecord, ChangeType, Document, DocumentContent, DocumentEmbeddings,
    DocumentLineage, DocumentMetadata, DocumentRelationships, EMBEDDING_VERSION,
    EMBEDDING_VERSION_FAILED, FieldConstraints, FieldDefinition, FieldType, ProcessingStep,
    SchemaDefinition, SchemaKind, SchemaViolation, SourceInfo, StepStatus,
};
pub use value_objects::{DocumentId, EmbeddingVector, SchemaVersion};

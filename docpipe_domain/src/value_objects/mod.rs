// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Value objects: immutable, self-validating types without identity.

pub mod document_id;
pub mod embedding_vector;
pub mod schema_version;

pub use document_id::DocumentId;
pub use embedding_vector::EmbeddingVector;
pub use schema_version::SchemaVersion;

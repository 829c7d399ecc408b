// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Adapters for external collaborators: the vector index, the embedding
//! and summarization models, and the entity recognizer.

pub mod embedding_model;
pub mod entity_recognizer;
pub mod http_vector_index;
pub mod summarization_model;

pub use embedding_model::{EmbeddingModelConfig, HttpEmbeddingModel};
pub use entity_recognizer::{map_ner_label, HeuristicEntityRecognizer};
pub use http_vector_index::{HttpVectorIndex, HttpVectorIndexConfig};
pub use summarization_model::{HttpSummarizationModel, SummarizationModelConfig};

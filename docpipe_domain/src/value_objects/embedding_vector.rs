// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Embedding Vector
//!
//! Value object for embedding vectors with the invariants the rest of the
//! pipeline relies on:
//!
//! - every component is finite (no NaN / infinity reaches the index)
//! - the dimension is fixed at construction and checked on pairwise ops
//! - L2 normalization leaves zero vectors unchanged rather than dividing
//!   by zero, and is the identity on already-unit vectors
//!
//! The clusterer and the document-level embedding both work in terms of
//! these vectors; raw `Vec<f32>` only appears at the model-client boundary.

use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// A finite-valued embedding vector of fixed dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Validates and wraps raw model output.
    ///
    /// Rejects empty vectors and any non-finite component; the embedder
    /// records the rejection as a per-document error rather than letting a
    /// NaN poison downstream cosine computations.
    pub fn new(values: Vec<f32>) -> Result<Self, PipelineError> {
        if values.is_empty() {
            return Err(PipelineError::validation("Embedding vector must not be empty"));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::validation(format!(
                "Embedding vector has non-finite component at index {}",
                pos
            )));
        }
        Ok(Self(values))
    }

    /// Number of components.
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Borrow the raw components.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Consumes the vector, yielding its components.
    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Euclidean (L2) norm.
    pub fn norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Returns the L2-normalized copy of this vector.
    ///
    /// A zero-norm vector is returned unchanged. Normalizing an already
    /// unit-length vector is the identity (up to float rounding).
    pub fn l2_normalized(&self) -> Self {
        let norm = self.norm();
        if norm == 0.0 {
            return self.clone();
        }
        Self(self.0.iter().map(|v| v / norm).collect())
    }

    /// Cosine similarity with another vector of the same dimension.
    pub fn cosine_similarity(&self, other: &Self) -> Result<f32, PipelineError> {
        if self.dimension() != other.dimension() {
            return Err(PipelineError::validation(format!(
                "Dimension mismatch: {} vs {}",
                self.dimension(),
                other.dimension()
            )));
        }
        let dot: f32 = self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum();
        let denom = self.norm() * other.norm();
        if denom == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / denom)
    }

    /// Component-wise mean of a non-empty set of same-dimension vectors.
    pub fn mean(vectors: &[Self]) -> Result<Self, PipelineError> {
        let first = vectors
            .first()
            .ok_or_else(|| PipelineError::validation("Cannot average zero vectors"))?;
        let dim = first.dimension();
        let mut sums = vec![0.0f32; dim];
        for v in vectors {
            if v.dimension() != dim {
                return Err(PipelineError::validation(format!(
                    "Dimension mismatch in mean: {} vs {}",
                    v.dimension(),
                    dim
                )));
            }
            for (s, c) in sums.iter_mut().zip(v.as_slice()) {
                *s += c;
            }
        }
        let n = vectors.len() as f32;
        Self::new(sums.into_iter().map(|s| s / n).collect())
    }
}

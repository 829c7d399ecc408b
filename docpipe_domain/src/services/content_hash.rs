// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Content Hashing
//!
//! Stable SHA-256 content hash for deduplication. The hash covers the
//! document's `content`, `metadata`, and `embeddings` records serialized
//! as canonical JSON (object keys in sorted order), so two documents with
//! identical content hash identically across runs and processes; a
//! prerequisite for cross-run dedup determinism.
//!
//! The document `id` and `relationships` are deliberately excluded: two
//! loads of the same file get different generated ids but must still
//! collide.

use sha2::{Digest, Sha256};

use crate::entities::Document;
use crate::PipelineError;

/// Hex-encoded SHA-256 over the canonical serialization of `content`,
/// `metadata`, and `embeddings`, keyed in sorted order.
pub fn document_content_hash(document: &Document) -> Result<String, PipelineError> {
    // serde_json's default map keeps keys sorted, which makes Value
    // serialization canonical for our purposes
    let canonical = serde_json::json!({
        "content": serde_json::to_value(&document.content)?,
        "embeddings": serde_json::to_value(&document.embeddings)?,
        "metadata": serde_json::to_value(&document.metadata)?,
    });
    let serialized = serde_json::to_string(&canonical)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Hex-encoded SHA-256 of arbitrary bytes; used for memoization keys.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Document, DocumentMetadata};
    use chrono::{TimeZone, Utc};

    fn document(body: &str, title: &str) -> Document {
        Document::new(
            body,
            DocumentMetadata::new(
                title,
                "export",
                Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
                "a/b.md",
            ),
        )
    }

    #[test]
    fn test_identical_content_same_hash_despite_different_ids() {
        let a = document("same body", "same title");
        let b = document("same body", "same title");
        assert_ne!(a.id, b.id);
        assert_eq!(
            document_content_hash(&a).unwrap(),
            document_content_hash(&b).unwrap()
        );
    }

    #[test]
    fn test_body_change_changes_hash() {
        let a = document("body one", "t");
        let b = document("body two", "t");
        assert_ne!(
            document_content_hash(&a).unwrap(),
            document_content_hash(&b).unwrap()
        );
    }

    #[test]
    fn test_metadata_change_changes_hash() {
        let a = document("body", "title one");
        let b = document("body", "title two");
        assert_ne!(
            document_content_hash(&a).unwrap(),
            document_content_hash(&b).unwrap()
        );
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = document_content_hash(&document("x", "y")).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_bytes_stability() {
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
    }
}

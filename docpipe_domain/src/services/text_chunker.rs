// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Text Chunking
//!
//! Pure text-splitting services shared by the summarizer, embedder, and
//! PII stages. All functions are deterministic, allocation-light, and keep
//! UTF-8 boundaries intact.
//!
//! Three granularities:
//!
//! - **words**: the summarizer splits on whitespace-word windows with
//!   overlap
//! - **approximate tokens**: the embedder bounds chunks by an approximate
//!   token count (4 characters per token, the usual BPE rule of thumb)
//! - **characters**: the PII recognizer processes char-bounded windows so
//!   offsets stay addressable
//!
//! Text shorter than one chunk always yields exactly one chunk.

/// Collapses runs of whitespace to single spaces and strips control
/// characters. Offsets into cleaned text are what the PII matcher records.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.chars() {
        if ch.is_control() && ch != '\n' && ch != '\t' {
            continue;
        }
        if ch.is_whitespace() {
            if !last_was_space && !cleaned.is_empty() {
                cleaned.push(' ');
            }
            last_was_space = true;
        } else {
            cleaned.push(ch);
            last_was_space = false;
        }
    }
    while cleaned.ends_with(' ') {
        cleaned.pop();
    }
    cleaned
}

/// Splits text into windows of `chunk_size` words advancing by
/// `chunk_size - overlap` words.
///
/// `overlap` is clamped below `chunk_size` so the stride is always
/// positive. Empty text yields one empty chunk so per-chunk bookkeeping
/// stays aligned with documents.
pub fn chunk_by_words(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let chunk_size = chunk_size.max(1);
    if words.len() <= chunk_size {
        return vec![words.join(" ")];
    }
    let stride = chunk_size - overlap.min(chunk_size - 1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }
    chunks
}

/// Approximate token count: one token per four characters, minimum one
/// for non-empty text.
pub fn approximate_token_count(text: &str) -> usize {
    let chars = text.chars().count();
    if chars == 0 {
        0
    } else {
        chars.div_ceil(4)
    }
}

/// Splits text into chunks bounded by an approximate token budget.
///
/// Words are accumulated until the budget would be exceeded; `overlap`
/// tokens worth of trailing words carry into the next chunk. A single
/// word larger than the budget becomes its own chunk rather than being
/// split mid-word.
pub fn chunk_by_tokens(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    let max_tokens = max_tokens.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return vec![String::new()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    for word in &words {
        let word_tokens = approximate_token_count(word).max(1);
        if current_tokens + word_tokens > max_tokens && !current.is_empty() {
            chunks.push(current.join(" "));
            // carry trailing words up to the overlap budget
            let mut kept: Vec<&str> = Vec::new();
            let mut kept_tokens = 0usize;
            for w in current.iter().rev() {
                let t = approximate_token_count(w).max(1);
                if kept_tokens + t > overlap_tokens {
                    break;
                }
                kept_tokens += t;
                kept.push(w);
            }
            kept.reverse();
            current = kept;
            current_tokens = kept_tokens;
        }
        current.push(word);
        current_tokens += word_tokens;
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

/// Splits text into character-bounded windows on char boundaries.
pub fn chunk_by_chars(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }
    chars
        .chunks(chunk_size)
        .map(|window| window.iter().collect())
        .collect()
}

/// Truncates text to at most `max_words` whitespace-separated words.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.trim().to_string();
    }
    words[..max_words].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("a  b\t\tc\n\nd"), "a b c d");
        assert_eq!(clean_text("  leading and trailing  "), "leading and trailing");
    }

    #[test]
    fn test_clean_text_strips_control_chars() {
        assert_eq!(clean_text("a\u{0000}b\u{0007}c"), "abc");
    }

    #[test]
    fn test_short_text_is_single_word_chunk() {
        let chunks = chunk_by_words("one two three", 10, 2);
        assert_eq!(chunks, vec!["one two three".to_string()]);
    }

    #[test]
    fn test_word_chunks_overlap() {
        let text = "a b c d e f g h";
        let chunks = chunk_by_words(text, 4, 2);
        assert_eq!(chunks[0], "a b c d");
        assert_eq!(chunks[1], "c d e f");
        assert_eq!(chunks[2], "e f g h");
    }

    #[test]
    fn test_word_chunks_cover_all_words() {
        let words: Vec<String> = (0..53).map(|i| format!("w{}", i)).collect();
        let text = words.join(" ");
        let chunks = chunk_by_words(&text, 10, 3);
        let last = chunks.last().unwrap();
        assert!(last.contains("w52"));
    }

    #[test]
    fn test_token_count_approximation() {
        assert_eq!(approximate_token_count(""), 0);
        assert_eq!(approximate_token_count("abcd"), 1);
        assert_eq!(approximate_token_count("abcde"), 2);
    }

    #[test]
    fn test_short_text_is_single_token_chunk() {
        let chunks = chunk_by_tokens("tiny text", 512, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "tiny text");
    }

    #[test]
    fn test_token_chunks_respect_budget() {
        let words: Vec<String> = (0..100).map(|i| format!("word{:02}", i)).collect();
        let text = words.join(" ");
        let chunks = chunk_by_tokens(&text, 20, 4);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // budget plus one carried word of slack
            assert!(approximate_token_count(chunk) <= 23, "chunk too large: {}", chunk);
        }
        assert!(chunks.last().unwrap().contains("word99"));
    }

    #[test]
    fn test_char_chunks_keep_boundaries() {
        let chunks = chunk_by_chars("héllo wörld", 4);
        assert_eq!(chunks.concat(), "héllo wörld");
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("a b c d", 2), "a b");
        assert_eq!(truncate_words("a b", 5), "a b");
    }
}

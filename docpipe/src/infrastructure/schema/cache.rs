// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Schema Cache
//!
//! TTL-and-size-bounded map for hot schema lookups, keyed by schema name.
//! On size overflow the oldest entry (by insertion time) is evicted;
//! expired entries read as misses. Entries are invalidated when a newer
//! version is registered active and on explicit invalidate.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use docpipe_domain::SchemaDefinition;

struct CachedSchema {
    schema: SchemaDefinition,
    inserted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Name-keyed schema cache.
pub struct SchemaCache {
    entries: Mutex<HashMap<String, CachedSchema>>,
    capacity: usize,
    ttl: ChronoDuration,
}

impl SchemaCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl: ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::seconds(3600)),
        }
    }

    pub fn get(&self, name: &str) -> Option<SchemaDefinition> {
        let mut entries = self.entries.lock();
        match entries.get(name) {
            Some(cached) if cached.expires_at > Utc::now() => Some(cached.schema.clone()),
            Some(_) => {
                entries.remove(name);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, schema: &SchemaDefinition) {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        if !entries.contains_key(&schema.name) && entries.len() >= self.capacity {
            entries.retain(|_, cached| cached.expires_at > now);
            while entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, cached)| cached.inserted_at)
                    .map(|(name, _)| name.clone());
                match oldest {
                    Some(oldest) => {
                        entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        entries.insert(
            schema.name.clone(),
            CachedSchema {
                schema: schema.clone(),
                inserted_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn delete(&self, name: &str) {
        self.entries.lock().remove(name);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .lock()
            .values()
            .filter(|cached| cached.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpipe_domain::{SchemaKind, SchemaVersion};

    fn schema(name: &str) -> SchemaDefinition {
        SchemaDefinition::new(name, SchemaVersion::new(1, 0, 0), SchemaKind::Document)
    }

    #[test]
    fn test_get_after_set() {
        let cache = SchemaCache::new(4, Duration::from_secs(60));
        cache.set(&schema("document"));
        assert_eq!(cache.get("document").unwrap().name, "document");
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_oldest_evicted_at_capacity() {
        let cache = SchemaCache::new(2, Duration::from_secs(60));
        cache.set(&schema("first"));
        cache.set(&schema("second"));
        cache.set(&schema("third"));
        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
        assert!(cache.get("third").is_some());
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let cache = SchemaCache::new(4, Duration::from_millis(0));
        cache.set(&schema("document"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("document").is_none());
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = SchemaCache::new(4, Duration::from_secs(60));
        cache.set(&schema("a"));
        cache.set(&schema("b"));
        cache.delete("a");
        assert!(cache.get("a").is_none());
        cache.clear();
        assert!(cache.is_empty());
    }
}

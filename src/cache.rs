//! Response cache: append-only memoization of handler responses
//!
//! Entries are never updated or evicted. Lookup is a substring match in one
//! direction only: an entry matches when its *stored* query contains the
//! lookup string. Storing `"install curl"` and looking up `"curl"` is a hit;
//! looking up `"please install curl now"` against the same entry is a miss.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::Result;

/// A memoized query and the response produced for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    pub id: i64,
    pub query: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

/// Durable storage behind the response cache
///
/// Both operations must be write-then-acknowledge: `append` returns only
/// after the entry is durable.
pub trait MemoryStore: Send + Sync {
    /// Append an entry
    ///
    /// # Errors
    ///
    /// Returns error if the entry could not be persisted
    fn append(&self, query: &str, response: &str) -> Result<MemoryEntry>;

    /// Return the earliest-inserted entry whose query contains `substring`
    /// (case-sensitive)
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read
    fn find_first_containing(&self, substring: &str) -> Result<Option<MemoryEntry>>;

    /// Total number of stored entries
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read
    fn count(&self) -> Result<usize>;

    /// Most recent entries, newest first
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read
    fn recent(&self, limit: usize) -> Result<Vec<MemoryEntry>>;
}

/// Memoizes responses keyed by the query that produced them
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn MemoryStore>,
}

impl ResponseCache {
    /// Create a cache over a durable store
    #[must_use]
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Look up a prior response
    ///
    /// Returns the response of the first stored entry (by insertion order)
    /// whose query contains `query`. Note the direction: the stored text must
    /// contain the lookup text, not the reverse.
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read
    pub fn lookup(&self, query: &str) -> Result<Option<String>> {
        let hit = self.store.find_first_containing(query)?;
        if let Some(entry) = &hit {
            tracing::debug!(query, entry_id = entry.id, "cache hit");
        }
        Ok(hit.map(|entry| entry.response))
    }

    /// Persist a response for `query`
    ///
    /// # Errors
    ///
    /// Returns error if the write fails. Callers must not swallow this: a
    /// dropped write breaks the at-most-once guarantee for the query.
    pub fn store(&self, query: &str, response: &str) -> Result<()> {
        let entry = self.store.append(query, response).map_err(|e| {
            tracing::error!(error = %e, query, "failed to persist cache entry");
            e
        })?;
        tracing::debug!(query, entry_id = entry.id, response_len = response.len(), "cached response");
        Ok(())
    }

    /// Number of memoized entries
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read
    pub fn len(&self) -> Result<usize> {
        self.store.count()
    }

    /// Whether the cache holds no entries
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Most recent entries, newest first
    ///
    /// # Errors
    ///
    /// Returns error if storage cannot be read
    pub fn recent(&self, limit: usize) -> Result<Vec<MemoryEntry>> {
        self.store.recent(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryRepo, init_memory};

    fn cache() -> ResponseCache {
        let pool = init_memory().unwrap();
        ResponseCache::new(Arc::new(MemoryRepo::new(pool)))
    }

    #[test]
    fn test_lookup_matches_stored_query_containing_lookup() {
        let cache = cache();
        cache.store("install curl", "ok").unwrap();

        assert_eq!(cache.lookup("curl").unwrap().as_deref(), Some("ok"));
        assert_eq!(cache.lookup("install curl").unwrap().as_deref(), Some("ok"));
    }

    #[test]
    fn test_lookup_does_not_match_in_reverse_direction() {
        let cache = cache();
        cache.store("install curl", "ok").unwrap();

        assert_eq!(cache.lookup("please install curl now").unwrap(), None);
    }

    #[test]
    fn test_lookup_first_inserted_wins() {
        let cache = cache();
        cache.store("run ls", "first").unwrap();
        cache.store("run ls -la", "second").unwrap();

        assert_eq!(cache.lookup("run ls").unwrap().as_deref(), Some("first"));
        assert_eq!(cache.lookup("-la").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let cache = cache();
        cache.store("Explain recursion", "answer").unwrap();

        assert_eq!(cache.lookup("explain recursion").unwrap(), None);
        assert_eq!(cache.lookup("Explain").unwrap().as_deref(), Some("answer"));
    }

    #[test]
    fn test_empty_response_is_still_a_hit() {
        let cache = cache();
        cache.store("install nothing", "").unwrap();

        assert_eq!(cache.lookup("install nothing").unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_len_grows_monotonically() {
        let cache = cache();
        assert!(cache.is_empty().unwrap());

        cache.store("a", "1").unwrap();
        cache.store("a", "2").unwrap();

        assert_eq!(cache.len().unwrap(), 2);
        assert_eq!(cache.lookup("a").unwrap().as_deref(), Some("1"));
    }
}

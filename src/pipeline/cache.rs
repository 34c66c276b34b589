//! Bounded parse cache.
//!
//! Keyed on `(dialect, sql)` - never raw SQL alone, since the same
//! text can parse differently across dialects. Owned by the pipeline
//! instance; there is no global cache.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::sql::dialect::Dialect;

use super::scanner::PlaceholderToken;
use super::statement::StatementKind;

/// What the pipeline learns from validating one statement's text.
#[derive(Debug, Clone)]
pub(crate) struct ParsedEntry {
    pub kind: StatementKind,
    pub returning: bool,
    pub placeholders: Vec<PlaceholderToken>,
}

/// LRU cache of validated statements.
pub(crate) struct ParseCache {
    inner: Mutex<LruCache<(Dialect, String), ParsedEntry>>,
}

impl ParseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("non-zero capacity");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, dialect: Dialect, sql: &str) -> Option<ParsedEntry> {
        let mut cache = self.inner.lock().expect("parse cache poisoned");
        cache.get(&(dialect, sql.to_string())).cloned()
    }

    pub fn put(&self, dialect: Dialect, sql: &str, entry: ParsedEntry) {
        let mut cache = self.inner.lock().expect("parse cache poisoned");
        cache.put((dialect, sql.to_string()), entry);
    }
}

impl std::fmt::Debug for ParseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_is_keyed_on_dialect() {
        let cache = ParseCache::new(4);
        let entry = ParsedEntry {
            kind: StatementKind::Select,
            returning: false,
            placeholders: vec![],
        };
        cache.put(Dialect::Postgres, "SELECT 1", entry);

        assert!(cache.get(Dialect::Postgres, "SELECT 1").is_some());
        assert!(cache.get(Dialect::MySql, "SELECT 1").is_none());
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let cache = ParseCache::new(2);
        let entry = || ParsedEntry {
            kind: StatementKind::Select,
            returning: false,
            placeholders: vec![],
        };
        cache.put(Dialect::Postgres, "a", entry());
        cache.put(Dialect::Postgres, "b", entry());
        cache.put(Dialect::Postgres, "c", entry());

        assert!(cache.get(Dialect::Postgres, "a").is_none());
        assert!(cache.get(Dialect::Postgres, "c").is_some());
    }
}

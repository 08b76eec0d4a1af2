//! In-memory cache for storing key-value pairs.
//!
//! Uses moka's concurrent cache implementation.

use moka::sync::Cache;

/// Thread-safe in-memory cache with configurable capacity.
///
/// Used for compiled result patterns (`MemCache<String, Regex>`), which are
/// shared by every target worker of a job.
#[derive(Clone)]
pub struct MemCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Allocate a new [`MemCache`].
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Cache::new(capacity as u64),
        }
    }

    pub fn set(
        &self,
        key: K,
        value: V,
    ) {
        self.entries.insert(key, value);
    }

    pub fn get(
        &self,
        key: &K,
    ) -> Option<V> {
        self.entries.get(key)
    }

    /// Returns the cached value for `key`, computing and caching it when absent.
    /// Errors from `init` are returned and nothing is cached.
    pub fn get_or_try_insert<E>(
        &self,
        key: K,
        init: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = init()?;
        self.set(key, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_try_insert_caches_success_only() {
        let cache: MemCache<String, usize> = MemCache::new(8);

        let err: Result<usize, String> = cache.get_or_try_insert("a".to_string(), || Err("boom".to_string()));
        assert!(err.is_err());
        assert!(cache.get(&"a".to_string()).is_none());

        let value: Result<usize, String> = cache.get_or_try_insert("a".to_string(), || Ok(1));
        assert_eq!(value.unwrap(), 1);

        let value: Result<usize, String> = cache.get_or_try_insert("a".to_string(), || Ok(2));
        assert_eq!(value.unwrap(), 1);
    }
}

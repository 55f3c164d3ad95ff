use std::hash::Hash;

use moka::sync::Cache;

/// Bounded concurrent map backed by moka.
///
/// Holds deployed specifications and live cases in the engine, the monitor's
/// case and work-item records, and parsed guard groups. Least recently used
/// entries are evicted past `capacity`.
#[derive(Clone)]
pub struct MemCache<K, V> {
    entries: Cache<K, V>,
}

impl<K, V> MemCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
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

    /// Replaces the entry for `key` with `f(current)` in one step and
    /// returns the new value.
    pub fn upsert(
        &self,
        key: K,
        f: impl FnOnce(Option<V>) -> V,
    ) -> V {
        self.entries.entry(key).and_upsert_with(|current| f(current.map(|e| e.into_value()))).into_value()
    }

    pub fn remove(
        &self,
        key: &K,
    ) {
        self.entries.invalidate(key);
    }

    /// Snapshot of the current values.
    pub fn values(&self) -> Vec<V> {
        self.entries.iter().map(|(_, v)| v).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert() {
        let cache: MemCache<String, usize> = MemCache::new(8);
        assert_eq!(cache.upsert("fired".to_string(), |n| n.unwrap_or_default() + 1), 1);
        assert_eq!(cache.upsert("fired".to_string(), |n| n.unwrap_or_default() + 1), 2);
        assert_eq!(cache.get(&"fired".to_string()), Some(2));

        cache.remove(&"fired".to_string());
        assert_eq!(cache.get(&"fired".to_string()), None);
        assert!(cache.values().is_empty());
    }
}

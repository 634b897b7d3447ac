use crate::domain::ports::{Clock, ExpiringCache};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// 行程內的記憶體快取，多個請求執行緒可同時讀取
pub struct MemoryCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone + Send + Sync> MemoryCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone + Send + Sync> ExpiringCache<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let entry = Entry {
            value,
            expires_at: self.clock.now() + ttl,
        };
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), entry);
        }
    }

    fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::ManualClock;

    #[test]
    fn test_entry_expires_after_ttl() {
        let clock = Arc::new(ManualClock::default());
        let cache: MemoryCache<Vec<i64>> = MemoryCache::new(clock.clone());

        cache.set("cities", vec![44, 137], Duration::from_secs(60));
        assert_eq!(cache.get("cities"), Some(vec![44, 137]));
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::from_secs(59));
        assert!(cache.get("cities").is_some());

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("cities"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache: MemoryCache<String> = MemoryCache::new(Arc::new(ManualClock::default()));
        cache.set("key", "value".to_string(), Duration::from_secs(3600));
        cache.invalidate("key");
        assert_eq!(cache.get("key"), None);
        assert_eq!(cache.get("missing"), None);
    }
}

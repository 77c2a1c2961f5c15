//! Keyed State Store
//!
//! The only shared mutable state in the engine: active video jobs and
//! conversation histories. Injected as a trait object so a deployment can back
//! it with something other than process memory.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Async key/value store
#[async_trait]
pub trait KeyedStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Returns a copy of the stored value
    async fn get(&self, key: &str) -> Option<V>;

    /// Inserts or replaces a value
    async fn put(&self, key: &str, value: V);

    /// Removes a value, returning it if present
    async fn delete(&self, key: &str) -> Option<V>;

    /// Inserts only when the key is vacant. Returns `false` if it was taken.
    async fn put_if_absent(&self, key: &str, value: V) -> bool;
}

/// Process-memory store
#[derive(Debug)]
pub struct InMemoryStore<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> KeyedStore<V> for InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    async fn put(&self, key: &str, value: V) {
        self.entries.write().await.insert(key.to_string(), value);
    }

    async fn delete(&self, key: &str) -> Option<V> {
        self.entries.write().await.remove(key)
    }

    async fn put_if_absent(&self, key: &str, value: V) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        assert!(store.get("a").await.is_none());

        store.put("a", 1).await;
        store.put("a", 2).await;
        assert_eq!(store.get("a").await, Some(2));
        assert_eq!(store.len().await, 1);

        assert_eq!(store.delete("a").await, Some(2));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_if_absent_is_exclusive() {
        let store: Arc<InMemoryStore<String>> = Arc::new(InMemoryStore::new());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.put_if_absent("job", format!("owner-{}", i)).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.len().await, 1);
    }
}

use std::fmt::Debug;
use std::hash::Hash;

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;

use super::OnData;

/// Desired streams and their callbacks.
///
/// Both tables live under one lock so a key is never in the replay set
/// without its callback entry (or vice versa).
pub struct SubscriptionRegistry<K> {
    inner: RwLock<Tables<K>>,
}

struct Tables<K> {
    callbacks: AHashMap<K, OnData>,
    subscribed: AHashSet<K>,
}

impl<K: Clone + Eq + Hash + Debug> SubscriptionRegistry<K> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Tables {
                callbacks: AHashMap::new(),
                subscribed: AHashSet::new(),
            }),
        }
    }

    /// Register `key`. Without a callback, matching frames go to the
    /// catch-all listener but the key is still replayed on reconnect.
    pub fn subscribe(&self, key: K, callback: Option<OnData>) {
        let mut tables = self.inner.write();
        match callback {
            Some(cb) => {
                tables.callbacks.insert(key.clone(), cb);
            }
            None => {
                tables.callbacks.remove(&key);
            }
        }
        tables.subscribed.insert(key);
    }

    /// Returns `true` if the key was subscribed.
    pub fn unsubscribe(&self, key: &K) -> bool {
        let mut tables = self.inner.write();
        tables.callbacks.remove(key);
        tables.subscribed.remove(key)
    }

    /// `None` means the caller must fall back to the catch-all listener.
    pub fn lookup(&self, key: &K) -> Option<OnData> {
        self.inner.read().callbacks.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().subscribed.contains(key)
    }

    /// Snapshot of every active key, used for resubscribe-on-reconnect.
    pub fn subscriptions(&self) -> Vec<K> {
        self.inner.read().subscribed.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().subscribed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Clone + Eq + Hash + Debug> Default for SubscriptionRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribe_then_unsubscribe_clears_both_tables() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        registry.subscribe(
            "tickers.BTCUSDT".to_string(),
            Some(Arc::new(move |_: &serde_json::Value| -> Result<(), crate::FeedError> {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })),
        );

        let cb = registry.lookup(&"tickers.BTCUSDT".to_string()).unwrap();
        cb(&serde_json::Value::Null).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.subscriptions(), vec!["tickers.BTCUSDT".to_string()]);

        assert!(registry.unsubscribe(&"tickers.BTCUSDT".to_string()));
        assert!(registry.lookup(&"tickers.BTCUSDT".to_string()).is_none());
        assert!(registry.is_empty());
        assert!(!registry.unsubscribe(&"tickers.BTCUSDT".to_string()));
    }

    #[test]
    fn key_without_callback_is_still_replayed() {
        let registry: SubscriptionRegistry<String> = SubscriptionRegistry::new();
        registry.subscribe("a".into(), None);
        assert!(registry.lookup(&"a".into()).is_none());
        assert!(registry.contains(&"a".into()));
        assert_eq!(registry.len(), 1);
    }
}

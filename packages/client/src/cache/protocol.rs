//! Bounded LRU of negotiated ALPN protocols
//!
//! Keyed by `host:port:alpn1,alpn2` with the offered protocol list sorted, so
//! the same offer in any order shares one entry.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

#[derive(Debug)]
pub struct ProtocolCache {
    entries: Mutex<LruCache<String, String>>,
}

impl ProtocolCache {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn cache_key<S: AsRef<str>>(host: &str, port: u16, alpn_protocols: &[S]) -> String {
        let mut protocols: Vec<&str> = alpn_protocols.iter().map(AsRef::as_ref).collect();
        protocols.sort_unstable();
        format!("{host}:{port}:{}", protocols.join(","))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Store `protocol` unless an entry already exists, returning the cached value.
    pub fn insert_if_absent(&self, key: String, protocol: String) -> String {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&key) {
            return existing.clone();
        }
        entries.put(key, protocol.clone());
        protocol
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

//! In-memory LRU cache backend built on `clru`, mirroring the
//! double-keying `RespCache` pattern from the teacher's upstream cache.

use super::{CacheBackend, CacheEntry, CacheError, CacheKey};
use async_trait::async_trait;
use clru::CLruCache;
use std::{num::NonZeroUsize, sync::Mutex};

/// LRU-evicting in-memory backend. The default backend for a `Cache`
/// node when no external KV store is configured.
pub struct LruBackend {
    inner: Mutex<CLruCache<CacheKey, CacheEntry>>,
}

impl LruBackend {
    /// Create a backend holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(CLruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl CacheBackend for LruBackend {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.inner.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry, _ttl: std::time::Duration) -> Result<(), CacheError> {
        self.inner.lock().unwrap().put(key, entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.inner.lock().unwrap().pop(key);
        Ok(())
    }

    async fn iterate(&self, keep: &mut dyn FnMut(&CacheEntry) -> bool) -> Result<(), CacheError> {
        let mut guard = self.inner.lock().unwrap();
        let stale: Vec<CacheKey> = guard
            .iter()
            .filter(|(_, v)| !keep(v))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            guard.pop(&key);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Response;

    fn dummy_key(n: u8) -> CacheKey {
        CacheKey {
            name: domain::base::Dname::from_octets(bytes::Bytes::from(vec![n, b'a', 0]))
                .unwrap(),
            qtype: domain::base::iana::Rtype::A,
            qclass: domain::base::iana::Class::In,
            do_bit: false,
            ecs_prefix: None,
        }
    }

    fn dummy_response() -> Response {
        let builder =
            domain::base::MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.question().into_message()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let backend = LruBackend::new(NonZeroUsize::new(4).unwrap());
        let key = dummy_key(1);
        let entry = CacheEntry::new(dummy_response(), std::time::Duration::from_secs(30));
        backend.put(key.clone(), entry, std::time::Duration::from_secs(30)).await.unwrap();
        assert!(backend.get(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn eviction_respects_capacity() {
        let backend = LruBackend::new(NonZeroUsize::new(1).unwrap());
        let k1 = dummy_key(1);
        let k2 = dummy_key(2);
        backend
            .put(k1.clone(), CacheEntry::new(dummy_response(), std::time::Duration::from_secs(1)), std::time::Duration::from_secs(1))
            .await
            .unwrap();
        backend
            .put(k2.clone(), CacheEntry::new(dummy_response(), std::time::Duration::from_secs(1)), std::time::Duration::from_secs(1))
            .await
            .unwrap();
        assert!(backend.get(&k1).await.unwrap().is_none());
        assert!(backend.get(&k2).await.unwrap().is_some());
    }
}

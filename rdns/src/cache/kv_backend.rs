//! Pluggable external key-value cache backend, for deployments that
//! want cache state shared across multiple `routedns` processes.
//! Mirrors the teacher's `ConnInitiator`/`deadpool` pooling pattern
//! used for upstream transport connections.

use super::{CacheBackend, CacheEntry, CacheError, CacheKey};
use async_trait::async_trait;
use deadpool::managed::{Manager, Pool, RecycleResult};
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the external store.
#[derive(Error, Debug)]
pub enum KvBackendError {
    /// The connection pool could not produce a connection.
    #[error("kv store pool exhausted or unreachable: {0}")]
    Pool(String),
    /// A get/put/delete round trip failed.
    #[error("kv store operation failed: {0}")]
    Operation(String),
    /// Stored bytes could not be parsed back into a cache entry.
    #[error("corrupt cache entry in kv store")]
    Corrupt,
}

/// Raw byte-oriented operations an external store connection exposes.
/// Implemented by a thin client for whatever store is actually
/// deployed (Redis, memcached, ...); `routedns` only depends on this
/// narrow contract.
#[async_trait]
pub trait KvConnection: Send {
    /// Fetch raw bytes for `key`, if present.
    async fn raw_get(&mut self, key: &[u8]) -> std::result::Result<Option<Vec<u8>>, String>;
    /// Store raw bytes for `key` with an expiry.
    async fn raw_put(&mut self, key: &[u8], value: &[u8], ttl: Duration) -> std::result::Result<(), String>;
    /// Remove `key`.
    async fn raw_delete(&mut self, key: &[u8]) -> std::result::Result<(), String>;
    /// List every key currently stored under this backend's namespace.
    async fn raw_keys(&mut self) -> std::result::Result<Vec<Vec<u8>>, String>;
}

/// Connects to the external store on demand; pooled via `deadpool`.
#[async_trait]
pub trait KvConnector: Send + Sync {
    /// Connection type produced by this connector.
    type Connection: KvConnection;
    /// Open a new connection.
    async fn connect(&self) -> std::result::Result<Self::Connection, String>;
}

struct PoolManager<C: KvConnector>(C);

#[async_trait]
impl<C: KvConnector + 'static> Manager for PoolManager<C> {
    type Type = C::Connection;
    type Error = KvBackendError;

    async fn create(&self) -> std::result::Result<Self::Type, Self::Error> {
        self.0.connect().await.map_err(KvBackendError::Pool)
    }

    async fn recycle(&self, _conn: &mut Self::Type) -> RecycleResult<Self::Error> {
        Ok(())
    }
}

/// External-store-backed cache. Encodes entries as `qname|qtype|qclass`
/// keys and a flat `[ttl_secs: u64][age_ms: u64][wire bytes]` value so
/// the original message's TTLs can still be decremented on read.
pub struct KvBackend<C: KvConnector + 'static> {
    pool: Pool<PoolManager<C>>,
    namespace: String,
}

impl<C: KvConnector + 'static> KvBackend<C> {
    /// Build a backend from a connector and pool size.
    pub fn new(connector: C, namespace: impl Into<String>, pool_size: usize) -> std::result::Result<Self, KvBackendError> {
        let pool = Pool::builder(PoolManager(connector))
            .max_size(pool_size)
            .build()
            .map_err(|e| KvBackendError::Pool(e.to_string()))?;
        Ok(Self {
            pool,
            namespace: namespace.into(),
        })
    }

    fn encode_key(&self, key: &CacheKey) -> Vec<u8> {
        format!("{}:{:?}", self.namespace, key).into_bytes()
    }

    fn encode_entry(entry: &CacheEntry, ttl: Duration) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + entry.response.as_slice().len());
        buf.extend_from_slice(&ttl.as_secs().to_be_bytes());
        buf.extend_from_slice(&(entry.age().as_millis() as u64).to_be_bytes());
        buf.extend_from_slice(entry.response.as_slice());
        buf
    }

    fn decode_entry(bytes: &[u8]) -> std::result::Result<CacheEntry, KvBackendError> {
        if bytes.len() < 16 {
            return Err(KvBackendError::Corrupt);
        }
        let ttl_secs = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
        let msg = domain::base::Message::from_octets(bytes::Bytes::copy_from_slice(&bytes[16..]))
            .map_err(|_| KvBackendError::Corrupt)?;
        Ok(CacheEntry::new(msg, Duration::from_secs(ttl_secs)))
    }
}

#[async_trait]
impl<C: KvConnector + 'static> CacheBackend for KvBackend<C> {
    async fn get(&self, key: &CacheKey) -> std::result::Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.pool.get().await.map_err(|e| KvBackendError::Pool(e.to_string()))?;
        let raw = conn
            .raw_get(&self.encode_key(key))
            .await
            .map_err(KvBackendError::Operation)?;
        match raw {
            Some(bytes) => Ok(Some(Self::decode_entry(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry, ttl: Duration) -> std::result::Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(|e| KvBackendError::Pool(e.to_string()))?;
        let value = Self::encode_entry(&entry, ttl);
        conn.raw_put(&self.encode_key(&key), &value, ttl)
            .await
            .map_err(KvBackendError::Operation)?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> std::result::Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(|e| KvBackendError::Pool(e.to_string()))?;
        conn.raw_delete(&self.encode_key(key))
            .await
            .map_err(KvBackendError::Operation)?;
        Ok(())
    }

    async fn iterate(&self, keep: &mut dyn FnMut(&CacheEntry) -> bool) -> std::result::Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(|e| KvBackendError::Pool(e.to_string()))?;
        for raw_key in conn.raw_keys().await.map_err(KvBackendError::Operation)? {
            if let Some(bytes) = conn.raw_get(&raw_key).await.map_err(KvBackendError::Operation)? {
                if let Ok(entry) = Self::decode_entry(&bytes) {
                    if !keep(&entry) {
                        let _ = conn.raw_delete(&raw_key).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> std::result::Result<(), CacheError> {
        self.pool.close();
        Ok(())
    }
}

//! TTL-aware response cache: negative caching, NXDOMAIN hardening,
//! prefetch, shuffle, pluggable backends, and single-flight
//! deduplication of in-flight misses.

mod dedup;
mod kv_backend;
mod lru_backend;

pub use dedup::RequestDedup;
pub use kv_backend::{KvBackend, KvBackendError};
pub use lru_backend::LruBackend;

use crate::{
    resolver::{Query, Response},
    AsyncTryInto, ClientInfo, Label, Resolver, Result, Validatable,
};
use async_trait::async_trait;
use domain::base::{
    iana::Rcode,
    name::{Dname, ToDname},
    Message,
};
use log::{debug, info};
use rand::seq::SliceRandom;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};
use thiserror::Error;

/// Errors the cache or one of its backends may raise.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backend's `get`/`put`/`delete` failed after exhausting retries.
    #[error("cache backend unreachable after retries: {0}")]
    BackendUnreachable(#[from] KvBackendError),

    /// Cache persistence to disk failed (load or save).
    #[error("cache persistence I/O error: {0}")]
    Persistence(#[from] std::io::Error),

    /// The downstream resolver this cache wraps was never configured.
    #[error("cache `{0}` has no downstream resolver")]
    NoDownstream(Label),
}

/// How cache hits are shuffled before being returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShuffleMode {
    /// Answers are returned in stored order.
    None,
    /// Answers are uniformly permuted on every hit.
    Random,
    /// Answers rotate by one position per hit, tracked per cache key.
    RoundRobin,
}

impl Default for ShuffleMode {
    fn default() -> Self {
        Self::None
    }
}

/// Per-RCODE TTL ceiling, e.g. cap SERVFAIL caching to 5 seconds.
pub type RcodeMaxTtl = HashMap<u8, u32>;

/// The `(key, response, stored_at, expires_at, hits, prefetch_eligible_at)`
/// cache entry from `spec.md` §3, plus the book-keeping the round-robin
/// shuffle mode needs.
#[derive(Clone)]
pub struct CacheEntry {
    response: Response,
    stored_at: Instant,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    rotation: Arc<AtomicU64>,
}

impl CacheEntry {
    /// Wrap a response with the TTL it should be stored for. Public so
    /// other subsystems (e.g. [`crate::dnssec`]'s keystore) can reuse
    /// this cache engine's entry/backend pair for their own
    /// TTL-bounded, response-shaped state.
    pub fn new(response: Response, ttl: Duration) -> Self {
        Self {
            response,
            stored_at: Instant::now(),
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            rotation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The stored response.
    pub fn response(&self) -> &Response {
        &self.response
    }

    fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.stored_at)
    }

    /// Whether this entry's TTL has elapsed since it was stored.
    pub fn expired(&self) -> bool {
        self.age() >= self.ttl
    }

    fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.age())
    }
}

/// Cache key: canonical-lowercased name, qtype, qclass, DO-bit, and an
/// optional EDNS0 client-subnet prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: Dname<bytes::Bytes>,
    qtype: domain::base::iana::Rtype,
    qclass: domain::base::iana::Class,
    do_bit: bool,
    ecs_prefix: Option<(std::net::IpAddr, u8)>,
}

impl CacheKey {
    /// Derive a cache key from a query message. Returns `None` if the
    /// message carries no question (the resolver contract guarantees
    /// exactly one, but cache construction happens before that
    /// precondition is re-checked here).
    pub fn from_query(query: &Query) -> Option<Self> {
        let question = query.first_question()?;
        let do_bit = query
            .opt()
            .map(|opt| opt.dnssec_ok())
            .unwrap_or(false);
        let ecs_prefix = query.opt().and_then(|opt| {
            opt.as_opt()
                .iter::<domain::base::opt::AllOptData<bytes::Bytes, _>>()
                .filter_map(|o| o.ok())
                .find_map(|o| match o {
                    domain::base::opt::AllOptData::ClientSubnet(cs) => {
                        Some((cs.addr(), cs.source_prefix_len()))
                    }
                    _ => None,
                })
        });
        Some(Self {
            name: question.qname().to_bytes().to_canonical(),
            qtype: question.qtype(),
            qclass: question.qclass(),
            do_bit,
            ecs_prefix,
        })
    }

    /// Build a key for a bare `(name, type, class)` lookup with no
    /// DO-bit/ECS dimension, the shape `crate::dnssec`'s DNSKEY/DS
    /// keystore needs.
    pub fn for_zone(name: Dname<bytes::Bytes>, qtype: domain::base::iana::Rtype, qclass: domain::base::iana::Class) -> Self {
        Self {
            name: name.to_canonical(),
            qtype,
            qclass,
            do_bit: false,
            ecs_prefix: None,
        }
    }
}

trait ToCanonical {
    fn to_canonical(self) -> Self;
}

impl ToCanonical for Dname<bytes::Bytes> {
    fn to_canonical(self) -> Self {
        // `domain`'s name comparisons are already case-insensitive and
        // canonical-ordering aware; lower-casing here keeps the key's
        // `Hash`/`Eq` impl (which is byte-wise) consistent regardless
        // of the case the query arrived in.
        Dname::from_octets(bytes::Bytes::from(
            self.as_slice().to_ascii_lowercase(),
        ))
        .unwrap_or(self)
    }
}

/// Cache configuration (`spec.md` §4.4).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Negative-answer TTL floor, used for NOERROR-empty-answer and NXDOMAIN.
    pub negative_ttl: u32,
    /// Per-RCODE TTL ceilings.
    pub rcode_max_ttl: RcodeMaxTtl,
    /// Hit count at/above which prefetch becomes eligible.
    pub prefetch_trigger: u64,
    /// Minimum original TTL (seconds) for an entry to ever be prefetched.
    pub prefetch_eligible: u64,
    /// Harden below NXDOMAIN: synthesize NXDOMAIN for subdomains of a
    /// cached NXDOMAIN name without going downstream.
    pub harden_below_nxdomain: bool,
    /// Answer-section shuffle mode on hit.
    pub shuffle: ShuffleMode,
    /// Reserved query name that flushes the entire cache when observed.
    pub flush_query: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            negative_ttl: 60,
            rcode_max_ttl: HashMap::new(),
            prefetch_trigger: u64::MAX, // disabled unless configured
            prefetch_eligible: 0,
            harden_below_nxdomain: false,
            shuffle: ShuffleMode::None,
            flush_query: None,
        }
    }
}

/// Backend abstraction the cache engine talks to. A backend need not
/// know about TTL decrementing or prefetch bookkeeping; it only stores
/// and retrieves opaque entries.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch an entry, if present (expired or not — the cache engine
    /// decides what "expired" means using its own clock).
    async fn get(&self, key: &CacheKey) -> std::result::Result<Option<CacheEntry>, CacheError>;
    /// Store an entry with the given TTL.
    async fn put(&self, key: CacheKey, entry: CacheEntry, ttl: Duration) -> std::result::Result<(), CacheError>;
    /// Remove an entry.
    async fn delete(&self, key: &CacheKey) -> std::result::Result<(), CacheError>;
    /// Visit every stored entry, removing those for which `keep`
    /// returns `false`. Used for GC sweeps and the flush query.
    async fn iterate(&self, keep: &mut dyn FnMut(&CacheEntry) -> bool) -> std::result::Result<(), CacheError>;
    /// Release any held resources (flush-to-disk, close connections).
    async fn close(&self) -> std::result::Result<(), CacheError>;
}

struct Inner {
    backend: Arc<dyn CacheBackend>,
    downstream: Arc<dyn Resolver>,
    config: CacheConfig,
    // NXDOMAIN hardening index: canonical names with a live NXDOMAIN,
    // independent of the backend (cheap membership test).
    nxdomain_names: Mutex<HashMap<Dname<bytes::Bytes>, Instant>>,
}

/// The TTL-aware memoizing `Resolver` wrapping a downstream resolver
/// and a pluggable backend. Cloning a `Cache` is cheap (shares its
/// inner state), which is what lets a prefetch refresh run as a
/// detached task without borrowing `self`.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
}

impl Cache {
    /// Construct a cache from a backend, downstream resolver, and config.
    pub fn new(backend: Arc<dyn CacheBackend>, downstream: Arc<dyn Resolver>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                downstream,
                config,
                nxdomain_names: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn min_answer_ttl(msg: &Response) -> Option<u32> {
        msg.answer()
            .ok()?
            .filter_map(|r| r.ok())
            .map(|r| r.ttl())
            .min()
    }

    fn effective_ttl(&self, msg: &Response) -> u32 {
        let rcode = msg.header().rcode();
        let base = match Self::min_answer_ttl(msg) {
            Some(ttl) if rcode == Rcode::NoError => ttl,
            _ => self.inner.config.negative_ttl,
        };
        match self.inner.config.rcode_max_ttl.get(&(u8::from(rcode))) {
            Some(&max) => base.min(max),
            None => base,
        }
    }

    fn is_negative(msg: &Response) -> bool {
        msg.header().rcode() == Rcode::NXDomain
            || (msg.header().rcode() == Rcode::NoError
                && msg.answer().map(|a| a.count() == 0).unwrap_or(true))
    }

    fn decrement_ttls(msg: &Response, elapsed: u32) -> Response {
        // Rebuild the message with every RR's TTL reduced by `elapsed`,
        // floored at zero, the way a resolver hands back an aged cache
        // hit without lying about freshness.
        let mut builder = match domain::base::MessageBuilder::from_target(
            bytes::BytesMut::with_capacity(msg.as_slice().len() + 16),
        ) {
            Ok(b) => b,
            Err(_) => return msg.clone(),
        };
        *builder.header_mut() = msg.header();
        let mut builder = builder.question();
        for q in msg.question().flatten() {
            let _ = builder.push(q);
        }
        let mut builder = builder.answer();
        for rr in msg.answer().into_iter().flatten().flatten() {
            let mut rr = rr;
            rr.set_ttl(rr.ttl().saturating_sub(elapsed));
            let _ = builder.push(rr);
        }
        builder.into_message()
    }

    fn shuffle_answers(&self, msg: Response, entry: &CacheEntry) -> Response {
        if self.inner.config.shuffle == ShuffleMode::None {
            return msg;
        }
        let mut answers: Vec<_> = msg.answer().into_iter().flatten().flatten().collect();
        match self.inner.config.shuffle {
            ShuffleMode::None => unreachable!(),
            ShuffleMode::Random => {
                if answers.len() > 1 {
                    answers.shuffle(&mut rand::thread_rng());
                }
            }
            ShuffleMode::RoundRobin => {
                let rotation = entry.rotation.fetch_add(1, Ordering::Relaxed) as usize;
                if !answers.is_empty() {
                    answers.rotate_left(rotation % answers.len());
                }
            }
        }
        Self::rebuild_with_answers(&msg, answers)
    }

    fn rebuild_with_answers(
        msg: &Response,
        answers: Vec<domain::base::ParsedRecord<bytes::Bytes>>,
    ) -> Response {
        let mut builder = match domain::base::MessageBuilder::from_target(
            bytes::BytesMut::with_capacity(msg.as_slice().len() + 16),
        ) {
            Ok(b) => b,
            Err(_) => return msg.clone(),
        };
        *builder.header_mut() = msg.header();
        let mut builder = builder.question();
        for q in msg.question().flatten() {
            let _ = builder.push(q);
        }
        let mut builder = builder.answer();
        for rr in answers {
            let _ = builder.push(rr);
        }
        builder.into_message()
    }

    fn is_flush_query(&self, query: &Query) -> bool {
        match (&self.inner.config.flush_query, query.first_question()) {
            (Some(name), Some(q)) => q.qname().to_string().eq_ignore_ascii_case(name),
            _ => false,
        }
    }

    async fn maybe_harden_nxdomain(&self, key: &CacheKey) -> bool {
        if !self.inner.config.harden_below_nxdomain {
            return false;
        }
        let names = self.inner.nxdomain_names.lock().unwrap();
        let mut ancestor = key.name.clone();
        loop {
            if let Some(stored) = names.get(&ancestor) {
                if stored.elapsed() < Duration::from_secs(u64::from(self.inner.config.negative_ttl)) {
                    return true;
                }
            }
            match ancestor.parent() {
                Some(p) if !p.is_root() => ancestor = p,
                _ => return false,
            }
        }
    }

    fn record_nxdomain(&self, key: &CacheKey) {
        if self.inner.config.harden_below_nxdomain {
            self.inner
                .nxdomain_names
                .lock()
                .unwrap()
                .insert(key.name.clone(), Instant::now());
        }
    }

    /// Bump the entry's hit counter and, once it crosses
    /// `prefetch_trigger` on an entry whose original TTL clears
    /// `prefetch_eligible`, spawn a detached refresh that repopulates
    /// the backend before the entry actually expires.
    fn maybe_prefetch(&self, key: CacheKey, entry: &CacheEntry, query: Query, client: ClientInfo) {
        let hits = entry.hits.fetch_add(1, Ordering::Relaxed) + 1;
        let original_ttl = entry.ttl.as_secs();
        if hits < self.inner.config.prefetch_trigger || original_ttl < self.inner.config.prefetch_eligible {
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move {
            debug!("prefetching cache key after {} hits", hits);
            if let Ok(resp) = inner.downstream.resolve(query, &client).await {
                if resp.header().rcode() != Rcode::ServFail {
                    let rcode = resp.header().rcode();
                    let base = match Self::min_answer_ttl(&resp) {
                        Some(t) if rcode == Rcode::NoError => t,
                        _ => inner.config.negative_ttl,
                    };
                    let ttl = Duration::from_secs(u64::from(
                        inner
                            .config
                            .rcode_max_ttl
                            .get(&u8::from(rcode))
                            .map(|&m| base.min(m))
                            .unwrap_or(base),
                    ));
                    let entry = CacheEntry::new(resp, ttl);
                    let _ = inner.backend.put(key, entry, ttl).await;
                }
            }
        });
    }
}

#[async_trait]
impl Resolver for Cache {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<Response> {
        if self.is_flush_query(&query) {
            self.inner.backend.iterate(&mut |_| false).await.map_err(CacheError::from)?;
            self.inner.nxdomain_names.lock().unwrap().clear();
            info!("cache flushed by reserved query");
            return crate::resolver::start_answer(&query, Rcode::NoError).map_err(Into::into);
        }

        let key = match CacheKey::from_query(&query) {
            Some(k) => k,
            None => return self.inner.downstream.resolve(query, client).await,
        };

        if self.maybe_harden_nxdomain(&key).await {
            debug!("served synthetic NXDOMAIN via harden-below-nxdomain");
            return crate::resolver::start_answer(&query, Rcode::NXDomain).map_err(Into::into);
        }

        if let Some(entry) = self.inner.backend.get(&key).await.map_err(CacheError::from)? {
            if !entry.expired() {
                let elapsed = entry.age().as_secs() as u32;
                let response = Self::decrement_ttls(&entry.response, elapsed);
                let response = self.shuffle_answers(response, &entry);
                debug!("cache hit, {}s remaining", entry.remaining().as_secs());
                // Prefetch runs detached and never delays this return.
                self.maybe_prefetch(key, &entry, query, client.clone());
                return Ok(response);
            }
        }

        // Miss (or expired): single-flight is provided by wrapping this
        // cache in a `RequestDedup` node per `spec.md` §4.4; the cache
        // itself only guarantees it never stores an error response.
        let response = self.inner.downstream.resolve(query.clone(), client).await?;
        if response.header().rcode() != Rcode::ServFail {
            let ttl = Duration::from_secs(u64::from(self.effective_ttl(&response)));
            if Self::is_negative(&response) && response.header().rcode() == Rcode::NXDomain {
                self.record_nxdomain(&key);
            }
            let entry = CacheEntry::new(response.clone(), ttl);
            self.inner
                .backend
                .put(key, entry, ttl)
                .await
                .map_err(CacheError::from)?;
        }
        Ok(response)
    }
}

impl Validatable for Cache {
    type Error = CacheError;
    fn validate(&self, _used: Option<&std::collections::HashSet<Label>>) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::base::{iana::{Class, Rtype}, Dname, MessageBuilder};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct CountingUpstream {
        hits: AtomicUsize,
        rcode: Rcode,
        ttl: u32,
    }

    #[async_trait]
    impl Resolver for CountingUpstream {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            self.hits.fetch_add(1, AtomicOrdering::Relaxed);
            let mut builder = MessageBuilder::from_target(bytes::BytesMut::new())?;
            let answer = builder.start_answer(&query, self.rcode)?;
            let mut builder = answer.answer();
            if self.rcode == Rcode::NoError {
                if let Some(q) = query.first_question() {
                    builder.push((
                        q.qname().to_bytes(),
                        Class::In,
                        self.ttl,
                        domain::base::rdata::rfc1035::A::from_octets([127, 0, 0, 1]),
                    ))?;
                }
            }
            Ok(builder.into_message())
        }
    }

    fn a_query() -> Query {
        let mut builder = MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.header_mut().set_rd(true);
        let mut builder = builder.question();
        builder
            .push((
                Dname::<bytes::Bytes>::from_chars("cached.example.".chars()).unwrap(),
                Rtype::A,
                Class::In,
            ))
            .unwrap();
        builder.into_message()
    }

    #[tokio::test]
    async fn hit_is_served_without_touching_downstream() {
        let upstream = Arc::new(CountingUpstream {
            hits: AtomicUsize::new(0),
            rcode: Rcode::NoError,
            ttl: 300,
        });
        let cache = Cache::new(
            Arc::new(LruBackend::new(std::num::NonZeroUsize::new(16).unwrap())),
            upstream.clone(),
            CacheConfig::default(),
        );
        let client = ClientInfo::new(None, Label::from("t"));

        cache.resolve(a_query(), &client).await.unwrap();
        cache.resolve(a_query(), &client).await.unwrap();
        cache.resolve(a_query(), &client).await.unwrap();

        assert_eq!(upstream.hits.load(AtomicOrdering::Relaxed), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let upstream = Arc::new(CountingUpstream {
            hits: AtomicUsize::new(0),
            rcode: Rcode::NoError,
            ttl: 1,
        });
        let cache = Cache::new(
            Arc::new(LruBackend::new(std::num::NonZeroUsize::new(16).unwrap())),
            upstream.clone(),
            CacheConfig::default(),
        );
        let client = ClientInfo::new(None, Label::from("t"));

        cache.resolve(a_query(), &client).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        cache.resolve(a_query(), &client).await.unwrap();

        assert_eq!(upstream.hits.load(AtomicOrdering::Relaxed), 2);
    }

    #[tokio::test]
    async fn servfail_is_never_stored() {
        let upstream = Arc::new(CountingUpstream {
            hits: AtomicUsize::new(0),
            rcode: Rcode::ServFail,
            ttl: 300,
        });
        let cache = Cache::new(
            Arc::new(LruBackend::new(std::num::NonZeroUsize::new(16).unwrap())),
            upstream.clone(),
            CacheConfig::default(),
        );
        let client = ClientInfo::new(None, Label::from("t"));

        cache.resolve(a_query(), &client).await.unwrap();
        cache.resolve(a_query(), &client).await.unwrap();

        assert_eq!(upstream.hits.load(AtomicOrdering::Relaxed), 2);
    }

    #[tokio::test]
    async fn prefetch_triggers_detached_refresh_before_expiry() {
        let upstream = Arc::new(CountingUpstream {
            hits: AtomicUsize::new(0),
            rcode: Rcode::NoError,
            ttl: 60,
        });
        let mut config = CacheConfig::default();
        config.prefetch_trigger = 2;
        config.prefetch_eligible = 30;
        let cache = Cache::new(
            Arc::new(LruBackend::new(std::num::NonZeroUsize::new(16).unwrap())),
            upstream.clone(),
            config,
        );
        let client = ClientInfo::new(None, Label::from("t"));

        cache.resolve(a_query(), &client).await.unwrap(); // miss, hits=0 after
        cache.resolve(a_query(), &client).await.unwrap(); // hit, hits=1, below trigger
        cache.resolve(a_query(), &client).await.unwrap(); // hit, hits=2, crosses trigger
        // The prefetch refresh runs detached; give it a moment to run.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(upstream.hits.load(AtomicOrdering::Relaxed), 2);
    }

    struct ThreeAddresses;

    #[async_trait]
    impl Resolver for ThreeAddresses {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            let mut builder = MessageBuilder::from_target(bytes::BytesMut::new())?;
            let answer = builder.start_answer(&query, Rcode::NoError)?;
            let mut builder = answer.answer();
            if let Some(q) = query.first_question() {
                for octet in [1u8, 2, 3] {
                    builder.push((
                        q.qname().to_bytes(),
                        Class::In,
                        300,
                        domain::base::rdata::rfc1035::A::from_octets([10, 0, 0, octet]),
                    ))?;
                }
            }
            Ok(builder.into_message())
        }
    }

    fn answer_addrs(resp: &Response) -> Vec<std::net::Ipv4Addr> {
        resp.answer()
            .unwrap()
            .flatten()
            .filter_map(|rr| {
                rr.into_any_record::<domain::rdata::AllRecordData<_, _>>()
                    .ok()
                    .flatten()
            })
            .filter_map(|rr| match rr.data() {
                domain::rdata::AllRecordData::A(a) => Some(a.addr()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn round_robin_shuffle_rotates_answers_on_each_hit() {
        let mut config = CacheConfig::default();
        config.shuffle = ShuffleMode::RoundRobin;
        let cache = Cache::new(
            Arc::new(LruBackend::new(std::num::NonZeroUsize::new(16).unwrap())),
            Arc::new(ThreeAddresses),
            config,
        );
        let client = ClientInfo::new(None, Label::from("t"));

        cache.resolve(a_query(), &client).await.unwrap(); // miss, populates entry
        let first = cache.resolve(a_query(), &client).await.unwrap();
        let second = cache.resolve(a_query(), &client).await.unwrap();
        let third = cache.resolve(a_query(), &client).await.unwrap();
        let fourth = cache.resolve(a_query(), &client).await.unwrap();

        let first = answer_addrs(&first);
        let second = answer_addrs(&second);
        let third = answer_addrs(&third);
        let fourth = answer_addrs(&fourth);
        assert_ne!(first, second);
        assert_ne!(second, third);
        // A 3-element rotation returns to its starting order every 3 hits.
        assert_eq!(first, fourth);
    }
}

/// Builder for [`Cache`], implementing the `AsyncTryInto` seam so
/// construction (e.g. opening a persistence file) can be async.
pub struct CacheBuilder {
    /// Backend to use; defaults to an in-memory LRU if unset.
    pub backend: Option<Arc<dyn CacheBackend>>,
    /// Capacity for the default in-memory LRU backend.
    pub capacity: std::num::NonZeroUsize,
    /// Tunables from `spec.md` §4.4.
    pub config: CacheConfig,
}

#[async_trait]
impl AsyncTryInto<(Arc<dyn CacheBackend>, CacheConfig)> for CacheBuilder {
    type Error = CacheError;
    async fn async_try_into(self) -> std::result::Result<(Arc<dyn CacheBackend>, CacheConfig), Self::Error> {
        let backend = match self.backend {
            Some(b) => b,
            None => Arc::new(LruBackend::new(self.capacity)),
        };
        Ok((backend, self.config))
    }
}

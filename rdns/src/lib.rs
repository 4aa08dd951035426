#![deny(unsafe_code)]
//! Core library for `routedns`: the resolver graph, routing/matching
//! engine, caching layer, and failover/selection groups described by
//! the project specification. Transport-specific wire encoding, TLS/
//! QUIC session establishment, and configuration file parsing are
//! treated as collaborators with a narrow contract (see `clients` and
//! `config`), not reimplemented here.

pub mod blocklist;
pub mod cache;
pub mod clients;
pub mod config;
#[cfg(feature = "dnssec")]
pub mod dnssec;
pub mod error;
pub mod graph;
pub mod groups;
pub mod listeners;
pub mod modifiers;
pub mod resolver;
pub mod router;
pub mod static_responder;

pub use error::{RdnsError, Result};
pub use resolver::{ClientInfo, Query, Resolver, Response};

use async_trait::async_trait;
use std::sync::Arc;

/// Node and tag identity type used throughout the graph: resolver IDs,
/// upstream tags, rule names. Cheap to clone across concurrently
/// running tasks.
pub type Label = Arc<str>;

// Max TTL per RFC 2181 would be 2^31-1; clamp ours to something useful
// for blackhole/static responses that must still be decremented by the
// cache without underflowing.
pub(crate) const MAX_TTL: u32 = 86400;

/// Object that can be validated once its full context (e.g. the set of
/// node IDs referenced elsewhere in the graph) is known.
pub trait Validatable {
    /// Validation failure type.
    type Error;
    /// Validate `self`. `used`, when given, is the set of labels other
    /// parts of the graph expect to exist.
    fn validate(&self, used: Option<&std::collections::HashSet<Label>>)
        -> std::result::Result<(), Self::Error>;
}

/// Async counterpart of `TryInto`, used by every `*Builder` type to
/// perform I/O-bound setup (compiling regexes, opening blocklist
/// files, building GeoIP readers) before producing an immutable
/// runtime value.
#[async_trait]
pub trait AsyncTryInto<T> {
    /// Build failure type.
    type Error;
    /// Consume `self` and produce `T`.
    async fn async_try_into(self) -> std::result::Result<T, Self::Error>;
}

//! Top-level error aggregation. Each subsystem defines its own error
//! enum (see `graph::GraphError`, `cache::CacheError`,
//! `blocklist::BlocklistError`, `clients::ClientError`, ...); this
//! module only wires them into the single error type the `Resolver`
//! contract returns.

use crate::{
    blocklist::BlocklistError, cache::CacheError, clients::ClientError, graph::GraphError,
    modifiers::ModifierError, router::RouterError,
};
use thiserror::Error;

/// Shorthand for `Result<T, RdnsError>`.
pub type Result<T> = std::result::Result<T, RdnsError>;

/// All possible errors returned by the `Resolver` contract or raised
/// while building the graph.
#[derive(Error, Debug)]
pub enum RdnsError {
    /// A transport client failed (connect, I/O, timeout, TLS handshake).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The cache or one of its backends failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Router found no matching route and no default.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Blocklist rule engine or loader failed.
    #[error(transparent)]
    Blocklist(#[from] BlocklistError),

    /// A modifier (rate-limiter, replace, ecs, ...) failed.
    #[error(transparent)]
    Modifier(#[from] ModifierError),

    /// Graph construction failed (cycle, missing reference, duplicate ID).
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Every child of a selection group failed.
    #[error("all {0} children of group `{1}` failed; last error: {2}")]
    AllChildrenFailed(usize, crate::Label, Box<RdnsError>),

    /// A selection group's `ServfailError` policy treats a child's
    /// SERVFAIL answer as a failure, triggering failover to the next child.
    #[error("child `{0}` answered SERVFAIL")]
    ServfailFailover(crate::Label),

    /// Malformed DNS message received from a transport or listener.
    #[error("malformed DNS message: {0}")]
    MalformedMessage(String),

    /// A query was rejected by policy (blocklist, rate limit) with no
    /// configured fallback resolver.
    #[error("query rejected by policy: {0}")]
    PolicyRejected(String),

    /// Wraps a DNS message encoding error from the `domain` crate.
    #[error(transparent)]
    ShortBuf(#[from] domain::base::ShortBuf),
}

//! The `Resolver` contract: the single operation every node in the
//! graph — transport client, group, router, modifier, cache,
//! blocklist, static responder — satisfies.

use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use domain::base::{iana::Rcode, Message, MessageBuilder};
use std::net::SocketAddr;

/// A DNS message as it crosses the `Resolver` boundary. Both queries
/// and responses are represented the same way; `domain::base::Message`
/// over a `Bytes` buffer is cheap to clone (an `Arc`-backed refcount
/// bump), matching the "query is immutable, modifiers produce new
/// messages" guarantee from the specification.
pub type Query = Message<Bytes>;

/// See [`Query`].
pub type Response = Message<Bytes>;

/// Per-query metadata about the client that is not part of the DNS
/// wire message itself.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    /// Source address of the query, if the transport exposes one (UDP/
    /// TCP listeners always do; an in-process test harness may not).
    pub src: Option<SocketAddr>,
    /// Identity of the inbound listener that accepted this query.
    pub listener_id: crate::Label,
    /// TLS SNI presented by the client, for DoT/DoH/DoQ listeners.
    pub sni: Option<String>,
    /// HTTP path of the request, for DoH listeners.
    pub doh_path: Option<String>,
}

impl ClientInfo {
    /// Build a `ClientInfo` for a plain transport with only a source
    /// address and listener identity (UDP/TCP/DoT).
    pub fn new(src: Option<SocketAddr>, listener_id: crate::Label) -> Self {
        Self {
            src,
            listener_id,
            sni: None,
            doh_path: None,
        }
    }
}

/// Uniform entry point for a query. Implementations must be safe to
/// call concurrently from many tasks; any internal state is the
/// implementation's own concurrency contract (see `spec.md` §5).
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `query` on behalf of `client`, returning a response
    /// whose transaction ID and question section mirror the input, or
    /// an error. Precondition: `query` carries exactly one question.
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<Response>;
}

#[async_trait]
impl<T: Resolver + ?Sized> Resolver for std::sync::Arc<T> {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<Response> {
        (**self).resolve(query, client).await
    }
}

/// Synthesize a `SERVFAIL` response mirroring `query`'s ID and
/// question, for use by any node that must answer locally rather than
/// propagate an error (listeners, the router's catch-all).
pub fn servfail(query: &Query) -> Result<Response> {
    start_answer(query, Rcode::ServFail)
}

/// Build an empty-answer response with the given RCODE, mirroring
/// `query`'s transaction ID and question section.
pub fn start_answer(query: &Query, rcode: Rcode) -> Result<Response> {
    let builder = MessageBuilder::from_target(bytes::BytesMut::with_capacity(512))?;
    Ok(builder.start_answer(query, rcode)?.into_message())
}

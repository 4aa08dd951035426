//! DNS-over-QUIC transport client (RFC 9250), feature-gated behind
//! `doq`. Not present in the teacher's own stack; grounded on `quinn`
//! usage in the wider example pack (see `DESIGN.md`).

use super::{ClientError, ConnInitiator, ConnPool, QHandle, MAX_MESSAGE_LEN};
use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use domain::base::Message;
use quinn::{ClientConfig, Endpoint};
use std::{net::SocketAddr, sync::Arc, time::Duration};

const DOQ_ALPN: &[u8] = b"doq";

/// Opens a QUIC connection (and a fresh bidirectional stream per
/// query, per RFC 9250 §4.2) to a fixed upstream.
pub struct DoqInitiator {
    endpoint: Endpoint,
    addr: SocketAddr,
    server_name: String,
}

impl DoqInitiator {
    /// Build an initiator validating the upstream as `server_name` at `addr`.
    pub fn new(server_name: String, addr: SocketAddr) -> std::result::Result<Self, ClientError> {
        let mut roots = rustls::RootCertStore::empty();
        roots.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
            rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(ta.subject, ta.spki, ta.name_constraints)
        }));
        let mut crypto = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(roots)
            .with_no_client_auth();
        crypto.alpn_protocols = vec![DOQ_ALPN.to_vec()];

        let bind_addr: SocketAddr = if addr.is_ipv4() { ([0u8; 4], 0).into() } else { ([0u16; 8], 0).into() };
        let mut endpoint = Endpoint::client(bind_addr)
            .map_err(|e| ClientError::Quic(e.to_string()))?;
        endpoint.set_default_client_config(ClientConfig::new(Arc::new(crypto)));

        Ok(Self {
            endpoint,
            addr,
            server_name,
        })
    }
}

#[async_trait]
impl ConnInitiator for DoqInitiator {
    type Connection = DoqConnection;

    async fn create(&self) -> std::io::Result<Self::Connection> {
        let connecting = self
            .endpoint
            .connect(self.addr, &self.server_name)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let connection = connecting
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(DoqConnection(connection))
    }

    fn conn_type(&self) -> &'static str {
        "DoQ"
    }
}

/// One QUIC connection, reused across queries by opening a new stream
/// per query as RFC 9250 requires (no stream reuse between messages).
pub struct DoqConnection(quinn::Connection);

#[async_trait]
impl QHandle for DoqConnection {
    async fn query(&self, msg: &Message<Bytes>) -> Result<Message<Bytes>, ClientError> {
        let mut msg = Message::from_octets(BytesMut::from(msg.as_slice()))?;
        msg.header_mut().set_random_id();
        let wire = msg.as_slice();

        let (mut send, mut recv) = self
            .0
            .open_bi()
            .await
            .map_err(|e| ClientError::Quic(e.to_string()))?;
        send.write_all(&(wire.len() as u16).to_be_bytes())
            .await
            .map_err(|e| ClientError::Quic(e.to_string()))?;
        send.write_all(wire).await.map_err(|e| ClientError::Quic(e.to_string()))?;
        send.finish().await.map_err(|e| ClientError::Quic(e.to_string()))?;

        let data = recv
            .read_to_end(MAX_MESSAGE_LEN)
            .await
            .map_err(|e| ClientError::Quic(e.to_string()))?;
        if data.len() < 2 {
            return Err(ClientError::Quic("truncated DoQ response".into()));
        }
        Ok(Message::from_octets(Bytes::copy_from_slice(&data[2..]))?)
    }

    async fn reusable(&self) -> bool {
        self.0.close_reason().is_none()
    }
}

/// DNS-over-QUIC `Resolver`, wrapping a bounded [`ConnPool`].
pub struct DoqClient {
    pool: ConnPool<DoqInitiator>,
}

impl DoqClient {
    /// Build a DoQ client validating `server_name` at `addr`.
    pub fn new(
        server_name: String,
        addr: SocketAddr,
        max_pool_size: usize,
        timeout: Duration,
    ) -> std::result::Result<Self, ClientError> {
        Ok(Self {
            pool: ConnPool::new(DoqInitiator::new(server_name, addr)?, max_pool_size, timeout)?,
        })
    }
}

#[async_trait]
impl Resolver for DoqClient {
    async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<crate::Response> {
        self.pool.query(&query).await.map_err(Into::into)
    }
}

//! DNS-over-TLS transport client, adapted from the teacher's
//! `qhandle/tls-rustls.rs`.

use super::{ClientError, ConnInitiator, ConnPool, QHandle, MAX_MESSAGE_LEN};
use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use domain::base::Message;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::Mutex,
};
use tokio_rustls::{client::TlsStream, TlsConnector};

fn default_client_config() -> ClientConfig {
    let mut root_store = RootCertStore::empty();
    root_store.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.0.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(ta.subject, ta.spki, ta.name_constraints)
    }));
    ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Opens a TLS-wrapped TCP connection to a fixed upstream, validating
/// the certificate against `domain` (the SNI/hostname to present).
pub struct DotInitiator {
    connector: TlsConnector,
    addr: SocketAddr,
    domain: String,
}

impl DotInitiator {
    /// Build an initiator validating the upstream as `domain` at `addr`.
    pub fn new(domain: String, addr: SocketAddr) -> Self {
        Self {
            connector: TlsConnector::from(Arc::new(default_client_config())),
            addr,
            domain,
        }
    }
}

#[async_trait]
impl ConnInitiator for DotInitiator {
    type Connection = Mutex<TlsStream<TcpStream>>;

    async fn create(&self) -> std::io::Result<Self::Connection> {
        let stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;
        let server_name = rustls::ServerName::try_from(self.domain.as_str())
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid DoT server name"))?;
        let tls = self
            .connector
            .connect(server_name, stream)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(Mutex::new(tls))
    }

    fn conn_type(&self) -> &'static str {
        "DoT"
    }
}

#[async_trait]
impl QHandle for Mutex<TlsStream<TcpStream>> {
    async fn query(&self, msg: &Message<Bytes>) -> Result<Message<Bytes>, ClientError> {
        let mut msg = Message::from_octets(BytesMut::from(msg.as_slice()))?;
        msg.header_mut().set_random_id();
        let wire = msg.as_slice();

        let mut stream = self.lock().await;
        stream.write_all(&(wire.len() as u16).to_be_bytes()).await?;
        stream.write_all(wire).await?;

        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await?;
        let resp_len = u16::from_be_bytes(len_buf) as usize;
        if resp_len > MAX_MESSAGE_LEN {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "DoT response exceeds maximum message length",
            )));
        }
        let mut buf = BytesMut::with_capacity(resp_len);
        buf.resize(resp_len, 0);
        stream.read_exact(&mut buf).await?;

        Ok(Message::from_octets(buf.freeze())?)
    }
}

/// DNS-over-TLS `Resolver`, wrapping a bounded [`ConnPool`].
pub struct DotClient {
    pool: ConnPool<DotInitiator>,
}

impl DotClient {
    /// Build a DoT client validating `domain` at `addr`.
    pub fn new(domain: String, addr: SocketAddr, max_pool_size: usize, timeout: Duration) -> std::result::Result<Self, ClientError> {
        Ok(Self {
            pool: ConnPool::new(DotInitiator::new(domain, addr), max_pool_size, timeout)?,
        })
    }
}

#[async_trait]
impl Resolver for DotClient {
    async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<crate::Response> {
        self.pool.query(&query).await.map_err(Into::into)
    }
}

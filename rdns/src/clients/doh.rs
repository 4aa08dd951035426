//! DNS-over-HTTPS transport client, adapted from the teacher's
//! `qhandle/https.rs`.

use super::{ClientError, ConnInitiator, QHandle};
use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use domain::base::Message;
use reqwest::{Client, Url};
use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Builds the (already connection-pooled by `reqwest`) client used for
/// every DoH query against one upstream URL.
pub struct DohInitiator {
    client: Client,
    url: Url,
}

impl DohInitiator {
    /// Build an initiator posting DNS wire messages to `url`. When
    /// `bootstrap` is set, the URL's host is pinned to that address so
    /// the HTTPS connection never depends on the system resolver.
    pub fn new(
        url: impl AsRef<str>,
        timeout: Duration,
        bootstrap: Option<IpAddr>,
    ) -> std::result::Result<Self, ClientError> {
        let url = Url::parse(url.as_ref())
            .map_err(|_| ClientError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid DoH URL")))?;
        let mut builder = Client::builder()
            .https_only(true)
            .user_agent(APP_USER_AGENT)
            .connect_timeout(timeout);
        if let Some(ip) = bootstrap {
            let host = url.host_str().ok_or_else(|| {
                ClientError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "DoH URL has no host"))
            })?;
            let port = url.port_or_known_default().unwrap_or(443);
            builder = builder.resolve(host, SocketAddr::new(ip, port));
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl ConnInitiator for DohInitiator {
    type Connection = DohConnection;

    async fn create(&self) -> std::io::Result<Self::Connection> {
        Ok(DohConnection {
            client: self.client.clone(),
            url: self.url.clone(),
        })
    }

    fn conn_type(&self) -> &'static str {
        "DoH"
    }
}

/// A cheaply-cloned handle onto the shared `reqwest::Client`; `reqwest`
/// owns the actual connection pool, so this "connection" is really
/// just the POST target.
#[derive(Clone)]
pub struct DohConnection {
    client: Client,
    url: Url,
}

#[async_trait]
impl QHandle for DohConnection {
    async fn query(&self, msg: &Message<Bytes>) -> Result<Message<Bytes>, ClientError> {
        // RFC 8484 §5.1: the message ID should be 0 to maximize HTTP
        // cache hit rate on shared DoH infrastructure.
        let mut msg = Message::from_octets(BytesMut::from(msg.as_slice()))?;
        msg.header_mut().set_id(0);

        let body: reqwest::Body = msg.into_octets().freeze().into();
        let res = self
            .client
            .post(self.url.clone())
            .header("content-type", "application/dns-message")
            .header("accept", "application/dns-message")
            .body(body)
            .send()
            .await
            .map_err(|e| ClientError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        if !res.status().is_success() {
            return Err(ClientError::FailedHttp(res.status().as_u16()));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| ClientError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        Ok(Message::from_octets(bytes)?)
    }
}

/// DNS-over-HTTPS `Resolver`. `reqwest::Client` is already
/// internally pooled, so this skips the `ConnPool`/`deadpool` wrapper
/// the other transports use and talks through the initiator directly.
pub struct DohClient {
    connection: DohConnection,
}

impl DohClient {
    /// Build a DoH client posting to `url`, optionally pinned to a
    /// `bootstrap`-resolved address.
    pub async fn new(
        url: impl AsRef<str>,
        timeout: Duration,
        bootstrap: Option<IpAddr>,
    ) -> std::result::Result<Self, ClientError> {
        let initiator = DohInitiator::new(url, timeout, bootstrap)?;
        let connection = initiator
            .create()
            .await
            .map_err(ClientError::Io)?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl Resolver for DohClient {
    async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<crate::Response> {
        self.connection.query(&query).await.map_err(Into::into)
    }
}

//! Plain TCP transport client: two-byte length-prefixed messages per
//! RFC 1035 §4.2.2.

use super::{ClientError, ConnInitiator, ConnPool, QHandle, MAX_MESSAGE_LEN};
use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use domain::base::Message;
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::Mutex,
};

/// Opens a TCP connection to a fixed upstream address.
pub struct TcpInitiator {
    addr: SocketAddr,
}

impl TcpInitiator {
    /// Target a fixed upstream address.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl ConnInitiator for TcpInitiator {
    type Connection = TcpConnection;

    async fn create(&self) -> std::io::Result<Self::Connection> {
        let stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(TcpConnection(Mutex::new(stream)))
    }

    fn conn_type(&self) -> &'static str {
        "TCP"
    }
}

/// A pipelined-but-serialized TCP connection: one query/response pair
/// is in flight at a time (RFC 7766 permits pipelining, but a
/// correctness-first client keeps this simple and relies on pooling
/// for concurrency).
pub struct TcpConnection(Mutex<TcpStream>);

#[async_trait]
impl QHandle for TcpConnection {
    async fn query(&self, msg: &Message<Bytes>) -> Result<Message<Bytes>, ClientError> {
        let mut msg = Message::from_octets(BytesMut::from(msg.as_slice()))?;
        msg.header_mut().set_random_id();
        let wire = msg.as_slice();

        let mut stream = self.0.lock().await;
        let len = (wire.len() as u16).to_be_bytes();
        stream.write_all(&len).await?;
        stream.write_all(wire).await?;

        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await?;
        let resp_len = u16::from_be_bytes(len_buf) as usize;
        if resp_len > MAX_MESSAGE_LEN {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "TCP response exceeds maximum message length",
            )));
        }
        let mut buf = BytesMut::with_capacity(resp_len);
        buf.resize(resp_len, 0);
        stream.read_exact(&mut buf).await?;

        Ok(Message::from_octets(buf.freeze())?)
    }

    async fn reusable(&self) -> bool {
        true
    }
}

/// TCP transport `Resolver`, wrapping a bounded [`ConnPool`].
pub struct TcpClient {
    pool: ConnPool<TcpInitiator>,
}

impl TcpClient {
    /// Build a TCP client connected to `addr`.
    pub fn new(addr: SocketAddr, max_pool_size: usize, timeout: Duration) -> std::result::Result<Self, ClientError> {
        Ok(Self {
            pool: ConnPool::new(TcpInitiator::new(addr), max_pool_size, timeout)?,
        })
    }
}

#[async_trait]
impl Resolver for TcpClient {
    async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<crate::Response> {
        self.pool.query(&query).await.map_err(Into::into)
    }
}

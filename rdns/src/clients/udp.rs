//! Plain UDP transport client, adapted from the teacher's
//! `qhandle/udp.rs`.

use super::{ClientError, ConnInitiator, ConnPool, QHandle, MAX_MESSAGE_LEN};
use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use domain::base::Message;
use std::{net::SocketAddr, time::Duration};
use tokio::net::UdpSocket;

/// Opens a UDP socket connected to a fixed upstream address.
pub struct UdpInitiator {
    addr: SocketAddr,
}

impl UdpInitiator {
    /// Target a fixed upstream address.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl ConnInitiator for UdpInitiator {
    type Connection = UdpSocket;

    async fn create(&self) -> std::io::Result<Self::Connection> {
        let bind_addr: SocketAddr = if self.addr.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.addr).await?;
        Ok(socket)
    }

    fn conn_type(&self) -> &'static str {
        "UDP"
    }
}

#[async_trait]
impl QHandle for UdpSocket {
    async fn query(&self, msg: &Message<bytes::Bytes>) -> Result<Message<bytes::Bytes>, ClientError> {
        let mut msg = Message::from_octets(BytesMut::from(msg.as_slice()))?;
        msg.header_mut().set_random_id();
        let msg = msg.for_slice();

        self.send(msg.as_slice()).await?;

        loop {
            let mut buf = BytesMut::with_capacity(MAX_MESSAGE_LEN);
            buf.resize(MAX_MESSAGE_LEN, 0);
            let len = self.recv(&mut buf).await?;
            buf.resize(len, 0);

            let answer = match Message::from_octets(buf.freeze()) {
                Ok(answer) => answer,
                Err(_) => continue,
            };
            if !answer.is_answer(&msg) {
                continue;
            }
            return Ok(answer);
        }
    }

    async fn reusable(&self) -> bool {
        true
    }
}

/// UDP transport `Resolver`, wrapping a bounded [`ConnPool`].
pub struct UdpClient {
    pool: ConnPool<UdpInitiator>,
}

impl UdpClient {
    /// Build a UDP client connected to `addr`, pooling up to
    /// `max_pool_size` sockets with `timeout` per query.
    pub fn new(addr: SocketAddr, max_pool_size: usize, timeout: Duration) -> std::result::Result<Self, ClientError> {
        Ok(Self {
            pool: ConnPool::new(UdpInitiator::new(addr), max_pool_size, timeout)?,
        })
    }
}

#[async_trait]
impl Resolver for UdpClient {
    async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<crate::Response> {
        self.pool.query(&query).await.map_err(Into::into)
    }
}

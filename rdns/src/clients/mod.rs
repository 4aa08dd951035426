//! Transport clients: terminal `Resolver`s that speak to an upstream
//! server over UDP, TCP, DoT, DoH, DoQ, or DTLS. Pooled connections via
//! `deadpool`, following the teacher's `ConnInitiator`/`QHandle`/
//! `ConnPool` split (`droute/src/router/upstreams/upstream/qhandle`):
//! a `ConnInitiator` knows how to open one connection, a `QHandle`
//! knows how to run one query over an open connection, and `ConnPool`
//! glues the two to a bounded, recyclable pool.

mod bootstrap;
mod dot;
mod doh;
mod tcp;
mod udp;

#[cfg(feature = "doq")]
mod doq;
#[cfg(feature = "dtls")]
mod dtls;

pub use bootstrap::BootstrapResolver;
pub use dot::DotClient;
pub use doh::DohClient;
pub use tcp::TcpClient;
pub use udp::UdpClient;

#[cfg(feature = "doq")]
pub use doq::DoqClient;
#[cfg(feature = "dtls")]
pub use dtls::DtlsClient;

use async_trait::async_trait;
use deadpool::managed::{self, Manager, Pool, RecycleError};
use domain::base::Message;
use std::time::Duration;
use thiserror::Error;
use tokio::time::error::Elapsed;

/// Maximum size of a single DNS message this crate will ever
/// send/receive, matching the practical ceiling for EDNS0 UDP payloads
/// and TCP length-prefixed messages alike.
pub(crate) const MAX_MESSAGE_LEN: usize = 65535;

/// Number of consecutive connection errors a pooled connection
/// tolerates before it is recycled rather than reused.
const MAX_ERROR_TOLERANCE: u8 = 2;

/// Errors a transport client can raise.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The query timed out waiting for a response.
    #[error(transparent)]
    Timeout(#[from] Elapsed),

    /// Underlying I/O failure (connect, send, recv).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The connection pool could not produce a connection.
    #[error(transparent)]
    Pool(#[from] managed::PoolError<std::io::Error>),

    /// The connection pool itself failed to build.
    #[error(transparent)]
    PoolBuild(#[from] managed::BuildError<std::io::Error>),

    /// A DNS message failed to encode.
    #[error(transparent)]
    ShortBuf(#[from] domain::base::ShortBuf),

    /// HTTP transport (DoH) returned something other than 200 OK.
    #[error("unsuccessful HTTP status from DoH upstream: {0}")]
    FailedHttp(u16),

    /// TLS handshake or record layer failure (DoT/DTLS).
    #[error("TLS error: {0}")]
    Tls(String),

    /// QUIC transport failure (DoQ).
    #[error("QUIC error: {0}")]
    Quic(String),

    /// The bootstrap resolver used to resolve an upstream hostname
    /// before a transport connection could be established failed.
    #[error("bootstrap resolution of `{0}` failed")]
    BootstrapFailed(String),
}

/// Opens one connection of a specific transport kind. Kept narrow so
/// `ConnPool` can wrap any of them uniformly.
#[async_trait]
pub trait ConnInitiator: Send + Sync + 'static {
    /// Connection type this initiator produces.
    type Connection: QHandle;
    /// Open a new connection.
    async fn create(&self) -> std::io::Result<Self::Connection>;
    /// Human-readable transport name, for logs.
    fn conn_type(&self) -> &'static str;
}

/// Runs one query over an already-open connection.
#[async_trait]
pub trait QHandle: Send + Sync {
    /// Send `msg` and return the matching answer.
    async fn query(&self, msg: &Message<bytes::Bytes>) -> Result<Message<bytes::Bytes>, ClientError>;
    /// Whether this connection is still healthy enough to reuse.
    async fn reusable(&self) -> bool {
        true
    }
}

struct ConnInitWrapper<T: ConnInitiator>(T);

#[async_trait]
impl<T: ConnInitiator> Manager for ConnInitWrapper<T> {
    type Type = (T::Connection, u8);
    type Error = std::io::Error;

    async fn create(&self) -> std::result::Result<Self::Type, Self::Error> {
        Ok((self.0.create().await?, 0))
    }

    async fn recycle(&self, obj: &mut Self::Type) -> managed::RecycleResult<Self::Error> {
        if !obj.0.reusable().await {
            return Err(RecycleError::StaticMessage("connection reported unreusable"));
        }
        if obj.1 >= MAX_ERROR_TOLERANCE {
            log::warn!("recycling {} connection after repeated errors", self.0.conn_type());
            return Err(RecycleError::StaticMessage("error threshold exceeded"));
        }
        Ok(())
    }
}

/// A bounded, recyclable pool of connections of one transport kind,
/// shared by every query a client sends.
pub struct ConnPool<T: ConnInitiator> {
    pool: Pool<ConnInitWrapper<T>>,
    timeout: Duration,
}

impl<T: ConnInitiator> ConnPool<T> {
    /// Build a pool of at most `max_pool_size` connections from `initiator`.
    pub fn new(initiator: T, max_pool_size: usize, timeout: Duration) -> Result<Self, ClientError> {
        let pool = Pool::builder(ConnInitWrapper(initiator))
            .max_size(max_pool_size)
            .runtime(deadpool::Runtime::Tokio1)
            .build()?;
        Ok(Self { pool, timeout })
    }

    /// Run a query against this pool, respecting the configured timeout.
    pub async fn query(&self, msg: &Message<bytes::Bytes>) -> Result<Message<bytes::Bytes>, ClientError> {
        let mut conn = self.pool.get().await?;
        match tokio::time::timeout(self.timeout, conn.0.query(msg)).await {
            Ok(Ok(resp)) => {
                conn.1 = 0;
                Ok(resp)
            }
            Ok(Err(e)) => {
                conn.1 += 1;
                Err(e)
            }
            Err(elapsed) => {
                conn.1 += 1;
                Err(ClientError::Timeout(elapsed))
            }
        }
    }
}

//! Inbound listeners: accept loops binding a `Resolver` graph to a
//! UDP/TCP/DoT/DoH/DoQ socket. Adapted from the teacher's plain UDP
//! accept loop (`dcompass/src/main.rs`), generalized to every
//! transport and to the `ClientInfo` the graph needs per query.

#[cfg(feature = "dot-rustls")]
pub mod dot;

#[cfg(feature = "doh-rustls")]
pub mod doh;

#[cfg(feature = "doq")]
pub mod doq;

use crate::{resolver::Response, ClientInfo, Label, Resolver, Result};
use bytes::{Bytes, BytesMut};
use domain::base::Message;
use log::warn;
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, UdpSocket},
};

const UDP_MAX_MESSAGE_LEN: usize = 4096;

/// Resolves `bytes` against `graph`. Only an unparsable wire message
/// reaches the caller as `Err` — there's no query to mirror an ID/
/// question onto, so no reply can be sent. A downstream resolve error
/// is instead turned into a synthesized SERVFAIL the caller sends like
/// any other answer (`SPEC_FULL.md` §7: log and return SERVFAIL to the
/// querier on unhandled errors).
async fn handle_query(
    graph: Arc<dyn Resolver>,
    bytes: Bytes,
    client: ClientInfo,
) -> Result<Response> {
    let query = Message::from_octets(bytes)
        .map_err(|_| crate::RdnsError::MalformedMessage("unparsable query".into()))?;
    match graph.resolve(query.clone(), &client).await {
        Ok(resp) => Ok(resp),
        Err(e) => {
            warn!("query from listener `{}` failed: {e}", client.listener_id);
            crate::resolver::servfail(&query)
        }
    }
}

/// Runs a UDP accept loop forever, spawning one task per datagram.
/// Returns only on a fatal socket error.
pub async fn serve_udp(id: Label, addr: SocketAddr, graph: Arc<dyn Resolver>) -> std::io::Result<()> {
    let socket = Arc::new(UdpSocket::bind(addr).await?);
    log::info!("UDP listener `{id}` bound to {addr}");
    loop {
        let mut buf = BytesMut::with_capacity(UDP_MAX_MESSAGE_LEN);
        buf.resize(UDP_MAX_MESSAGE_LEN, 0);
        let (len, src) = socket.recv_from(&mut buf).await?;
        buf.resize(len, 0);
        let bytes = buf.freeze();

        let socket = socket.clone();
        let graph = graph.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let client = ClientInfo::new(Some(src), id);
            match handle_query(graph.clone(), bytes, client.clone()).await {
                Ok(resp) => {
                    if let Err(e) = socket.send_to(resp.as_slice(), src).await {
                        warn!("UDP reply to {src} failed: {e}");
                    }
                }
                Err(e) => {
                    warn!("query from {src} failed: {e}");
                }
            }
        });
    }
}

/// Runs a TCP accept loop forever, one task per connection, each
/// connection serving length-prefixed queries until the client closes.
pub async fn serve_tcp(id: Label, addr: SocketAddr, graph: Arc<dyn Resolver>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("TCP listener `{id}` bound to {addr}");
    loop {
        let (mut stream, src) = listener.accept().await?;
        let graph = graph.clone();
        let id = id.clone();
        tokio::spawn(async move {
            loop {
                let mut len_buf = [0u8; 2];
                if stream.read_exact(&mut len_buf).await.is_err() {
                    return;
                }
                let len = u16::from_be_bytes(len_buf) as usize;
                let mut buf = BytesMut::with_capacity(len);
                buf.resize(len, 0);
                if stream.read_exact(&mut buf).await.is_err() {
                    return;
                }

                let client = ClientInfo::new(Some(src), id.clone());
                match handle_query(graph.clone(), buf.freeze(), client).await {
                    Ok(resp) => {
                        let wire = resp.as_slice();
                        let prefix = (wire.len() as u16).to_be_bytes();
                        if stream.write_all(&prefix).await.is_err() || stream.write_all(wire).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("query from {src} over TCP failed: {e}");
                        return;
                    }
                }
            }
        });
    }
}

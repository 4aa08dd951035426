//! Inbound DNS-over-TLS listener: wraps the same length-prefixed
//! framing as the plain TCP listener behind a `rustls` server acceptor.

use crate::{resolver::Response, ClientInfo, Label, Resolver, Result};
use bytes::BytesMut;
use domain::base::Message;
use log::warn;
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tokio_rustls::{rustls::ServerConfig, TlsAcceptor};

async fn handle_query(graph: Arc<dyn Resolver>, bytes: bytes::Bytes, client: ClientInfo) -> Result<Response> {
    let query = Message::from_octets(bytes)
        .map_err(|_| crate::RdnsError::MalformedMessage("unparsable query".into()))?;
    graph.resolve(query, &client).await
}

/// Runs a DoT accept loop forever, one task per TLS session.
pub async fn serve_dot(
    id: Label,
    addr: SocketAddr,
    tls_config: Arc<ServerConfig>,
    graph: Arc<dyn Resolver>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let acceptor = TlsAcceptor::from(tls_config);
    log::info!("DoT listener `{id}` bound to {addr}");
    loop {
        let (stream, src) = listener.accept().await?;
        let acceptor = acceptor.clone();
        let graph = graph.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let mut stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("DoT handshake with {src} failed: {e}");
                    return;
                }
            };
            let sni = stream
                .get_ref()
                .1
                .server_name()
                .map(ToOwned::to_owned);
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

                let client = ClientInfo {
                    src: Some(src),
                    listener_id: id.clone(),
                    sni: sni.clone(),
                    doh_path: None,
                };
                match handle_query(graph.clone(), buf.freeze(), client).await {
                    Ok(resp) => {
                        let wire = resp.as_slice();
                        let prefix = (wire.len() as u16).to_be_bytes();
                        if stream.write_all(&prefix).await.is_err() || stream.write_all(wire).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("query from {src} over DoT failed: {e}");
                        return;
                    }
                }
            }
        });
    }
}

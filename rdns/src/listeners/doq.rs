//! Inbound DNS-over-QUIC listener (RFC 9250): one bidirectional stream
//! per query, length-prefixed, matching the framing the `doq` client
//! transport speaks.

use crate::{resolver::Response, ClientInfo, Label, Resolver, Result};
use bytes::Bytes;
use domain::base::Message;
use log::warn;
use quinn::{Endpoint, ServerConfig};
use std::{net::SocketAddr, sync::Arc};

const MAX_MESSAGE_LEN: usize = 65535;

async fn handle_query(graph: Arc<dyn Resolver>, bytes: Bytes, client: ClientInfo) -> Result<Response> {
    let query = Message::from_octets(bytes)
        .map_err(|_| crate::RdnsError::MalformedMessage("unparsable query".into()))?;
    graph.resolve(query, &client).await
}

/// Runs a DoQ accept loop forever, one task per connection and per
/// stream within it.
pub async fn serve_doq(
    id: Label,
    addr: SocketAddr,
    server_config: ServerConfig,
    graph: Arc<dyn Resolver>,
) -> std::io::Result<()> {
    let endpoint = Endpoint::server(server_config, addr)?;
    log::info!("DoQ listener `{id}` bound to {addr}");
    while let Some(connecting) = endpoint.accept().await {
        let graph = graph.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let connection = match connecting.await {
                Ok(c) => c,
                Err(e) => {
                    warn!("DoQ handshake failed: {e}");
                    return;
                }
            };
            let src = connection.remote_address();
            loop {
                let (send, recv) = match connection.accept_bi().await {
                    Ok(streams) => streams,
                    Err(_) => return,
                };
                let graph = graph.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_stream(send, recv, graph, id, src).await {
                        warn!("DoQ stream from {src} failed: {e}");
                    }
                });
            }
        });
    }
    Ok(())
}

async fn handle_stream(
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    graph: Arc<dyn Resolver>,
    listener_id: Label,
    src: SocketAddr,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let data = recv.read_to_end(MAX_MESSAGE_LEN).await?;
    if data.len() < 2 {
        return Err("truncated DoQ query".into());
    }
    let bytes = Bytes::copy_from_slice(&data[2..]);

    let client = ClientInfo {
        src: Some(src),
        listener_id,
        sni: None,
        doh_path: None,
    };

    let resp = handle_query(graph, bytes, client).await?;
    let wire = resp.as_slice();
    send.write_all(&(wire.len() as u16).to_be_bytes()).await?;
    send.write_all(wire).await?;
    send.finish().await?;
    Ok(())
}

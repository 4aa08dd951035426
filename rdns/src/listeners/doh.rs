//! Inbound DNS-over-HTTPS listener (RFC 8484), serving POST requests
//! carrying a DNS wire message body over a `hyper` HTTP/1.1+2 server
//! behind TLS.

use crate::{resolver::Response, ClientInfo, Label, Resolver, Result};
use domain::base::Message;
use hyper::{
    server::conn::Http,
    service::service_fn,
    Body, Method, Request, StatusCode,
};
use log::warn;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tokio_rustls::{rustls::ServerConfig, TlsAcceptor};

const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

async fn handle_request(
    req: Request<Body>,
    graph: Arc<dyn Resolver>,
    src: SocketAddr,
    listener_id: Label,
    sni: Option<String>,
) -> std::result::Result<hyper::Response<Body>, hyper::Error> {
    if req.method() != Method::POST {
        return Ok(hyper::Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Body::empty())
            .unwrap());
    }
    let path = req.uri().path().to_string();
    let body = hyper::body::to_bytes(req.into_body()).await?;

    let client = ClientInfo {
        src: Some(src),
        listener_id,
        sni,
        doh_path: Some(path),
    };

    let query = match Message::from_octets(body) {
        Ok(q) => q,
        Err(_) => {
            return Ok(hyper::Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Body::empty())
                .unwrap())
        }
    };

    let resp = match graph.resolve(query.clone(), &client).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("DoH query from {src} failed: {e}");
            match crate::resolver::servfail(&query) {
                Ok(resp) => resp,
                Err(e) => {
                    warn!("DoH failed to synthesize SERVFAIL for {src}: {e}");
                    return Ok(hyper::Response::builder()
                        .status(StatusCode::INTERNAL_SERVER_ERROR)
                        .body(Body::empty())
                        .unwrap());
                }
            }
        }
    };
    Ok(hyper::Response::builder()
        .status(StatusCode::OK)
        .header("content-type", DNS_MESSAGE_CONTENT_TYPE)
        .body(Body::from(resp.into_octets().to_vec()))
        .unwrap())
}

/// Runs a DoH accept loop forever, one `hyper` connection task per
/// TLS session.
pub async fn serve_doh(
    id: Label,
    addr: SocketAddr,
    tls_config: Arc<ServerConfig>,
    graph: Arc<dyn Resolver>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let acceptor = TlsAcceptor::from(tls_config);
    log::info!("DoH listener `{id}` bound to {addr}");
    loop {
        let (stream, src) = listener.accept().await?;
        let acceptor = acceptor.clone();
        let graph = graph.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("DoH handshake with {src} failed: {e}");
                    return;
                }
            };
            let sni = stream.get_ref().1.server_name().map(ToOwned::to_owned);

            let service = service_fn(move |req| {
                handle_request(req, graph.clone(), src, id.clone(), sni.clone())
            });
            if let Err(e) = Http::new().serve_connection(stream, service).await {
                warn!("DoH connection with {src} ended: {e}");
            }
        });
    }
}

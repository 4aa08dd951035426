//! Loads a PEM certificate chain and private key into the
//! `rustls::ServerConfig` every inbound TLS-bearing listener (DoT,
//! DoH, and — behind the `doq` feature — DoQ) needs.

use anyhow::{anyhow, Context, Result};
use std::{fs::File, io::BufReader, path::Path, sync::Arc};
use tokio_rustls::rustls::{Certificate, PrivateKey, ServerConfig};

/// Build a `rustls::ServerConfig` from a PEM cert chain and PEM
/// private key (PKCS#8 or RSA), for DoT/DoH listeners.
pub fn load_server_config(cert: &Path, key: &Path) -> Result<Arc<ServerConfig>> {
    let certs = load_certs(cert)?;
    let key = load_private_key(key)?;

    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid certificate/key pair")?;

    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> Result<Vec<Certificate>> {
    let file = File::open(path).with_context(|| format!("opening certificate `{}`", path.display()))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .with_context(|| format!("parsing certificate `{}`", path.display()))?;
    if certs.is_empty() {
        return Err(anyhow!("no certificates found in `{}`", path.display()));
    }
    Ok(certs.into_iter().map(Certificate).collect())
}

fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let file = File::open(path).with_context(|| format!("opening private key `{}`", path.display()))?;
    let mut reader = BufReader::new(file);

    let pkcs8 = rustls_pemfile::pkcs8_private_keys(&mut reader)
        .with_context(|| format!("parsing private key `{}`", path.display()))?;
    if let Some(key) = pkcs8.into_iter().next() {
        return Ok(PrivateKey(key));
    }

    // Rewind and retry as a classic RSA (PKCS#1) key.
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let rsa = rustls_pemfile::rsa_private_keys(&mut reader)
        .with_context(|| format!("parsing private key `{}`", path.display()))?;
    rsa.into_iter()
        .next()
        .map(PrivateKey)
        .ok_or_else(|| anyhow!("no private key found in `{}`", path.display()))
}

/// Build a `quinn::ServerConfig` from the same cert/key pair, for the
/// DoQ listener.
#[cfg(feature = "doq")]
pub fn load_quic_server_config(cert: &Path, key: &Path) -> Result<quinn::ServerConfig> {
    let certs = load_certs(cert)?;
    let key = load_private_key(key)?;
    let mut crypto = tokio_rustls::rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid certificate/key pair")?;
    crypto.alpn_protocols = vec![b"doq".to_vec()];
    Ok(quinn::ServerConfig::with_crypto(Arc::new(crypto)))
}

//! Bootstrap resolver: resolves an upstream's configured hostname to
//! an address once at startup (and on reconnect), so DoT/DoH/DoQ
//! upstreams can be configured by name without depending on the
//! system resolver.

use super::{ClientError, UdpClient};
use crate::{ClientInfo, Label, Resolver};
use domain::base::{iana::Rtype, Dname, MessageBuilder};
use std::net::{IpAddr, SocketAddr};

/// Resolves upstream hostnames via a fixed plain-DNS resolver,
/// independent of the graph being built (this exists specifically to
/// avoid a circular dependency where resolving an upstream's hostname
/// requires the very graph that upstream is part of).
pub struct BootstrapResolver {
    client: UdpClient,
}

impl BootstrapResolver {
    /// Build a bootstrap resolver querying `addr` directly over UDP.
    pub fn new(addr: SocketAddr) -> std::result::Result<Self, ClientError> {
        Ok(Self {
            client: UdpClient::new(addr, 4, std::time::Duration::from_secs(5))?,
        })
    }

    /// Resolve `hostname` to its first A/AAAA address.
    pub async fn resolve_hostname(&self, hostname: &str) -> std::result::Result<IpAddr, ClientError> {
        let name = Dname::<bytes::Bytes>::from_chars(format!("{hostname}.").chars())
            .map_err(|e| ClientError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())))?;

        let mut builder = MessageBuilder::from_target(bytes::BytesMut::with_capacity(512))?;
        builder.header_mut().set_rd(true);
        let mut builder = builder.question();
        builder.push((name, Rtype::A, domain::base::iana::Class::In))?;
        let query = builder.into_message();

        let client_info = ClientInfo::new(None, Label::from("bootstrap"));
        let resp = self
            .client
            .resolve(query, &client_info)
            .await
            .map_err(|e| ClientError::BootstrapFailed(e.to_string()))?;

        resp.answer()
            .ok()
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|rr| {
                rr.into_any_record::<domain::rdata::AllRecordData<_, _>>()
                    .ok()
                    .flatten()
            })
            .find_map(|rr| match rr.data() {
                domain::rdata::AllRecordData::A(a) => Some(IpAddr::V4(a.addr())),
                domain::rdata::AllRecordData::Aaaa(aaaa) => Some(IpAddr::V6(aaaa.addr())),
                _ => None,
            })
            .ok_or_else(|| ClientError::BootstrapFailed(hostname.to_string()))
    }
}

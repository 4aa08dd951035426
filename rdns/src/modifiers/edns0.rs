//! `edns0-modifier`: force the DO bit and/or UDP payload size on
//! outgoing queries, independent of what the client asked for.

use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use domain::base::MessageBuilder;
use std::sync::Arc;

/// Forces EDNS0 parameters on the query before forwarding.
pub struct Edns0Modifier {
    dnssec_ok: Option<bool>,
    udp_payload_size: Option<u16>,
    downstream: Arc<dyn Resolver>,
}

impl Edns0Modifier {
    /// Build an EDNS0 modifier wrapping `downstream`.
    pub fn new(dnssec_ok: Option<bool>, udp_payload_size: Option<u16>, downstream: Arc<dyn Resolver>) -> Self {
        Self {
            dnssec_ok,
            udp_payload_size,
            downstream,
        }
    }
}

#[async_trait]
impl Resolver for Edns0Modifier {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        if self.dnssec_ok.is_none() && self.udp_payload_size.is_none() {
            return self.downstream.resolve(query, client).await;
        }

        let mut builder =
            MessageBuilder::from_target(bytes::BytesMut::with_capacity(query.as_slice().len() + 16))?;
        *builder.header_mut() = query.header();
        let mut builder = builder.question();
        for q in query.question().flatten() {
            builder.push(q)?;
        }
        let mut builder = builder.answer().authority().additional();
        let mut opt = builder.opt()?;
        if let Some(do_bit) = self.dnssec_ok {
            opt.set_dnssec_ok(do_bit);
        }
        if let Some(size) = self.udp_payload_size {
            opt.set_udp_payload_size(size);
        }
        let query = opt.finish().into_message();
        self.downstream.resolve(query, client).await
    }
}

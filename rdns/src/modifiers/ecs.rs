//! `ecs-modifier`: attach an EDNS0 Client Subnet option to the query
//! before forwarding, either a static subnet or one derived from the
//! client's real source address. Adapted from the teacher's ECS
//! action (`droute/src/router/table/rule/actions/ecs.rs`).

use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use domain::base::{
    opt::{AllOptData, ClientSubnet},
    MessageBuilder,
};
use std::{net::IpAddr, sync::Arc};

/// Where the ECS modifier gets the subnet to attach.
pub enum EcsSource {
    /// Always attach this fixed subnet.
    Static(IpAddr, u8),
    /// Derive the subnet from the client's real source address,
    /// truncated to `v4_prefix`/`v6_prefix` bits.
    Dynamic { v4_prefix: u8, v6_prefix: u8 },
}

/// Attaches (or overwrites) an ECS option on the query before
/// forwarding to `downstream`.
pub struct EcsModifier {
    source: EcsSource,
    downstream: Arc<dyn Resolver>,
}

impl EcsModifier {
    /// Build an ECS modifier wrapping `downstream`.
    pub fn new(source: EcsSource, downstream: Arc<dyn Resolver>) -> Self {
        Self { source, downstream }
    }

    fn subnet_for(&self, client: &ClientInfo) -> Option<(IpAddr, u8)> {
        match &self.source {
            EcsSource::Static(addr, prefix) => Some((*addr, *prefix)),
            EcsSource::Dynamic { v4_prefix, v6_prefix } => {
                let addr = client.src?.ip();
                let prefix = if addr.is_ipv4() { *v4_prefix } else { *v6_prefix };
                Some((addr, prefix))
            }
        }
    }

    fn add_ecs_record(query: &Query, addr: IpAddr, prefix: u8) -> Result<Query> {
        let mut builder =
            MessageBuilder::from_target(bytes::BytesMut::with_capacity(query.as_slice().len() + 32))?;
        *builder.header_mut() = query.header();
        let mut builder = builder.question();
        for q in query.question().flatten() {
            builder.push(q)?;
        }
        let mut builder = builder.answer().authority().additional();
        let mut opt = builder.opt()?;
        if let Some(existing) = query.opt() {
            for data in existing
                .as_opt()
                .iter::<AllOptData<bytes::Bytes, _>>()
                .flatten()
            {
                if !matches!(data, AllOptData::ClientSubnet(_)) {
                    opt.push(&data)?;
                }
            }
        }
        opt.push(&ClientSubnet::new(prefix, 0, addr))?;
        Ok(opt.finish().into_message())
    }
}

#[async_trait]
impl Resolver for EcsModifier {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        match self.subnet_for(client) {
            Some((addr, prefix)) => {
                let query = Self::add_ecs_record(&query, addr, prefix)?;
                self.downstream.resolve(query, client).await
            }
            None => self.downstream.resolve(query, client).await,
        }
    }
}

//! `client-blocklist`: reject queries by the client's source address
//! before they ever reach a cache or downstream resolver.

use super::{rules::MultiDb, BlockAction};
use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Blocks or passes queries based on the client's source IP against a
/// CIDR (or GeoIP) rule engine.
pub struct ClientBlocklist {
    db: MultiDb,
    inverted: bool,
    action: BlockAction,
    block_resolver: Option<Arc<dyn Resolver>>,
    downstream: Arc<dyn Resolver>,
}

impl ClientBlocklist {
    /// Build a client-blocklist node wrapping `downstream`. `block_resolver`,
    /// when set, is dispatched to on a block instead of answering with
    /// `action` directly.
    pub fn new(
        engines: Vec<super::RuleEngine>,
        inverted: bool,
        action: BlockAction,
        block_resolver: Option<Arc<dyn Resolver>>,
        downstream: Arc<dyn Resolver>,
    ) -> Self {
        Self {
            db: MultiDb::new(engines),
            inverted,
            action,
            block_resolver,
            downstream,
        }
    }
}

#[async_trait]
impl Resolver for ClientBlocklist {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let Some(src) = client.src else {
            return self.downstream.resolve(query, client).await;
        };
        let hit = self.db.match_ip(src.ip()).is_some();
        let blocked = if self.inverted { !hit } else { hit };
        if !blocked {
            return self.downstream.resolve(query, client).await;
        }
        if let Some(resolver) = &self.block_resolver {
            return resolver.resolve(query, client).await;
        }
        match self.action {
            BlockAction::Refuse => {
                crate::resolver::start_answer(&query, domain::base::iana::Rcode::Refused).map_err(Into::into)
            }
            BlockAction::NxDomain => {
                crate::resolver::start_answer(&query, domain::base::iana::Rcode::NXDomain).map_err(Into::into)
            }
            BlockAction::Drop => Err(crate::RdnsError::PolicyRejected(format!(
                "client {src} rejected by client-blocklist"
            ))),
        }
    }
}

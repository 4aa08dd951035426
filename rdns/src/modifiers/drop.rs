//! `drop`: unconditionally discard the query, configured behind a
//! router predicate that only ever dispatches the traffic meant to be
//! silently dropped.

use crate::{resolver::Query, ClientInfo, RdnsError, Resolver, Result};
use async_trait::async_trait;

/// Terminal node that always rejects with no downstream response.
pub struct Drop;

#[async_trait]
impl Resolver for Drop {
    async fn resolve(&self, _query: Query, _client: &ClientInfo) -> Result<crate::Response> {
        Err(RdnsError::PolicyRejected("query dropped".into()))
    }
}

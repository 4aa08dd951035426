//! `response-minimize`: strip Authority/Additional sections (besides
//! OPT) from an answer, for deployments that don't trust or don't want
//! to forward glue records to clients.

use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use domain::base::MessageBuilder;
use std::sync::Arc;

/// Trims a response down to header, question, and answer sections.
pub struct ResponseMinimize {
    downstream: Arc<dyn Resolver>,
}

impl ResponseMinimize {
    /// Build a response-minimize modifier wrapping `downstream`.
    pub fn new(downstream: Arc<dyn Resolver>) -> Self {
        Self { downstream }
    }
}

#[async_trait]
impl Resolver for ResponseMinimize {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let resp = self.downstream.resolve(query, client).await?;
        let mut builder = MessageBuilder::from_target(bytes::BytesMut::with_capacity(
            resp.as_slice().len(),
        ))?;
        *builder.header_mut() = resp.header();
        let mut builder = builder.question();
        for q in resp.question().flatten() {
            builder.push(q)?;
        }
        let mut builder = builder.answer();
        for rr in resp.answer().into_iter().flatten().flatten() {
            builder.push(rr)?;
        }
        Ok(builder.into_message())
    }
}

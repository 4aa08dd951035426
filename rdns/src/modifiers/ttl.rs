//! `ttl-modifier`: clamp every answer record's TTL into `[min, max]`.

use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use domain::base::MessageBuilder;
use std::sync::Arc;

/// Clamps answer TTLs to a configured range on the way back from
/// `downstream`. A common pairing with [`super::Cache`] to force a
/// sane floor/ceiling regardless of what upstream advertises.
pub struct TtlModifier {
    min: u32,
    max: u32,
    downstream: Arc<dyn Resolver>,
}

impl TtlModifier {
    /// Build a TTL clamp modifier. `min` must not exceed `max`.
    pub fn new(min: u32, max: u32, downstream: Arc<dyn Resolver>) -> Self {
        Self {
            min: min.min(max),
            max,
            downstream,
        }
    }
}

#[async_trait]
impl Resolver for TtlModifier {
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
            let mut rr = rr;
            rr.set_ttl(rr.ttl().clamp(self.min, self.max));
            builder.push(rr)?;
        }
        Ok(builder.into_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolver::Response, Label};
    use domain::base::iana::Rcode;

    struct FixedTtl(u32);

    #[async_trait]
    impl Resolver for FixedTtl {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            let mut builder =
                MessageBuilder::from_target(bytes::BytesMut::with_capacity(512))?;
            let answer = builder.start_answer(&query, Rcode::NoError)?;
            let mut builder = answer.answer();
            builder.push((
                domain::base::Dname::<bytes::Bytes>::from_chars("example.com.".chars()).unwrap(),
                domain::base::iana::Class::In,
                self.0,
                domain::base::rdata::rfc1035::A::from_octets([127, 0, 0, 1]),
            ))?;
            Ok(builder.into_message())
        }
    }

    #[tokio::test]
    async fn clamps_ttl_into_range() {
        let modifier = TtlModifier::new(30, 300, Arc::new(FixedTtl(5)));
        let client = ClientInfo::new(None, Label::from("t"));
        let builder = MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        let query = builder.question().into_message();
        let resp = modifier.resolve(query, &client).await.unwrap();
        let ttl = resp.answer().unwrap().next().unwrap().unwrap().ttl();
        assert_eq!(ttl, 30);
    }
}

//! `rate-limiter`: token-bucket query throttling, keyed on a
//! prefix-masked client identity via `governor`.

use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use domain::base::iana::Rcode;
use governor::{
    clock::DefaultClock,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter as GovernorLimiter,
};
use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    num::NonZeroU32,
    sync::Arc,
};

/// Masks `addr` to its network prefix: `prefix4` bits for an IPv4
/// address, `prefix6` bits for IPv6. Clients sharing a prefix share a
/// bucket, so e.g. a CGNAT /32 doesn't get one bucket per host.
fn mask(addr: IpAddr, prefix4: u8, prefix6: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = prefix4.min(32);
            let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
            IpAddr::V4(Ipv4Addr::from(u32::from(v4) & mask))
        }
        IpAddr::V6(v6) => {
            let bits = prefix6.min(128);
            let mask = if bits == 0 { 0 } else { u128::MAX << (128 - bits) };
            IpAddr::V6(Ipv6Addr::from(u128::from(v6) & mask))
        }
    }
}

/// Throttles queries per prefix-masked client identity with a token
/// bucket. A query over quota is answered REFUSED directly, or handed
/// to `limit_resolver` when one is configured (e.g. a static
/// `slow-down` responder instead of a bare refusal).
pub struct RateLimiter {
    limiter: GovernorLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>,
    prefix4: u8,
    prefix6: u8,
    limit_resolver: Option<Arc<dyn Resolver>>,
    downstream: Arc<dyn Resolver>,
}

impl RateLimiter {
    /// Build a rate limiter allowing `queries_per_second` sustained,
    /// bursting up to `burst`, keyed on addresses masked to
    /// `prefix4`/`prefix6` bits.
    pub fn new(
        queries_per_second: NonZeroU32,
        burst: NonZeroU32,
        prefix4: u8,
        prefix6: u8,
        limit_resolver: Option<Arc<dyn Resolver>>,
        downstream: Arc<dyn Resolver>,
    ) -> Self {
        let quota = Quota::per_second(queries_per_second).allow_burst(burst);
        Self {
            limiter: GovernorLimiter::keyed(quota),
            prefix4,
            prefix6,
            limit_resolver,
            downstream,
        }
    }
}

#[async_trait]
impl Resolver for RateLimiter {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let addr = client.src.map(|a| a.ip()).unwrap_or(IpAddr::from([0, 0, 0, 0]));
        let key = mask(addr, self.prefix4, self.prefix6);
        match self.limiter.check_key(&key) {
            Ok(_) => self.downstream.resolve(query, client).await,
            Err(_) => match &self.limit_resolver {
                Some(resolver) => resolver.resolve(query, client).await,
                None => crate::resolver::start_answer(&query, Rcode::Refused),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolver::Response, Label};
    use domain::base::MessageBuilder;

    struct Succeeds;

    #[async_trait]
    impl Resolver for Succeeds {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            crate::resolver::start_answer(&query, Rcode::NoError)
        }
    }

    fn a_query() -> Query {
        let builder = MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.question().into_message()
    }

    #[tokio::test]
    async fn same_prefix_shares_one_bucket() {
        let limiter = RateLimiter::new(
            NonZeroU32::new(1).unwrap(),
            NonZeroU32::new(1).unwrap(),
            24,
            64,
            None,
            Arc::new(Succeeds),
        );
        let a = ClientInfo::new(Some("10.0.0.1:1234".parse().unwrap()), Label::from("t"));
        let b = ClientInfo::new(Some("10.0.0.2:1234".parse().unwrap()), Label::from("t"));

        let resp = limiter.resolve(a_query(), &a).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NoError);

        // Same /24 as `a`, already spent the burst allowance.
        let resp = limiter.resolve(a_query(), &b).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::Refused);
    }
}

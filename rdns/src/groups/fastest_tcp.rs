use crate::{resolver::Query, ClientInfo, Label, Resolver, Result};
use async_trait::async_trait;
use bytes::Bytes;
use domain::base::{iana::Rcode, rdata::AllRecordData, MessageBuilder, ParsedRecord};
use futures::stream::{FuturesUnordered, StreamExt};
use std::{collections::HashSet, net::IpAddr, sync::Arc, time::Duration};
use tokio::net::TcpStream;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolves via `primary`, then TCP-connect-probes every A/AAAA address
/// in the answer in parallel, reordering the answer so addresses that
/// accepted a connection come first. The idea is to avoid handing a
/// client an address behind a broken or filtered TCP path.
pub struct FastestTcp {
    primary: Arc<dyn Resolver>,
    port: u16,
    wait_all: bool,
    success_ttl_min: u32,
}

impl FastestTcp {
    /// Build a fastest-tcp group. `port` is the port probed on every
    /// candidate address. When `wait_all` is set, the group waits for
    /// every probe to settle before answering; otherwise it still waits
    /// for every probe, but only to make the reorder deterministic (no
    /// extra children to race here, unlike [`super::Fastest`]). Answers
    /// whose address passed its probe get their TTL floored to
    /// `success_ttl_min`.
    pub fn new(
        _label: Label,
        primary: Arc<dyn Resolver>,
        port: u16,
        wait_all: bool,
        success_ttl_min: u32,
    ) -> Self {
        Self {
            primary,
            port,
            wait_all,
            success_ttl_min,
        }
    }

    fn addr_of(rr: &ParsedRecord<Bytes>) -> Option<IpAddr> {
        let any = rr.to_any_record::<AllRecordData<_, _>>().ok().flatten()?;
        match any.data() {
            AllRecordData::A(a) => Some(IpAddr::V4(a.addr())),
            AllRecordData::Aaaa(aaaa) => Some(IpAddr::V6(aaaa.addr())),
            _ => None,
        }
    }

    async fn probe(&self, addr: IpAddr) -> bool {
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((addr, self.port)))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }

    async fn reorder(&self, resp: crate::Response) -> crate::Response {
        let mut answers: Vec<_> = resp.answer().into_iter().flatten().flatten().collect();
        let candidates: HashSet<IpAddr> = answers.iter().filter_map(Self::addr_of).collect();
        if candidates.is_empty() {
            return resp;
        }

        let mut succeeded: HashSet<IpAddr> = HashSet::new();
        let mut futs: FuturesUnordered<_> = candidates
            .iter()
            .copied()
            .map(|addr| async move { (addr, self.probe(addr).await) })
            .collect();
        if self.wait_all {
            while let Some((addr, ok)) = futs.next().await {
                if ok {
                    succeeded.insert(addr);
                }
            }
        } else {
            // Stop at the first successful probe instead of waiting out
            // every connect attempt/timeout; remaining candidates keep
            // their relative order behind it.
            while let Some((addr, ok)) = futs.next().await {
                if ok {
                    succeeded.insert(addr);
                    break;
                }
            }
        }

        answers.sort_by_key(|rr| match Self::addr_of(rr) {
            Some(a) if succeeded.contains(&a) => 0,
            _ => 1,
        });
        for rr in answers.iter_mut() {
            if let Some(addr) = Self::addr_of(rr) {
                if succeeded.contains(&addr) {
                    rr.set_ttl(rr.ttl().max(self.success_ttl_min));
                }
            }
        }

        let mut builder = match MessageBuilder::from_target(bytes::BytesMut::with_capacity(
            resp.as_slice().len() + 16,
        )) {
            Ok(b) => b,
            Err(_) => return resp,
        };
        *builder.header_mut() = resp.header();
        let mut builder = builder.question();
        for q in resp.question().flatten() {
            let _ = builder.push(q);
        }
        let mut builder = builder.answer();
        for rr in answers {
            let _ = builder.push(rr);
        }
        builder.into_message()
    }
}

#[async_trait]
impl Resolver for FastestTcp {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let resp = self.primary.resolve(query, client).await?;
        if resp.header().rcode() != Rcode::NoError {
            return Ok(resp);
        }
        Ok(self.reorder(resp).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Response;
    use domain::base::iana::Class;

    struct TwoAddresses;

    #[async_trait]
    impl Resolver for TwoAddresses {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            let mut builder = MessageBuilder::from_target(bytes::BytesMut::new())?;
            let answer = builder.start_answer(&query, Rcode::NoError)?;
            let mut builder = answer.answer();
            if let Some(q) = query.first_question() {
                builder.push((
                    q.qname().to_bytes(),
                    Class::In,
                    300,
                    domain::base::rdata::rfc1035::A::from_octets([127, 0, 0, 1]),
                ))?;
                builder.push((
                    q.qname().to_bytes(),
                    Class::In,
                    300,
                    domain::base::rdata::rfc1035::A::from_octets([203, 0, 113, 1]),
                ))?;
            }
            Ok(builder.into_message())
        }
    }

    fn a_query() -> Query {
        let mut builder = MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        let mut builder = builder.question();
        builder
            .push((
                domain::base::Dname::<Bytes>::from_chars("example.com.".chars()).unwrap(),
                domain::base::iana::Rtype::A,
                Class::In,
            ))
            .unwrap();
        builder.into_message()
    }

    #[tokio::test]
    async fn reorders_so_reachable_address_comes_first() {
        // 127.0.0.1 always accepts a local connect; 203.0.113.1 (TEST-NET-3)
        // is non-routable and will fail to connect.
        let group = FastestTcp::new(Label::from("ft"), Arc::new(TwoAddresses), 1, false, 600);
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = group.resolve(a_query(), &client).await.unwrap();
        let first = resp.answer().unwrap().next().unwrap().unwrap();
        let first = FastestTcp::addr_of(&first);
        assert_eq!(
            first,
            Some(IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)))
        );
    }
}

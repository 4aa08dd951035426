//! `response-collapse`: follow the CNAME chain in an answer section and
//! emit only the terminal A/AAAA records, so a client that only wants
//! an address doesn't have to walk the chain itself.

use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use domain::base::{iana::Rcode, rdata::AllRecordData, MessageBuilder, ParsedRecord};
use std::sync::Arc;

/// A chain longer than this is treated as a dead end rather than
/// followed forever (also guards against a CNAME cycle).
const MAX_CHAIN: usize = 16;

/// Collapses a CNAME chain down to its terminal A/AAAA records,
/// dropping the intermediate CNAMEs. Answers NXDOMAIN if the chain
/// never reaches an address record.
pub struct ResponseCollapse {
    downstream: Arc<dyn Resolver>,
}

impl ResponseCollapse {
    /// Build a response-collapse modifier wrapping `downstream`.
    pub fn new(downstream: Arc<dyn Resolver>) -> Self {
        Self { downstream }
    }
}

#[async_trait]
impl Resolver for ResponseCollapse {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let resp = self.downstream.resolve(query.clone(), client).await?;
        if resp.header().rcode() != Rcode::NoError {
            return Ok(resp);
        }

        let answers: Vec<ParsedRecord<bytes::Bytes>> =
            resp.answer().into_iter().flatten().flatten().collect();
        let Some(mut current) = query.first_question().map(|q| q.qname().to_string()) else {
            return Ok(resp);
        };

        let mut terminal = Vec::new();
        let mut reached_address = false;
        for _ in 0..MAX_CHAIN {
            let mut cname_target = None;
            let mut addresses = Vec::new();
            for rr in &answers {
                if rr.owner().to_string() != current {
                    continue;
                }
                let Some(parsed) = rr.to_any_record::<AllRecordData<_, _>>().ok().flatten() else {
                    continue;
                };
                match parsed.data() {
                    AllRecordData::Cname(cname) => cname_target = Some(cname.cname().to_string()),
                    AllRecordData::A(_) | AllRecordData::Aaaa(_) => addresses.push(rr.clone()),
                    _ => {}
                }
            }

            if !addresses.is_empty() {
                terminal = addresses;
                reached_address = true;
                break;
            }
            match cname_target {
                Some(next) => current = next,
                None => break,
            }
        }

        if !reached_address {
            return crate::resolver::start_answer(&query, Rcode::NXDomain);
        }

        let mut builder = MessageBuilder::from_target(bytes::BytesMut::with_capacity(
            resp.as_slice().len(),
        ))?;
        *builder.header_mut() = resp.header();
        let mut builder = builder.question();
        for q in resp.question().flatten() {
            builder.push(q)?;
        }
        let mut builder = builder.answer();
        for rr in terminal {
            builder.push(rr)?;
        }
        Ok(builder.into_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolver::Response, ClientInfo, Label};
    use domain::base::iana::Class;

    fn query_for(name: &str) -> Query {
        let mut builder = MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        let mut builder = builder.question();
        builder
            .push((
                domain::base::Dname::<bytes::Bytes>::from_chars(format!("{name}.").chars())
                    .unwrap(),
                domain::base::iana::Rtype::A,
                Class::In,
            ))
            .unwrap();
        builder.into_message()
    }

    struct CnameThenA;

    #[async_trait]
    impl Resolver for CnameThenA {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            let mut builder = MessageBuilder::from_target(bytes::BytesMut::new())?;
            let answer = builder.start_answer(&query, Rcode::NoError)?;
            let mut builder = answer.answer();
            builder.push((
                domain::base::Dname::<bytes::Bytes>::from_chars("alias.example.".chars()).unwrap(),
                Class::In,
                300,
                domain::base::rdata::rfc1035::Cname::new(
                    domain::base::Dname::<bytes::Bytes>::from_chars("real.example.".chars()).unwrap(),
                ),
            ))?;
            builder.push((
                domain::base::Dname::<bytes::Bytes>::from_chars("real.example.".chars()).unwrap(),
                Class::In,
                300,
                domain::base::rdata::rfc1035::A::from_octets([10, 0, 0, 1]),
            ))?;
            Ok(builder.into_message())
        }
    }

    struct DanglingCname;

    #[async_trait]
    impl Resolver for DanglingCname {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            let mut builder = MessageBuilder::from_target(bytes::BytesMut::new())?;
            let answer = builder.start_answer(&query, Rcode::NoError)?;
            let mut builder = answer.answer();
            builder.push((
                domain::base::Dname::<bytes::Bytes>::from_chars("alias.example.".chars()).unwrap(),
                Class::In,
                300,
                domain::base::rdata::rfc1035::Cname::new(
                    domain::base::Dname::<bytes::Bytes>::from_chars("nowhere.example.".chars())
                        .unwrap(),
                ),
            ))?;
            Ok(builder.into_message())
        }
    }

    #[tokio::test]
    async fn collapses_chain_to_terminal_address() {
        let modifier = ResponseCollapse::new(Arc::new(CnameThenA));
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = modifier
            .resolve(query_for("alias.example"), &client)
            .await
            .unwrap();
        let rrs: Vec<_> = resp.answer().unwrap().flatten().collect();
        assert_eq!(rrs.len(), 1);
        assert_eq!(rrs[0].owner().to_string(), "real.example.");
    }

    #[tokio::test]
    async fn dead_end_chain_answers_nxdomain() {
        let modifier = ResponseCollapse::new(Arc::new(DanglingCname));
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = modifier
            .resolve(query_for("alias.example"), &client)
            .await
            .unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NXDomain);
    }
}

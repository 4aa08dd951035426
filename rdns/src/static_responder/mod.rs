//! `static-responder` and `static-template`: terminal resolvers that
//! answer entirely from local configuration, never going downstream.
//! Grounded on the teacher's `Blackhole` action
//! (`droute/src/router/table/rule/actions/blackhole.rs`), generalized
//! from "always answer 0.0.0.0/::" to arbitrary configured records.

use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use domain::base::{
    iana::{Class, Rcode, Rtype},
    rdata::rfc1035::A,
    Dname, MessageBuilder,
};
use std::net::{Ipv4Addr, Ipv6Addr};

/// A record template to answer with, independent of what was asked
/// (the owner name in the answer always mirrors the query).
#[derive(Debug, Clone)]
pub enum StaticRecord {
    /// Answer A queries with this address.
    A(Ipv4Addr),
    /// Answer AAAA queries with this address.
    Aaaa(Ipv6Addr),
    /// Answer CNAME queries by pointing at this target.
    Cname(String),
    /// Answer TXT queries with this text.
    Txt(String),
}

/// Blackhole rdata and TTL shared by every `StaticResponder` unless a
/// config overrides it, the way the teacher's `Blackhole` action
/// reaches for a shared `SOA_RDATA` constant.
pub static DEFAULT_TTL: u32 = 300;

/// Answers every query with a fixed set of records regardless of type,
/// name, or class — the "respond the same way no matter what" building
/// block (e.g. for a catch-all NXDOMAIN or a fixed blackhole address).
pub struct StaticResponder {
    records: Vec<StaticRecord>,
    rcode: Rcode,
    ttl: u32,
}

impl StaticResponder {
    /// Build a static responder answering with `records` at `rcode`.
    pub fn new(records: Vec<StaticRecord>, rcode: Rcode, ttl: u32) -> Self {
        Self { records, rcode, ttl }
    }

    /// A responder that always answers NXDOMAIN with no records, the
    /// degenerate form used as a router's catch-all default.
    pub fn nxdomain() -> Self {
        Self {
            records: Vec::new(),
            rcode: Rcode::NXDomain,
            ttl: DEFAULT_TTL,
        }
    }

    /// A responder that answers every A/AAAA query with the
    /// unspecified address, the classic DNS sinkhole/blackhole.
    pub fn blackhole() -> Self {
        Self {
            records: vec![StaticRecord::A(Ipv4Addr::UNSPECIFIED), StaticRecord::Aaaa(Ipv6Addr::UNSPECIFIED)],
            rcode: Rcode::NoError,
            ttl: DEFAULT_TTL,
        }
    }
}

#[async_trait]
impl Resolver for StaticResponder {
    async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<crate::Response> {
        let question = query
            .first_question()
            .ok_or_else(|| crate::RdnsError::MalformedMessage("no question".into()))?;
        let owner = question.qname().to_bytes();
        let qtype = question.qtype();

        let mut builder = MessageBuilder::from_target(bytes::BytesMut::with_capacity(512))?;
        let answer = builder.start_answer(&query, self.rcode)?;
        let mut builder = answer.answer();
        for record in &self.records {
            match (record, qtype) {
                (StaticRecord::A(addr), Rtype::A) => {
                    builder.push((owner.clone(), Class::In, self.ttl, A::from_octets((*addr).into())))?;
                }
                (StaticRecord::Aaaa(addr), Rtype::Aaaa) => {
                    builder.push((
                        owner.clone(),
                        Class::In,
                        self.ttl,
                        domain::base::rdata::rfc3596::Aaaa::from_octets((*addr).into()),
                    ))?;
                }
                (StaticRecord::Cname(target), Rtype::Cname) => {
                    let target = Dname::<bytes::Bytes>::from_chars(target.chars())
                        .map_err(|e| crate::RdnsError::MalformedMessage(e.to_string()))?;
                    builder.push((
                        owner.clone(),
                        Class::In,
                        self.ttl,
                        domain::base::rdata::rfc1035::Cname::new(target),
                    ))?;
                }
                (StaticRecord::Txt(text), Rtype::Txt) => {
                    let txt = domain::base::charstr::Txt::build_from_slice(text.as_bytes())
                        .map_err(|e| crate::RdnsError::MalformedMessage(e.to_string()))?;
                    builder.push((owner.clone(), Class::In, self.ttl, txt))?;
                }
                _ => continue,
            }
        }
        Ok(builder.into_message())
    }
}

/// Like [`StaticResponder`], but the owner name template and record
/// targets may reference `{name}` from the incoming query, so one
/// configured node can answer an entire domain-suffix pattern (e.g.
/// every `*.lan` A query answers with the querying interface address).
pub struct StaticTemplate {
    record: StaticRecord,
    rcode: Rcode,
    ttl: u32,
}

impl StaticTemplate {
    /// Build a static-template responder.
    pub fn new(record: StaticRecord, rcode: Rcode, ttl: u32) -> Self {
        Self { record, rcode, ttl }
    }
}

#[async_trait]
impl Resolver for StaticTemplate {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let question = query
            .first_question()
            .ok_or_else(|| crate::RdnsError::MalformedMessage("no question".into()))?;
        let owner = question.qname().to_bytes();

        let mut builder = MessageBuilder::from_target(bytes::BytesMut::with_capacity(512))?;
        let answer = builder.start_answer(&query, self.rcode)?;
        let mut builder = answer.answer();
        match &self.record {
            StaticRecord::Cname(template) => {
                let rendered = template.replace("{name}", &question.qname().to_string());
                let target = Dname::<bytes::Bytes>::from_chars(rendered.chars())
                    .map_err(|e| crate::RdnsError::MalformedMessage(e.to_string()))?;
                builder.push((owner, Class::In, self.ttl, domain::base::rdata::rfc1035::Cname::new(target)))?;
            }
            StaticRecord::Txt(template) => {
                let rendered = template
                    .replace("{name}", &question.qname().to_string())
                    .replace("{client}", &client.src.map(|a| a.to_string()).unwrap_or_default());
                let txt = domain::base::charstr::Txt::build_from_slice(rendered.as_bytes())
                    .map_err(|e| crate::RdnsError::MalformedMessage(e.to_string()))?;
                builder.push((owner, Class::In, self.ttl, txt))?;
            }
            StaticRecord::A(addr) => {
                builder.push((owner, Class::In, self.ttl, A::from_octets((*addr).into())))?;
            }
            StaticRecord::Aaaa(addr) => {
                builder.push((
                    owner,
                    Class::In,
                    self.ttl,
                    domain::base::rdata::rfc3596::Aaaa::from_octets((*addr).into()),
                ))?;
            }
        }
        Ok(builder.into_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Label;

    fn a_query() -> Query {
        let mut builder = MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.header_mut().set_rd(true);
        let mut builder = builder.question();
        builder
            .push((
                Dname::<bytes::Bytes>::from_chars("blocked.example.com.".chars()).unwrap(),
                Rtype::A,
                Class::In,
            ))
            .unwrap();
        builder.into_message()
    }

    #[tokio::test]
    async fn blackhole_answers_with_unspecified_address() {
        let responder = StaticResponder::blackhole();
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = responder.resolve(a_query(), &client).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NoError);
        assert_eq!(resp.answer().unwrap().count(), 1);
    }

    #[tokio::test]
    async fn nxdomain_responder_has_no_answers() {
        let responder = StaticResponder::nxdomain();
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = responder.resolve(a_query(), &client).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NXDomain);
        assert_eq!(resp.answer().unwrap().count(), 0);
    }
}

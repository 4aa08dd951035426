//! `blocklist` and `blocklist-v2`: reject or redirect queries whose
//! name matches a rule before ever going downstream.

use super::{rules::MultiDb, BlockAction, EdeTemplate};
use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use domain::base::{iana::Rcode, MessageBuilder};
use std::sync::Arc;

/// Disposes of a blocked query: `block_resolver`, when configured,
/// always wins over the static `action` so a block can hand off to a
/// sinkhole/honeypot resolver instead of answering with a fixed RCODE.
async fn disposed_response(
    query: &Query,
    client: &ClientInfo,
    action: BlockAction,
    block_resolver: Option<&Arc<dyn Resolver>>,
) -> Option<Result<crate::Response>> {
    if let Some(resolver) = block_resolver {
        return Some(resolver.resolve(query.clone(), client).await);
    }
    match action {
        BlockAction::Refuse => Some(
            crate::resolver::start_answer(query, Rcode::Refused).map_err(Into::into),
        ),
        BlockAction::NxDomain => Some(
            crate::resolver::start_answer(query, Rcode::NXDomain).map_err(Into::into),
        ),
        BlockAction::Drop => None,
    }
}

fn with_ede(resp: crate::Response, template: &EdeTemplate, rule: &crate::Label) -> Result<crate::Response> {
    let mut builder = MessageBuilder::from_target(bytes::BytesMut::with_capacity(
        resp.as_slice().len() + 64,
    ))?;
    *builder.header_mut() = resp.header();
    let mut builder = builder.question();
    for q in resp.question().flatten() {
        builder.push(q)?;
    }
    let mut builder = builder.answer().authority().additional();
    let mut opt = builder.opt()?;
    template.attach(&mut opt, rule).ok();
    Ok(opt.finish().into_message())
}

/// `blocklist`: the original single-rule-engine query-name blocklist.
/// One [`super::RuleEngine`], one disposition, optional EDE annotation.
pub struct Blocklist {
    db: MultiDb,
    action: BlockAction,
    ede: Option<EdeTemplate>,
    block_resolver: Option<Arc<dyn Resolver>>,
}

impl Blocklist {
    /// Build a blocklist from a single rule engine. `block_resolver`,
    /// when set, is dispatched to on a block instead of answering with
    /// `action` directly.
    pub fn new(
        engine: super::RuleEngine,
        action: BlockAction,
        ede: Option<EdeTemplate>,
        block_resolver: Option<Arc<dyn Resolver>>,
    ) -> Self {
        Self {
            db: MultiDb::new(vec![engine]),
            action,
            ede,
            block_resolver,
        }
    }
}

#[async_trait]
impl Resolver for Blocklist {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let name = match query.first_question() {
            Some(q) => q.qname().to_string(),
            None => return Err(crate::RdnsError::MalformedMessage("no question".into())),
        };
        if let Some(rule) = self.db.match_name(&name) {
            if let Some(result) =
                disposed_response(&query, client, self.action, self.block_resolver.as_ref()).await
            {
                let resp = result?;
                return match &self.ede {
                    Some(t) => with_ede(resp, t, &rule),
                    None => Ok(resp),
                };
            }
            return Err(crate::RdnsError::PolicyRejected(format!(
                "query for `{name}` dropped by rule `{rule}`"
            )));
        }
        Err(crate::RdnsError::PolicyRejected(
            "blocklist used without a downstream fallback; wrap it in a router or group".into(),
        ))
    }
}

/// `blocklist-v2`: multi-engine aggregation (domain + regex + hosts +
/// CIDR in one node), an optional allowlist carve-out, and a mandatory
/// downstream resolver for names that don't match — unlike
/// [`Blocklist`], which expects to sit behind a router that only
/// routes blocked-candidate names to it.
pub struct BlocklistV2 {
    db: MultiDb,
    allowlist: Option<MultiDb>,
    action: BlockAction,
    ede: Option<EdeTemplate>,
    block_resolver: Option<Arc<dyn Resolver>>,
    allow_resolver: Option<Arc<dyn Resolver>>,
    downstream: Arc<dyn Resolver>,
}

impl BlocklistV2 {
    /// Build a v2 blocklist wrapping `downstream` for non-matching
    /// queries. `block_resolver` overrides `action` on a block;
    /// `allow_resolver` overrides `downstream` on an allowlist hit.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engines: Vec<super::RuleEngine>,
        allowlist: Option<Vec<super::RuleEngine>>,
        action: BlockAction,
        ede: Option<EdeTemplate>,
        block_resolver: Option<Arc<dyn Resolver>>,
        allow_resolver: Option<Arc<dyn Resolver>>,
        downstream: Arc<dyn Resolver>,
    ) -> Self {
        Self {
            db: MultiDb::new(engines),
            allowlist: allowlist.map(MultiDb::new),
            action,
            ede,
            block_resolver,
            allow_resolver,
            downstream,
        }
    }

    /// Hot-reload the blocklist's rule engines in place.
    pub fn reload(&self, engines: Vec<super::RuleEngine>) {
        self.db.reload(engines);
    }
}

#[async_trait]
impl Resolver for BlocklistV2 {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let name = match query.first_question() {
            Some(q) => q.qname().to_string(),
            None => return self.downstream.resolve(query, client).await,
        };

        if let Some(allow) = &self.allowlist {
            if allow.match_name(&name).is_some() {
                return match &self.allow_resolver {
                    Some(resolver) => resolver.resolve(query, client).await,
                    None => self.downstream.resolve(query, client).await,
                };
            }
        }

        match self.db.match_name(&name) {
            Some(rule) => match disposed_response(
                &query,
                client,
                self.action,
                self.block_resolver.as_ref(),
            )
            .await
            {
                Some(result) => {
                    let resp = result?;
                    match &self.ede {
                        Some(t) => with_ede(resp, t, &rule),
                        None => Ok(resp),
                    }
                }
                None => Err(crate::RdnsError::PolicyRejected(format!(
                    "query for `{name}` dropped by rule `{rule}`"
                ))),
            },
            None => self.downstream.resolve(query, client).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolver::Response, Label};
    use domain::base::iana::Rtype;

    struct Echo;

    #[async_trait]
    impl Resolver for Echo {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            crate::resolver::start_answer(&query, Rcode::NoError)
        }
    }

    fn query_for(name: &str) -> Query {
        let mut builder = MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.header_mut().set_rd(true);
        let mut builder = builder.question();
        builder
            .push((
                domain::base::Dname::<bytes::Bytes>::from_chars(format!("{name}.").chars()).unwrap(),
                Rtype::A,
                domain::base::iana::Class::In,
            ))
            .unwrap();
        builder.into_message()
    }

    #[tokio::test]
    async fn v2_allowlist_overrides_blocklist_match() {
        let v2 = BlocklistV2::new(
            vec![super::super::RuleEngine::domain_from_str(
                Label::from("ads"),
                "ads.example.com\n",
            )],
            Some(vec![super::super::RuleEngine::domain_from_str(
                Label::from("allow"),
                "ads.example.com\n",
            )]),
            BlockAction::NxDomain,
            None,
            None,
            None,
            Arc::new(Echo),
        );
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = v2
            .resolve(query_for("ads.example.com"), &client)
            .await
            .unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NoError);
    }

    #[tokio::test]
    async fn v2_blocks_matching_name_with_configured_rcode() {
        let v2 = BlocklistV2::new(
            vec![super::super::RuleEngine::domain_from_str(
                Label::from("ads"),
                "ads.example.com\n",
            )],
            None,
            BlockAction::NxDomain,
            None,
            None,
            None,
            Arc::new(Echo),
        );
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = v2
            .resolve(query_for("ads.example.com"), &client)
            .await
            .unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NXDomain);
    }
}

//! `replace`: rewrite the query name via a regex substitution before
//! forwarding downstream, then rewrite the answer's owner names back
//! for the client.

use crate::{resolver::Query, ClientInfo, Resolver, Result};
use async_trait::async_trait;
use domain::base::{rdata::AllRecordData, Dname, MessageBuilder};
use std::sync::Arc;

/// One `(pattern, replacement)` rewrite rule, applied in order; the
/// first pattern to match wins.
pub struct ReplaceRule {
    pattern: regex::Regex,
    replacement: String,
}

impl ReplaceRule {
    /// Build a rewrite rule from a compiled pattern and replacement template.
    pub fn new(pattern: regex::Regex, replacement: impl Into<String>) -> Self {
        Self {
            pattern,
            replacement: replacement.into(),
        }
    }
}

/// Rewrites the query name on the way down and every matching owner
/// name in the answer on the way back up, so the downstream resolver
/// and the client never see the same name.
pub struct Replace {
    rules: Vec<ReplaceRule>,
    downstream: Arc<dyn Resolver>,
}

impl Replace {
    /// Build a replace modifier wrapping `downstream`.
    pub fn new(rules: Vec<ReplaceRule>, downstream: Arc<dyn Resolver>) -> Self {
        Self { rules, downstream }
    }

    fn rewrite(&self, name: &str) -> Option<String> {
        self.rules.iter().find_map(|rule| {
            if rule.pattern.is_match(name) {
                Some(rule.pattern.replace(name, rule.replacement.as_str()).into_owned())
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl Resolver for Replace {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let original_name = query
            .first_question()
            .map(|q| q.qname().to_string())
            .unwrap_or_default();

        let Some(rewritten) = self.rewrite(&original_name) else {
            return self.downstream.resolve(query, client).await;
        };

        let question = query.first_question().ok_or_else(|| {
            crate::RdnsError::MalformedMessage("no question".into())
        })?;
        let new_name: Dname<bytes::Bytes> = Dname::from_chars(rewritten.chars())
            .map_err(|e| crate::RdnsError::MalformedMessage(e.to_string()))?;

        let mut builder = MessageBuilder::from_target(bytes::BytesMut::with_capacity(512))?;
        *builder.header_mut() = query.header();
        let mut builder = builder.question();
        builder.push((new_name, question.qtype(), question.qclass()))?;
        let rewritten_query = builder.into_message();

        let resp = self.downstream.resolve(rewritten_query, client).await?;

        // Rebuild the response with the question (and any owner names
        // equal to the rewritten name) restored to what the client
        // originally asked for.
        let mut builder = MessageBuilder::from_target(bytes::BytesMut::with_capacity(
            resp.as_slice().len() + 32,
        ))?;
        *builder.header_mut() = resp.header();
        let original: Dname<bytes::Bytes> = Dname::from_chars(original_name.chars())
            .map_err(|e| crate::RdnsError::MalformedMessage(e.to_string()))?;
        let mut builder = builder.question();
        builder.push((original.clone(), question.qtype(), question.qclass()))?;
        let mut builder = builder.answer();
        for rr in resp.answer().into_iter().flatten().flatten() {
            if rr.owner().to_string() == rewritten {
                if let Some(parsed) = rr.to_any_record::<AllRecordData<_, _>>().ok().flatten() {
                    builder.push((
                        original.clone(),
                        parsed.class(),
                        parsed.ttl(),
                        parsed.data().clone(),
                    ))?;
                    continue;
                }
            }
            builder.push(rr)?;
        }
        Ok(builder.into_message())
    }
}

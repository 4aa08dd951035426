use super::Children;
use crate::{resolver::Query, ClientInfo, Label, RdnsError, Resolver, Result};
use async_trait::async_trait;
use domain::base::iana::Rcode;
use futures::stream::{FuturesUnordered, StreamExt};

/// Queries every child concurrently and returns whichever answers
/// first. Other in-flight queries are dropped once a winner is picked.
/// When `servfail_error` is set, a SERVFAIL answer does not win the
/// race; the group keeps waiting for another child instead.
pub struct Fastest {
    label: Label,
    children: Children,
    servfail_error: bool,
}

impl Fastest {
    /// Build a fastest-wins racing group.
    pub fn new(label: Label, children: Children, servfail_error: bool) -> Self {
        Self {
            label,
            children,
            servfail_error,
        }
    }
}

#[async_trait]
impl Resolver for Fastest {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let mut futs: FuturesUnordered<_> = self
            .children
            .iter()
            .map(|(label, child)| {
                let query = query.clone();
                let label = label.clone();
                async move { (label, child.resolve(query, client).await) }
            })
            .collect();

        let mut last_err = None;
        while let Some((label, result)) = futs.next().await {
            match result {
                Ok(resp) if !(self.servfail_error && resp.header().rcode() == Rcode::ServFail) => {
                    return Ok(resp);
                }
                Ok(_) => last_err = Some(RdnsError::ServfailFailover(label)),
                Err(e) => last_err = Some(e),
            }
        }
        Err(RdnsError::AllChildrenFailed(
            self.children.len(),
            self.label.clone(),
            Box::new(last_err.unwrap_or(RdnsError::MalformedMessage("empty group".into()))),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Response;
    use std::sync::Arc;

    struct Fixed(Rcode);

    #[async_trait]
    impl Resolver for Fixed {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            crate::resolver::start_answer(&query, self.0)
        }
    }

    fn a_query() -> Query {
        let builder = domain::base::MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.question().into_message()
    }

    #[tokio::test]
    async fn servfail_error_skips_a_servfail_winner() {
        let children: Children = vec![
            (Label::from("a"), Arc::new(Fixed(Rcode::ServFail))),
            (Label::from("b"), Arc::new(Fixed(Rcode::NoError))),
        ];
        let group = Fastest::new(Label::from("fastest"), children, true);
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = group.resolve(a_query(), &client).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NoError);
    }
}

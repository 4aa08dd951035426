use super::{try_in_order, Children};
use crate::{resolver::Query, ClientInfo, Label, Resolver, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Always tries children in priority order starting from index 0,
/// except that a failure advances a "current primary" pointer so the
/// next query starts from the child after the one that just failed.
/// Unlike [`super::FailBack`], the pointer never returns to 0 on its
/// own.
pub struct FailRotate {
    label: Label,
    children: Children,
    current: AtomicUsize,
    servfail_error: bool,
}

impl FailRotate {
    /// Build a fail-rotate group. When `servfail_error` is set, a
    /// child's SERVFAIL answer is treated as a failure that advances
    /// the pointer instead of being returned verbatim.
    pub fn new(label: Label, children: Children, servfail_error: bool) -> Self {
        Self {
            label,
            children,
            current: AtomicUsize::new(0),
            servfail_error,
        }
    }
}

#[async_trait]
impl Resolver for FailRotate {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let n = self.children.len();
        let start = self.current.load(Ordering::Relaxed) % n.max(1);
        let (_, primary) = &self.children[start];
        let result = primary.resolve(query.clone(), client).await;
        if super::is_failure(&result, self.servfail_error) {
            self.current.store((start + 1) % n.max(1), Ordering::Relaxed);
            try_in_order(&self.label, &self.children, start + 1, &query, client, self.servfail_error).await
        } else {
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Response;
    use domain::base::iana::Rcode;
    use std::sync::Arc;

    struct Fails;
    struct Succeeds;
    struct Servfails;

    #[async_trait]
    impl Resolver for Fails {
        async fn resolve(&self, _query: Query, _client: &ClientInfo) -> Result<Response> {
            Err(crate::RdnsError::MalformedMessage("down".into()))
        }
    }

    #[async_trait]
    impl Resolver for Succeeds {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            crate::resolver::start_answer(&query, Rcode::NoError)
        }
    }

    #[async_trait]
    impl Resolver for Servfails {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            crate::resolver::start_answer(&query, Rcode::ServFail)
        }
    }

    fn a_query() -> Query {
        let builder = domain::base::MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.question().into_message()
    }

    #[tokio::test]
    async fn rotates_past_failed_primary_and_stays_rotated() {
        let children: Children = vec![
            (Label::from("a"), Arc::new(Fails)),
            (Label::from("b"), Arc::new(Succeeds)),
        ];
        let group = FailRotate::new(Label::from("fr"), children, false);
        let client = ClientInfo::new(None, Label::from("t"));
        group.resolve(a_query(), &client).await.unwrap();
        assert_eq!(group.current.load(Ordering::Relaxed), 1);
        // Second call now starts at "b" directly and succeeds without
        // ever touching "a" again.
        group.resolve(a_query(), &client).await.unwrap();
        assert_eq!(group.current.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn servfail_error_treats_servfail_as_a_failure() {
        let children: Children = vec![
            (Label::from("a"), Arc::new(Servfails)),
            (Label::from("b"), Arc::new(Succeeds)),
        ];
        let group = FailRotate::new(Label::from("fr"), children, true);
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = group.resolve(a_query(), &client).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NoError);
        assert_eq!(group.current.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn without_servfail_error_a_servfail_answer_is_returned_verbatim() {
        let children: Children = vec![
            (Label::from("a"), Arc::new(Servfails)),
            (Label::from("b"), Arc::new(Succeeds)),
        ];
        let group = FailRotate::new(Label::from("fr"), children, false);
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = group.resolve(a_query(), &client).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::ServFail);
        assert_eq!(group.current.load(Ordering::Relaxed), 0);
    }
}

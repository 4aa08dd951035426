use super::{try_in_order, Children};
use crate::{resolver::Query, ClientInfo, Label, Resolver, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cycles through children in order, advancing one position per call
/// regardless of success or failure, wrapping on failure to try every
/// other child once before giving up.
pub struct RoundRobin {
    label: Label,
    children: Children,
    cursor: AtomicUsize,
    servfail_error: bool,
}

impl RoundRobin {
    /// Build a round-robin group labeled `label` over `children`. When
    /// `servfail_error` is set, a child's SERVFAIL answer is treated as
    /// a failure that triggers failover to the next child instead of
    /// being returned verbatim.
    pub fn new(label: Label, children: Children, servfail_error: bool) -> Self {
        Self {
            label,
            children,
            cursor: AtomicUsize::new(0),
            servfail_error,
        }
    }
}

#[async_trait]
impl Resolver for RoundRobin {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let n = self.children.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % n.max(1);
        try_in_order(&self.label, &self.children, start, &query, client, self.servfail_error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Response;
    use domain::base::iana::Rcode;
    use std::sync::{Arc, Mutex};

    struct TaggedEcho(&'static str, Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Resolver for TaggedEcho {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            self.1.lock().unwrap().push(self.0);
            crate::resolver::start_answer(&query, Rcode::NoError)
        }
    }

    fn a_query() -> Query {
        let builder = domain::base::MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.question().into_message()
    }

    #[tokio::test]
    async fn distributes_across_children_in_order() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let children: Children = vec![
            (Label::from("a"), Arc::new(TaggedEcho("a", hits.clone()))),
            (Label::from("b"), Arc::new(TaggedEcho("b", hits.clone()))),
            (Label::from("c"), Arc::new(TaggedEcho("c", hits.clone()))),
        ];
        let rr = RoundRobin::new(Label::from("rr"), children, false);
        let client = ClientInfo::new(None, Label::from("t"));
        for _ in 0..6 {
            rr.resolve(a_query(), &client).await.unwrap();
        }
        assert_eq!(*hits.lock().unwrap(), vec!["a", "b", "c", "a", "b", "c"]);
    }
}

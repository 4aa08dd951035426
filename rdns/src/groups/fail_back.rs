use super::{try_in_order, Children};
use crate::{resolver::Query, ClientInfo, Label, Resolver, Result};
use async_trait::async_trait;
use std::{
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    time::{Duration, Instant},
};

/// Like [`super::FailRotate`], but the pointer automatically returns to
/// the highest-priority child after `reset_after` has elapsed since the
/// last failover, giving the primary a chance to recover.
pub struct FailBack {
    label: Label,
    children: Children,
    current: AtomicUsize,
    failed_over_at: AtomicU64,
    reset_after: Duration,
    epoch: Instant,
    servfail_error: bool,
}

impl FailBack {
    /// Build a fail-back group that returns to the primary after
    /// `reset_after` of being failed over. When `servfail_error` is
    /// set, a child's SERVFAIL answer is treated as a failure that
    /// triggers failover instead of being returned verbatim.
    pub fn new(label: Label, children: Children, reset_after: Duration, servfail_error: bool) -> Self {
        Self {
            label,
            children,
            current: AtomicUsize::new(0),
            failed_over_at: AtomicU64::new(0),
            reset_after,
            epoch: Instant::now(),
            servfail_error,
        }
    }

    fn maybe_reset(&self) {
        if self.current.load(Ordering::Relaxed) == 0 {
            return;
        }
        let since = self.failed_over_at.load(Ordering::Relaxed);
        if since == 0 {
            return;
        }
        let elapsed = self.epoch.elapsed().as_millis() as u64 - since;
        if elapsed >= self.reset_after.as_millis() as u64 {
            self.current.store(0, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl Resolver for FailBack {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        self.maybe_reset();
        let n = self.children.len();
        let start = self.current.load(Ordering::Relaxed) % n.max(1);
        let (_, primary) = &self.children[start];
        let result = primary.resolve(query.clone(), client).await;
        if super::is_failure(&result, self.servfail_error) {
            let next = (start + 1) % n.max(1);
            self.current.store(next, Ordering::Relaxed);
            self.failed_over_at
                .store(self.epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
            try_in_order(&self.label, &self.children, next, &query, client, self.servfail_error).await
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
    use std::sync::atomic::AtomicBool;

    struct FlakyThenFine(AtomicBool);

    #[async_trait]
    impl Resolver for FlakyThenFine {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            if self.0.load(Ordering::Relaxed) {
                crate::resolver::start_answer(&query, Rcode::NoError)
            } else {
                Err(crate::RdnsError::MalformedMessage("down".into()))
            }
        }
    }

    struct Succeeds;

    #[async_trait]
    impl Resolver for Succeeds {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            crate::resolver::start_answer(&query, Rcode::NoError)
        }
    }

    fn a_query() -> Query {
        let builder = domain::base::MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.question().into_message()
    }

    #[tokio::test]
    async fn failover_reverts_to_primary_after_reset_after() {
        let primary = Arc::new(FlakyThenFine(AtomicBool::new(false)));
        let children: Children = vec![
            (Label::from("a"), primary.clone()),
            (Label::from("b"), Arc::new(Succeeds)),
        ];
        let group = FailBack::new(Label::from("fb"), children, Duration::from_millis(20), false);
        let client = ClientInfo::new(None, Label::from("t"));

        group.resolve(a_query(), &client).await.unwrap();
        assert_eq!(group.current.load(Ordering::Relaxed), 1);

        // Not enough time has passed: stays on "b".
        group.resolve(a_query(), &client).await.unwrap();
        assert_eq!(group.current.load(Ordering::Relaxed), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        primary.0.store(true, Ordering::Relaxed);
        group.resolve(a_query(), &client).await.unwrap();
        assert_eq!(group.current.load(Ordering::Relaxed), 0);
    }
}

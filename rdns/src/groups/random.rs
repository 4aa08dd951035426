use super::{is_failure, Children};
use crate::{resolver::Query, ClientInfo, Label, RdnsError, Resolver, Result};
use async_trait::async_trait;
use rand::Rng;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Picks a uniformly random child among those not currently
/// temporarily disabled. A child that fails (honoring `servfail_error`
/// the same way the other groups do) is disabled until `reset_after`
/// has elapsed, then the group picks again among the survivors until
/// one succeeds or every child has been tried.
pub struct Random {
    label: Label,
    children: Children,
    disabled_until: Vec<AtomicU64>,
    reset_after: Duration,
    epoch: Instant,
    servfail_error: bool,
}

impl Random {
    /// Build a random-selection group. `reset_after` bounds how long a
    /// failing child stays out of the candidate pool.
    pub fn new(label: Label, children: Children, reset_after: Duration, servfail_error: bool) -> Self {
        let disabled_until = children.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            label,
            children,
            disabled_until,
            reset_after,
            epoch: Instant::now(),
            servfail_error,
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn is_disabled(&self, idx: usize, now: u64) -> bool {
        self.disabled_until[idx].load(Ordering::Relaxed) > now
    }

    fn disable(&self, idx: usize) {
        let until = self.now_ms() + self.reset_after.as_millis() as u64;
        self.disabled_until[idx].store(until, Ordering::Relaxed);
    }

    /// Indices not currently disabled, or every index if all are
    /// disabled (so the group keeps trying rather than failing
    /// outright while children recover).
    fn available(&self, now: u64) -> Vec<usize> {
        let candidates: Vec<usize> = (0..self.children.len())
            .filter(|&i| !self.is_disabled(i, now))
            .collect();
        if candidates.is_empty() {
            (0..self.children.len()).collect()
        } else {
            candidates
        }
    }
}

#[async_trait]
impl Resolver for Random {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let n = self.children.len();
        if n == 0 {
            return Err(RdnsError::AllChildrenFailed(
                0,
                self.label.clone(),
                Box::new(RdnsError::MalformedMessage("empty group".into())),
            ));
        }

        let mut tried = std::collections::HashSet::new();
        let mut last_err = None;
        loop {
            let now = self.now_ms();
            let candidates: Vec<usize> = self
                .available(now)
                .into_iter()
                .filter(|i| !tried.contains(i))
                .collect();
            if candidates.is_empty() {
                break;
            }
            let idx = candidates[rand::thread_rng().gen_range(0..candidates.len())];
            tried.insert(idx);
            let (child_label, child) = &self.children[idx];
            let result = child.resolve(query.clone(), client).await;
            if is_failure(&result, self.servfail_error) {
                self.disable(idx);
                last_err = Some(match result {
                    Err(e) => e,
                    Ok(_) => RdnsError::ServfailFailover(child_label.clone()),
                });
                if tried.len() >= n {
                    break;
                }
                continue;
            }
            return result;
        }
        Err(RdnsError::AllChildrenFailed(
            n,
            self.label.clone(),
            Box::new(last_err.unwrap_or(RdnsError::MalformedMessage("empty group".into()))),
        ))
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

    fn a_query() -> Query {
        let builder = domain::base::MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.question().into_message()
    }

    #[tokio::test]
    async fn failing_child_is_skipped_until_reset_after_elapses() {
        let children: Children = vec![
            (Label::from("a"), Arc::new(Fails)),
            (Label::from("b"), Arc::new(Succeeds)),
        ];
        let group = Random::new(
            Label::from("rand"),
            children,
            Duration::from_secs(60),
            false,
        );
        let client = ClientInfo::new(None, Label::from("t"));
        for _ in 0..10 {
            let resp = group.resolve(a_query(), &client).await.unwrap();
            assert_eq!(resp.header().rcode(), Rcode::NoError);
        }
    }

    #[tokio::test]
    async fn all_children_failing_surfaces_an_error() {
        let children: Children = vec![
            (Label::from("a"), Arc::new(Fails)),
            (Label::from("b"), Arc::new(Fails)),
        ];
        let group = Random::new(
            Label::from("rand"),
            children,
            Duration::from_secs(60),
            false,
        );
        let client = ClientInfo::new(None, Label::from("t"));
        assert!(group.resolve(a_query(), &client).await.is_err());
    }
}

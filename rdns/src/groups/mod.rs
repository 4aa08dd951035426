//! Selection and failover groups: `Resolver` nodes whose children are
//! other resolvers, chosen by round-robin, priority failover, random
//! sampling, latency racing, or truncate-and-retry-on-TCP.

mod fail_back;
mod fail_rotate;
mod fastest;
mod fastest_tcp;
mod random;
mod round_robin;
mod truncate_retry;

pub use fail_back::FailBack;
pub use fail_rotate::FailRotate;
pub use fastest::Fastest;
pub use fastest_tcp::FastestTcp;
pub use random::Random;
pub use round_robin::RoundRobin;
pub use truncate_retry::TruncateRetry;

use crate::{resolver::Query, ClientInfo, Label, RdnsError, Resolver, Result};
use domain::base::iana::Rcode;
use std::sync::Arc;

/// Shared child list every group operates over. Order matters for
/// `FailRotate`/`FailBack` (priority order) and is irrelevant for
/// `RoundRobin`/`Random`/`Fastest`/`FastestTcp`.
pub(crate) type Children = Vec<(Label, Arc<dyn Resolver>)>;

/// Whether a child's result should be treated as a failure for
/// failover purposes: always true for `Err`, and also true for an
/// `Ok` SERVFAIL answer when the group's `ServfailError` policy is
/// enabled.
pub(crate) fn is_failure(result: &Result<crate::Response>, servfail_error: bool) -> bool {
    match result {
        Err(_) => true,
        Ok(resp) => servfail_error && resp.header().rcode() == Rcode::ServFail,
    }
}

/// Try every child in `children` starting at `start`, wrapping around
/// once, returning the first success. "Success" honors `servfail_error`
/// the same way [`is_failure`] does. Used by `RoundRobin`, `FailRotate`,
/// and `FailBack`'s failure path. Returns `AllChildrenFailed` carrying
/// the last error if every child fails.
pub(crate) async fn try_in_order(
    group_label: &Label,
    children: &Children,
    start: usize,
    query: &Query,
    client: &ClientInfo,
    servfail_error: bool,
) -> Result<crate::Response> {
    let n = children.len();
    let mut last_err = None;
    for offset in 0..n {
        let (child_label, child) = &children[(start + offset) % n];
        let result = child.resolve(query.clone(), client).await;
        if is_failure(&result, servfail_error) {
            last_err = Some(match result {
                Err(e) => e,
                Ok(_) => RdnsError::ServfailFailover(child_label.clone()),
            });
            continue;
        }
        return result;
    }
    Err(RdnsError::AllChildrenFailed(
        n,
        group_label.clone(),
        Box::new(last_err.unwrap_or(RdnsError::MalformedMessage("empty group".into()))),
    ))
}

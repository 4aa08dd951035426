//! Declarative router: an ordered list of predicate-matched routes,
//! first match wins, falling through to a mandatory default.
//!
//! This intentionally simplifies the teacher's scripting-table router
//! (`rune`/`pest`-backed `Script`, see `droute/src/router/script`) down
//! to the specification's plain conjunctive-predicate `Route` list —
//! there is no embedded expression language here.

mod predicate;

pub use predicate::{Predicate, PredicateError, TimeWindow};

use crate::{resolver::Query, ClientInfo, Label, Resolver, Result};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while routing a query or validating the route table.
#[derive(Error, Debug)]
pub enum RouterError {
    /// No route matched and no default route is configured.
    #[error("no route matched and no default resolver is configured")]
    NoMatch,

    /// A predicate failed to evaluate (e.g. a GeoIP lookup error).
    #[error(transparent)]
    Predicate(#[from] PredicateError),

    /// Route table referenced a resolver label that doesn't exist.
    #[error("route `{0}` references unknown resolver `{1}`")]
    UnknownResolver(Label, Label),
}

/// One row of the route table: a conjunction of predicates and the
/// resolver to dispatch to when every predicate matches (or does not
/// match, if `invert` is set).
pub struct Route {
    /// Human-readable row identity, used in logs and error messages.
    pub label: Label,
    /// All predicates must match for this route to fire.
    pub predicates: Vec<Predicate>,
    /// When set, this route fires on the first *non*-match of the
    /// predicate conjunction instead of the first match.
    pub invert: bool,
    /// Resolver to dispatch to on match.
    pub target: Arc<dyn Resolver>,
}

/// Ordered, first-match-wins route table with a mandatory default.
pub struct Router {
    routes: Vec<Route>,
    default: Arc<dyn Resolver>,
}

impl Router {
    /// Build a router from an ordered route list and a default resolver.
    pub fn new(routes: Vec<Route>, default: Arc<dyn Resolver>) -> Self {
        Self { routes, default }
    }

    fn select(&self, query: &Query, client: &ClientInfo) -> std::result::Result<&Arc<dyn Resolver>, RouterError> {
        for route in &self.routes {
            let conjunction = route
                .predicates
                .iter()
                .map(|p| p.matches(query, client))
                .collect::<std::result::Result<Vec<bool>, PredicateError>>()?
                .into_iter()
                .all(|m| m);
            let fires = if route.invert { !conjunction } else { conjunction };
            if fires {
                return Ok(&route.target);
            }
        }
        Ok(&self.default)
    }
}

#[async_trait]
impl Resolver for Router {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let target = self.select(&query, client)?;
        target.resolve(query, client).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Response;
    use domain::base::iana::Rcode;

    struct Tagged(Rcode);

    #[async_trait]
    impl Resolver for Tagged {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            crate::resolver::start_answer(&query, self.0)
        }
    }

    fn query_for(name: &str) -> Query {
        let mut builder = domain::base::MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.header_mut().set_rd(true);
        let mut builder = builder.question();
        builder
            .push((
                domain::base::Dname::<bytes::Bytes>::from_chars(format!("{name}.").chars()).unwrap(),
                domain::base::iana::Rtype::A,
                domain::base::iana::Class::In,
            ))
            .unwrap();
        builder.into_message()
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let routes = vec![
            Route {
                label: Label::from("internal"),
                predicates: vec![Predicate::NamePattern(
                    regex::Regex::new(r"(?i)\.corp$").unwrap(),
                )],
                invert: false,
                target: Arc::new(Tagged(Rcode::NoError)),
            },
            Route {
                label: Label::from("catch-nxdomain"),
                predicates: vec![],
                invert: false,
                target: Arc::new(Tagged(Rcode::NXDomain)),
            },
        ];
        let router = Router::new(routes, Arc::new(Tagged(Rcode::ServFail)));
        let client = ClientInfo::new(None, Label::from("t"));

        let resp = router.resolve(query_for("host.corp"), &client).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NoError);

        let resp = router.resolve(query_for("example.com"), &client).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NXDomain);
    }

    #[tokio::test]
    async fn inverted_route_fires_on_non_match() {
        let routes = vec![Route {
            label: Label::from("not-corp"),
            predicates: vec![Predicate::NamePattern(regex::Regex::new(r"(?i)\.corp$").unwrap())],
            invert: true,
            target: Arc::new(Tagged(Rcode::NoError)),
        }];
        let router = Router::new(routes, Arc::new(Tagged(Rcode::ServFail)));
        let client = ClientInfo::new(None, Label::from("t"));

        let resp = router.resolve(query_for("example.com"), &client).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::NoError);

        let resp = router.resolve(query_for("host.corp"), &client).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::ServFail);
    }

    #[tokio::test]
    async fn falls_through_to_default_with_no_routes() {
        let router = Router::new(vec![], Arc::new(Tagged(Rcode::ServFail)));
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = router.resolve(query_for("anything.test"), &client).await.unwrap();
        assert_eq!(resp.header().rcode(), Rcode::ServFail);
    }
}

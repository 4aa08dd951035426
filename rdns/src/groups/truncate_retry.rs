use crate::{resolver::Query, ClientInfo, Label, Resolver, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Sends the query to a primary (typically UDP) child; if the answer
/// comes back with the `TC` bit set, retries once against a secondary
/// (typically TCP) child and returns that answer instead.
pub struct TruncateRetry {
    primary: Arc<dyn Resolver>,
    retry: Arc<dyn Resolver>,
    _label: Label,
}

impl TruncateRetry {
    /// Build a group retrying truncated answers from `primary` against `retry`.
    pub fn new(label: Label, primary: Arc<dyn Resolver>, retry: Arc<dyn Resolver>) -> Self {
        Self {
            primary,
            retry,
            _label: label,
        }
    }
}

#[async_trait]
impl Resolver for TruncateRetry {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let resp = self.primary.resolve(query.clone(), client).await?;
        if resp.header().tc() {
            self.retry.resolve(query, client).await
        } else {
            Ok(resp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Response;
    use domain::base::iana::Rcode;

    struct Truncated;
    struct Clean;

    #[async_trait]
    impl Resolver for Truncated {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            let mut msg = crate::resolver::start_answer(&query, Rcode::NoError)?;
            msg.header_mut().set_tc(true);
            Ok(msg)
        }
    }

    #[async_trait]
    impl Resolver for Clean {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            crate::resolver::start_answer(&query, Rcode::NoError)
        }
    }

    fn a_query() -> Query {
        let builder = domain::base::MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.question().into_message()
    }

    #[tokio::test]
    async fn retries_on_truncation() {
        let group = TruncateRetry::new(Label::from("tr"), Arc::new(Truncated), Arc::new(Clean));
        let client = ClientInfo::new(None, Label::from("t"));
        let resp = group.resolve(a_query(), &client).await.unwrap();
        assert!(!resp.header().tc());
    }
}

//! Single-flight request deduplication: concurrent identical misses
//! collapse into one downstream call, with every other caller awaiting
//! the same in-flight future.

use super::CacheKey;
use crate::{resolver::Query, ClientInfo, Label, Resolver, Result};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::broadcast;

enum Slot {
    InFlight(broadcast::Sender<Result<crate::Response>>),
}

/// Wraps a downstream resolver (typically a [`super::Cache`] miss path)
/// so that identical concurrent queries share one downstream call.
pub struct RequestDedup {
    downstream: Arc<dyn Resolver>,
    inflight: std::sync::Mutex<HashMap<CacheKey, Slot>>,
}

impl RequestDedup {
    /// Wrap `downstream` with single-flight deduplication.
    pub fn new(downstream: Arc<dyn Resolver>) -> Self {
        Self {
            downstream,
            inflight: std::sync::Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Resolver for RequestDedup {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let key = match CacheKey::from_query(&query) {
            Some(k) => k,
            None => return self.downstream.resolve(query, client).await,
        };

        let mut rx = {
            let mut guard = self.inflight.lock().unwrap();
            match guard.get(&key) {
                Some(Slot::InFlight(tx)) => Some(tx.subscribe()),
                None => {
                    let (tx, _rx) = broadcast::channel(1);
                    guard.insert(key.clone(), Slot::InFlight(tx));
                    None
                }
            }
        };

        if let Some(rx) = &mut rx {
            return match rx.recv().await {
                Ok(result) => result,
                Err(_) => self.downstream.resolve(query, client).await,
            };
        }

        let result = self.downstream.resolve(query, client).await;
        let slot = self.inflight.lock().unwrap().remove(&key);
        if let Some(Slot::InFlight(tx)) = slot {
            let broadcast_result = match &result {
                Ok(r) => Ok(r.clone()),
                Err(e) => Err(crate::RdnsError::MalformedMessage(e.to_string())),
            };
            let _ = tx.send(broadcast_result);
        }
        result
    }
}

impl crate::Validatable for RequestDedup {
    type Error = super::CacheError;
    fn validate(&self, _used: Option<&std::collections::HashSet<Label>>) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Response;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEcho(Arc<AtomicUsize>);

    #[async_trait]
    impl Resolver for CountingEcho {
        async fn resolve(&self, query: Query, _client: &ClientInfo) -> Result<Response> {
            self.0.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            crate::resolver::start_answer(&query, domain::base::iana::Rcode::NoError)
        }
    }

    fn a_query() -> Query {
        let mut builder =
            domain::base::MessageBuilder::from_target(bytes::BytesMut::new()).unwrap();
        builder.header_mut().set_rd(true);
        let mut builder = builder.question();
        builder
            .push((
                domain::base::Dname::<bytes::Bytes>::from_chars("example.com.".chars()).unwrap(),
                domain::base::iana::Rtype::A,
                domain::base::iana::Class::In,
            ))
            .unwrap();
        builder.into_message()
    }

    #[tokio::test]
    async fn concurrent_identical_queries_single_flight() {
        let count = Arc::new(AtomicUsize::new(0));
        let dedup = Arc::new(RequestDedup::new(Arc::new(CountingEcho(count.clone()))));
        let client = ClientInfo::new(None, Label::from("test"));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let dedup = dedup.clone();
            let client = client.clone();
            let query = a_query();
            handles.push(tokio::spawn(async move { dedup.resolve(query, &client).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

//! `syslog`: mirror every query/response pair to a syslog facility,
//! independent of the ordinary `log` crate output used for operator
//! diagnostics (see `SPEC_FULL.md` §4.11).

use crate::{resolver::Query, ClientInfo, ModifierError, Resolver, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use syslog::{Facility, Formatter3164};

/// Forwards a one-line summary of every query/response pair to syslog
/// before returning the downstream's answer unmodified.
pub struct SyslogModifier {
    writer: Mutex<syslog::Logger<syslog::LoggerBackend, Formatter3164>>,
    downstream: Arc<dyn Resolver>,
}

impl SyslogModifier {
    /// Build a syslog modifier wrapping `downstream`, logging under
    /// `process_name` at `facility`.
    pub fn new(process_name: impl Into<String>, facility: Facility, downstream: Arc<dyn Resolver>) -> std::result::Result<Self, ModifierError> {
        let formatter = Formatter3164 {
            facility,
            hostname: None,
            process: process_name.into(),
            pid: std::process::id() as i32,
        };
        let logger = syslog::unix(formatter).map_err(|e| ModifierError::Syslog(e.to_string()))?;
        Ok(Self {
            writer: Mutex::new(logger),
            downstream,
        })
    }
}

#[async_trait]
impl Resolver for SyslogModifier {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let name = query
            .first_question()
            .map(|q| q.qname().to_string())
            .unwrap_or_else(|| "<malformed>".into());
        let qtype = query
            .first_question()
            .map(|q| q.qtype().to_string())
            .unwrap_or_default();

        let result = self.downstream.resolve(query, client).await;

        let summary = match &result {
            Ok(resp) => format!(
                "query name={name} type={qtype} src={:?} rcode={}",
                client.src,
                resp.header().rcode()
            ),
            Err(e) => format!("query name={name} type={qtype} src={:?} error={e}", client.src),
        };
        if let Ok(mut logger) = self.writer.lock() {
            let _ = logger.info(summary);
        }
        result
    }
}

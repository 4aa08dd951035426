//! `dnssec-validate`: an opt-in pipeline step around
//! [`crate::dnssec::Validator`]. Not part of the default graph — a
//! configuration must explicitly wrap a downstream resolver in this
//! modifier to get DNSSEC validation at all.

use crate::{
    dnssec::{DnssecError, ValidationStatus, Validator},
    resolver::Query,
    ClientInfo, RdnsError, Resolver, Result,
};
use async_trait::async_trait;
use domain::base::MessageBuilder;
use log::warn;
use std::sync::Arc;

/// Wraps `downstream`, validating every response before returning it.
/// When `enforce` is `false`, a bogus signature is logged and the
/// response is returned unmodified (monitor-only mode); when `true`,
/// a bogus signature is turned into a `SERVFAIL`-shaped policy
/// rejection instead of ever reaching the client.
pub struct DnssecValidate {
    validator: Arc<Validator>,
    downstream: Arc<dyn Resolver>,
    enforce: bool,
}

impl DnssecValidate {
    /// Build a validating modifier wrapping `downstream`.
    pub fn new(validator: Arc<Validator>, downstream: Arc<dyn Resolver>, enforce: bool) -> Self {
        Self {
            validator,
            downstream,
            enforce,
        }
    }
}

#[async_trait]
impl Resolver for DnssecValidate {
    async fn resolve(&self, query: Query, client: &ClientInfo) -> Result<crate::Response> {
        let response = self.downstream.resolve(query, client).await?;

        match self.validator.validate(&response, client).await {
            Ok(ValidationStatus::Secure) => {
                let mut builder = MessageBuilder::from_target(bytes::BytesMut::with_capacity(
                    response.as_slice().len(),
                ))?;
                *builder.header_mut() = response.header();
                builder.header_mut().set_ad(true);
                let mut builder = builder.question();
                for q in response.question().flatten() {
                    builder.push(q)?;
                }
                let mut builder = builder.answer();
                for rr in response.answer().into_iter().flatten().flatten() {
                    builder.push(rr)?;
                }
                Ok(builder.into_message())
            }
            Ok(ValidationStatus::InsecureDelegation) => Ok(response),
            Err(e) => {
                warn!("dnssec validation failed: {e}");
                if self.enforce {
                    Err(RdnsError::PolicyRejected(format!("dnssec validation failed: {e}")))
                } else {
                    Ok(response)
                }
            }
        }
    }
}

impl From<DnssecError> for RdnsError {
    fn from(e: DnssecError) -> Self {
        RdnsError::PolicyRejected(e.to_string())
    }
}

//! Response/query modifiers: single-child wrapping resolvers that
//! transform the query on the way down or the answer on the way back
//! up, grounded on the teacher's `Action` trait
//! (`droute/src/router/table/rule/actions`).

mod collapse;
#[cfg(feature = "dnssec")]
mod dnssec_validate;
mod drop;
mod ecs;
mod edns0;
mod minimize;
mod ratelimit;
mod replace;
mod syslog_modifier;
mod ttl;

pub use collapse::ResponseCollapse;
#[cfg(feature = "dnssec")]
pub use dnssec_validate::DnssecValidate;
pub use drop::Drop;
pub use ecs::EcsModifier;
pub use edns0::Edns0Modifier;
pub use minimize::ResponseMinimize;
pub use ratelimit::RateLimiter;
pub use replace::Replace;
pub use syslog_modifier::SyslogModifier;
pub use ttl::TtlModifier;

use thiserror::Error;

/// Errors raised by a modifier.
#[derive(Error, Debug)]
pub enum ModifierError {
    /// A replace/edns0 rule's regex failed to compile.
    #[error("invalid modifier regex: {0}")]
    Regex(#[from] regex::Error),
    /// The syslog connection could not be established or write failed.
    #[error("syslog error: {0}")]
    Syslog(String),
}

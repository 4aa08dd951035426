//! The blocklist family: `blocklist`, `blocklist-v2`,
//! `response-blocklist-ip`, `response-blocklist-name`, and
//! `client-blocklist`. All five share one rule-engine vocabulary
//! (regex / domain-suffix / hosts-file / CIDR / GeoIP location) and one
//! EDE-templating mechanism, hot-reloadable via `arc-swap`.

mod client_blocklist;
mod ede;
mod query_blocklist;
mod response_blocklist;
mod rules;

pub use client_blocklist::ClientBlocklist;
pub use ede::EdeTemplate;
pub use query_blocklist::{Blocklist, BlocklistV2};
pub use response_blocklist::{ResponseBlocklistIp, ResponseBlocklistName};
pub use rules::{RuleEngine, RuleEngineError};

use thiserror::Error;

/// Errors raised loading or evaluating any blocklist node.
#[derive(Error, Debug)]
pub enum BlocklistError {
    /// A rule engine (regex compile, GeoIP open, hosts-file parse) failed.
    #[error(transparent)]
    RuleEngine(#[from] RuleEngineError),

    /// Reloading the backing rule database from disk failed; the
    /// previous generation remains live via the `arc-swap` handle.
    #[error("blocklist reload failed, keeping previous generation: {0}")]
    ReloadFailed(String),
}

/// How a blocked query or response is disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockAction {
    /// Answer with this RCODE (no records).
    Refuse,
    /// Answer NXDOMAIN.
    NxDomain,
    /// Drop the query with no response at all.
    Drop,
}

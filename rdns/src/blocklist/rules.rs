//! Rule engines a blocklist matches against: regex, domain-suffix trie,
//! hosts-file, CIDR, and GeoIP location. Each produces a matched rule's
//! [`crate::Label`] (its "rule name"), used for EDE templating.

use crate::Label;
use cidr_utils::cidr::IpCidr;
use dmatcher::LabeledDomain;
use std::net::IpAddr;
use thiserror::Error;

/// Rule-engine construction or lookup failure.
#[derive(Error, Debug)]
pub enum RuleEngineError {
    /// A regex pattern in a rule file failed to compile.
    #[error("invalid regex rule `{0}`: {1}")]
    Regex(String, regex::Error),
    /// The GeoIP database could not be opened.
    #[error("geoip database open failed: {0}")]
    GeoOpen(#[from] maxminddb::MaxMindDBError),
    /// A rule file could not be read.
    #[error("rule file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One matching engine, aggregated by `MultiDB` so a single blocklist
/// node can mix rule kinds.
pub enum RuleEngine {
    /// Domain-suffix trie (`dmatcher`), one entry per line.
    Domain(LabeledDomain<Label>),
    /// Anchored regex alternation tagged with per-pattern rule names.
    Regex(Vec<(regex::Regex, Label)>),
    /// `/etc/hosts`-style `ip domain` pairs; only the domain side is
    /// indexed (this is a query-name blocklist input format, not an IP
    /// allocator).
    Hosts(LabeledDomain<Label>),
    /// CIDR blocks, tagged with a rule name.
    Cidr(Vec<(IpCidr, Label)>),
    /// GeoIP country/ASN membership.
    Location {
        reader: maxminddb::Reader<Vec<u8>>,
        codes: Vec<(String, Label)>,
    },
}

impl RuleEngine {
    /// Build a domain-suffix engine from newline-separated domains.
    pub fn domain_from_str(rule_name: Label, text: &str) -> Self {
        let mut trie = LabeledDomain::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            trie.insert(line, rule_name.clone());
        }
        Self::Domain(trie)
    }

    /// Build a hosts-file engine, ignoring the IP column.
    pub fn hosts_from_str(rule_name: Label, text: &str) -> Self {
        let mut trie = LabeledDomain::new();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            for domain in line.split_whitespace().skip(1) {
                trie.insert(domain, rule_name.clone());
            }
        }
        Self::Hosts(trie)
    }

    /// Build a regex engine from a list of `(pattern, rule_name)` pairs.
    pub fn regex_from_patterns(patterns: Vec<(String, Label)>) -> Result<Self, RuleEngineError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for (pattern, name) in patterns {
            let re = regex::Regex::new(&pattern).map_err(|e| RuleEngineError::Regex(pattern, e))?;
            compiled.push((re, name));
        }
        Ok(Self::Regex(compiled))
    }

    /// Build a CIDR engine from `(cidr, rule_name)` pairs.
    pub fn cidr_from_pairs(pairs: Vec<(IpCidr, Label)>) -> Self {
        Self::Cidr(pairs)
    }

    /// Open a GeoIP database with country/ASN code matches.
    pub fn location_from_path(path: &std::path::Path, codes: Vec<(String, Label)>) -> Result<Self, RuleEngineError> {
        let reader = maxminddb::Reader::open_readfile(path)?;
        Ok(Self::Location { reader, codes })
    }

    /// Test a domain name against this engine, returning the matched
    /// rule name if any.
    pub fn match_name(&self, name: &str) -> Option<Label> {
        match self {
            RuleEngine::Domain(trie) | RuleEngine::Hosts(trie) => trie.matches(name),
            RuleEngine::Regex(patterns) => patterns
                .iter()
                .find(|(re, _)| re.is_match(name))
                .map(|(_, label)| label.clone()),
            _ => None,
        }
    }

    /// Test an IP address against this engine, returning the matched
    /// rule name if any.
    pub fn match_ip(&self, addr: IpAddr) -> Option<Label> {
        match self {
            RuleEngine::Cidr(pairs) => pairs
                .iter()
                .find(|(cidr, _)| cidr.contains(&addr))
                .map(|(_, label)| label.clone()),
            RuleEngine::Location { reader, codes } => {
                let country: maxminddb::geoip2::Country = reader.lookup(addr).ok()?;
                let iso = country.country?.iso_code?;
                codes
                    .iter()
                    .find(|(code, _)| code.eq_ignore_ascii_case(iso))
                    .map(|(_, label)| label.clone())
            }
            _ => None,
        }
    }
}

/// Aggregates multiple [`RuleEngine`]s behind one `arc-swap` handle, so
/// a file-watcher reload can atomically swap in a freshly parsed
/// generation without blocking concurrent lookups.
pub struct MultiDb {
    engines: arc_swap::ArcSwap<Vec<RuleEngine>>,
}

impl MultiDb {
    /// Build an aggregator over `engines`.
    pub fn new(engines: Vec<RuleEngine>) -> Self {
        Self {
            engines: arc_swap::ArcSwap::from_pointee(engines),
        }
    }

    /// Atomically replace the loaded rule set.
    pub fn reload(&self, engines: Vec<RuleEngine>) {
        self.engines.store(std::sync::Arc::new(engines));
    }

    /// Test `name` against every engine in order, returning the first match.
    pub fn match_name(&self, name: &str) -> Option<Label> {
        self.engines.load().iter().find_map(|e| e.match_name(name))
    }

    /// Test `addr` against every engine in order, returning the first match.
    pub fn match_ip(&self, addr: IpAddr) -> Option<Label> {
        self.engines.load().iter().find_map(|e| e.match_ip(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_engine_matches_suffix() {
        let engine = RuleEngine::domain_from_str(Label::from("ads"), "ads.example.com\n# comment\n\n");
        assert_eq!(
            engine.match_name("sub.ads.example.com"),
            Some(Label::from("ads"))
        );
        assert_eq!(engine.match_name("example.com"), None);
    }

    #[test]
    fn hosts_engine_ignores_ip_column() {
        let engine = RuleEngine::hosts_from_str(Label::from("hosts"), "0.0.0.0 tracker.example.com\n");
        assert_eq!(
            engine.match_name("tracker.example.com"),
            Some(Label::from("hosts"))
        );
    }

    #[test]
    fn multidb_checks_all_engines_in_order() {
        let db = MultiDb::new(vec![
            RuleEngine::domain_from_str(Label::from("first"), "a.example.com\n"),
            RuleEngine::domain_from_str(Label::from("second"), "b.example.com\n"),
        ]);
        assert_eq!(db.match_name("a.example.com"), Some(Label::from("first")));
        assert_eq!(db.match_name("b.example.com"), Some(Label::from("second")));
        assert_eq!(db.match_name("c.example.com"), None);
    }
}

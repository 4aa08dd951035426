//! The conjunctive predicates a [`super::Route`] can test against an
//! inbound query and its [`crate::ClientInfo`].

use crate::{resolver::Query, ClientInfo};
use chrono::{Datelike, Timelike, Weekday};
use cidr_utils::cidr::IpCidr;
use domain::base::iana::{Class, Rtype};
use thiserror::Error;

/// Predicate evaluation failure.
#[derive(Error, Debug)]
pub enum PredicateError {
    /// A GeoIP-backed predicate's database wasn't loaded (reserved for
    /// future geo-aware routing; not currently evaluated here, the
    /// blocklist family owns the GeoIP matcher today).
    #[error("geoip database unavailable")]
    GeoUnavailable,
}

/// Inclusive clock time-of-day window, local to the resolver process.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    /// Start of window, minutes since midnight.
    pub start_minute: u32,
    /// End of window, minutes since midnight (exclusive).
    pub end_minute: u32,
}

impl TimeWindow {
    fn contains(&self, minute_of_day: u32) -> bool {
        if self.start_minute <= self.end_minute {
            (self.start_minute..self.end_minute).contains(&minute_of_day)
        } else {
            // Window wraps past midnight, e.g. 22:00-06:00.
            minute_of_day >= self.start_minute || minute_of_day < self.end_minute
        }
    }
}

/// One conjunct of a route's predicate list.
pub enum Predicate {
    /// Query name matches this regex (applied to the FQDN, trailing
    /// dot included, case-insensitive by convention of the pattern).
    NamePattern(regex::Regex),
    /// Query class is one of these.
    Class(Vec<Class>),
    /// Query type is one of these. An empty list is historically
    /// equivalent to "any type" — the deprecated single-type config
    /// field folds into a one-element `Vec` at config-load time.
    RecordType(Vec<Rtype>),
    /// Client source address falls within one of these CIDR blocks.
    SourceCidr(Vec<IpCidr>),
    /// Current local weekday is one of these.
    Weekday(Vec<Weekday>),
    /// Current local time of day falls in this window.
    TimeOfDay(TimeWindow),
    /// Query arrived via this listener.
    ListenerId(crate::Label),
    /// Client presented this TLS SNI (DoT/DoH/DoQ only).
    Sni(String),
    /// Client requested this HTTP path (DoH only).
    DohPath(String),
}

impl Predicate {
    /// Evaluate this predicate against `query`/`client`.
    pub fn matches(&self, query: &Query, client: &ClientInfo) -> Result<bool, PredicateError> {
        Ok(match self {
            Predicate::NamePattern(re) => query
                .first_question()
                .map(|q| re.is_match(&q.qname().to_string()))
                .unwrap_or(false),
            Predicate::Class(classes) => query
                .first_question()
                .map(|q| classes.contains(&q.qclass()))
                .unwrap_or(false),
            Predicate::RecordType(types) => {
                types.is_empty()
                    || query
                        .first_question()
                        .map(|q| types.contains(&q.qtype()))
                        .unwrap_or(false)
            }
            Predicate::SourceCidr(cidrs) => client
                .src
                .map(|addr| cidrs.iter().any(|c| c.contains(&addr.ip())))
                .unwrap_or(false),
            Predicate::Weekday(days) => {
                let now = chrono::Local::now();
                days.contains(&now.weekday())
            }
            Predicate::TimeOfDay(window) => {
                let now = chrono::Local::now();
                window.contains(now.hour() * 60 + now.minute())
            }
            Predicate::ListenerId(id) => &client.listener_id == id,
            Predicate::Sni(expected) => client.sni.as_deref() == Some(expected.as_str()),
            Predicate::DohPath(expected) => client.doh_path.as_deref() == Some(expected.as_str()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_window_wraps_past_midnight() {
        let window = TimeWindow {
            start_minute: 22 * 60,
            end_minute: 6 * 60,
        };
        assert!(window.contains(23 * 60));
        assert!(window.contains(0));
        assert!(window.contains(5 * 60 + 59));
        assert!(!window.contains(12 * 60));
    }

    #[test]
    fn ordinary_time_window_does_not_wrap() {
        let window = TimeWindow {
            start_minute: 9 * 60,
            end_minute: 17 * 60,
        };
        assert!(window.contains(12 * 60));
        assert!(!window.contains(20 * 60));
    }
}

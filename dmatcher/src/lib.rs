#![deny(missing_docs)]
//! A simple domain suffix matching algorithm used to match query names
//! against a set of user-defined domain rules.
//!
//! Two flavors are provided: [`domain::Domain`] is a plain membership
//! test (does this name fall under any inserted suffix?), and
//! [`labeled::LabeledDomain`] attaches an arbitrary label to each
//! inserted suffix and returns it on match, which the blocklist family
//! uses to substitute the matched rule into an EDE text template.

/// Plain suffix membership matcher.
pub mod domain;
/// Suffix matcher that remembers which rule matched.
pub mod labeled;

pub use self::domain::Domain;
pub use self::labeled::LabeledDomain;

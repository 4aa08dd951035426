//! Suffix matcher that records which inserted rule matched, so callers
//! (notably the EDE template) can substitute the offending rule name.

use hashbrown::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct LevelNode<T> {
    label: Option<T>,
    next_lvs: HashMap<Arc<str>, LevelNode<T>>,
}

impl<T> LevelNode<T> {
    fn new() -> Self {
        Self {
            label: None,
            next_lvs: HashMap::new(),
        }
    }
}

/// Domain suffix matcher that returns a caller-supplied label on match.
#[derive(Debug, Clone)]
pub struct LabeledDomain<T: Clone> {
    root: LevelNode<T>,
}

impl<T: Clone> Default for LabeledDomain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> LabeledDomain<T> {
    /// Create an empty matcher.
    pub fn new() -> Self {
        Self {
            root: LevelNode::new(),
        }
    }

    /// Insert a domain suffix tagged with `label`. The label closest to
    /// the root along a matched path wins (the shortest matching
    /// suffix), mirroring how `spec.md`'s blocklist rules are evaluated
    /// independently of insertion order.
    pub fn insert(&mut self, domain: &str, label: T) {
        let lvs: Vec<&str> = domain
            .split('.')
            .filter(|lv| !lv.is_empty())
            .rev()
            .collect();
        let mut ptr = &mut self.root;
        for lv in lvs {
            ptr = ptr
                .next_lvs
                .entry(Arc::from(lv))
                .or_insert_with(LevelNode::new);
        }
        ptr.label = Some(label);
    }

    /// Match `domain`, returning the label of the shortest matching
    /// inserted suffix, if any.
    pub fn matches(&self, domain: &str) -> Option<T> {
        let lvs: Vec<&str> = domain
            .split('.')
            .filter(|lv| !lv.is_empty())
            .rev()
            .collect();
        let mut ptr = &self.root;
        for lv in lvs {
            if let Some(label) = &ptr.label {
                return Some(label.clone());
            }
            ptr = ptr.next_lvs.get(lv)?;
        }
        ptr.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::LabeledDomain;

    #[test]
    fn returns_matched_rule_label() {
        let mut m = LabeledDomain::new();
        m.insert("ads.example", "ads-rule");
        m.insert("tracker.example", "tracker-rule");
        assert_eq!(m.matches("sub.ads.example"), Some("ads-rule"));
        assert_eq!(m.matches("tracker.example"), Some("tracker-rule"));
        assert_eq!(m.matches("example.com"), None);
    }

    #[test]
    fn shortest_suffix_wins_over_nested_rules() {
        let mut m = LabeledDomain::new();
        m.insert("example.com", "broad");
        m.insert("ads.example.com", "narrow");
        // A broader ancestor rule shadows anything nested under it, including
        // an exact hit on the more specific suffix itself.
        assert_eq!(m.matches("ads.example.com"), Some("broad"));
        assert_eq!(m.matches("shop.example.com"), Some("broad"));
    }
}

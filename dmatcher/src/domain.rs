//! Membership-only suffix matcher: `apple.com` inserted means
//! `store.apple.com` matches but `apple.cn` does not.

use hashbrown::HashMap;
use std::sync::Arc;

#[derive(Debug, PartialEq, Clone)]
struct LevelNode {
    next_lvs: HashMap<Arc<str>, LevelNode>,
}

impl LevelNode {
    fn new() -> Self {
        Self {
            next_lvs: HashMap::new(),
        }
    }
}

/// Domain suffix matcher.
#[derive(Debug, Clone, Default)]
pub struct Domain {
    root: LevelNode,
}

impl Domain {
    /// Create an empty matcher.
    pub fn new() -> Self {
        Self {
            root: LevelNode::new(),
        }
    }

    /// Insert every `\n`-separated domain in `data`.
    pub fn insert_multi(&mut self, data: &str) {
        data.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .for_each(|lv| self.insert(lv));
    }

    /// Insert a single domain suffix.
    pub fn insert(&mut self, domain: &str) {
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
    }

    /// Test whether `domain` falls under any inserted suffix.
    pub fn matches(&self, domain: &str) -> bool {
        let lvs: Vec<&str> = domain
            .split('.')
            .filter(|lv| !lv.is_empty())
            .rev()
            .collect();
        let mut ptr = &self.root;
        // An empty trie (root has no children and was never marked) never matches.
        if ptr.next_lvs.is_empty() {
            return false;
        }
        for lv in lvs {
            if ptr.next_lvs.is_empty() {
                // We've walked past an inserted suffix boundary: every sub-level matches.
                return true;
            }
            ptr = match ptr.next_lvs.get(lv) {
                Some(v) => v,
                None => return false,
            };
        }
        true
    }

    /// Number of inserted suffixes reachable from this matcher (approximate,
    /// counts leaf nodes only).
    pub fn is_empty(&self) -> bool {
        self.root.next_lvs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Domain;

    #[test]
    fn matches_subdomains() {
        let mut m = Domain::new();
        m.insert("apple.com");
        m.insert("apple.cn");
        assert!(m.matches("store.apple.com"));
        assert!(m.matches("store.apple.com."));
        assert!(!m.matches("baidu.com"));
        assert!(m.matches("你好.store.www.apple.cn"));
    }

    #[test]
    fn empty_matcher_matches_nothing() {
        let m = Domain::new();
        assert!(!m.matches("example.com"));
        assert!(m.is_empty());
    }

    #[test]
    fn insert_multi_skips_comments_and_blank_lines() {
        let mut m = Domain::new();
        m.insert_multi("ads.example\n# comment\n\ntracker.example\n");
        assert!(m.matches("sub.ads.example"));
        assert!(m.matches("tracker.example"));
        assert!(!m.matches("example.com"));
    }
}

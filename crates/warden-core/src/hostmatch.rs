//! Reverse-label hostname trie (§4.3): indexes cosmetic/scriptlet entries
//! keyed by the hostname they apply to (and, implicitly, every subdomain of
//! it), with primary/exception set-difference lookup.
//!
//! A generic rule keyed by a bare domain (`example.com##.ad-banner`) also
//! applies to every subdomain of `example.com`; an exception entry
//! (`example.com#@#.ad-banner`) cancels it for that host and its
//! subdomains. Lookup walks from the most specific label down to the root,
//! accumulating both sets, and returns primary entries with any matching
//! exception entries removed.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Default)]
struct Node<V> {
    children: HashMap<String, Node<V>>,
    primary: Vec<V>,
    exception: Vec<V>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            primary: Vec::new(),
            exception: Vec::new(),
        }
    }
}

/// A hostname-keyed store of values of type `V`, with generic-domain
/// inheritance and exception cancellation.
pub struct HostMatcher<V> {
    root: Node<V>,
}

impl<V> Default for HostMatcher<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HostMatcher<V> {
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    fn walk_mut(&mut self, host: &str) -> &mut Node<V> {
        let mut node = &mut self.root;
        for label in host.trim_end_matches('.').rsplit('.') {
            node = node
                .children
                .entry(label.to_ascii_lowercase())
                .or_insert_with(Node::new);
        }
        node
    }

    /// Register `value` so it applies to `host` and every subdomain of it.
    pub fn add_primary_rule(&mut self, host: &str, value: V) {
        self.walk_mut(host).primary.push(value);
    }

    /// Register `value` as cancelling matching primary entries for `host`
    /// and every subdomain of it.
    pub fn add_exception_rule(&mut self, host: &str, value: V) {
        self.walk_mut(host).exception.push(value);
    }

    /// Register `value` under the universal `*` host pattern: it applies to
    /// every hostname, since [`Self::collect`] always visits the root node
    /// regardless of which labels it then descends through.
    pub fn add_primary_global(&mut self, value: V) {
        self.root.primary.push(value);
    }

    /// Universal-pattern counterpart to [`Self::add_exception_rule`].
    pub fn add_exception_global(&mut self, value: V) {
        self.root.exception.push(value);
    }

    /// Every `(host_label_depth, primary_values, exception_values)` node
    /// visited walking from `host` up to the root, most specific first.
    fn collect(&self, host: &str) -> (Vec<&V>, Vec<&V>) {
        let labels: Vec<&str> = host.trim_end_matches('.').rsplit('.').collect();
        let mut primary = Vec::new();
        let mut exception = Vec::new();

        let mut node = &self.root;
        primary.extend(node.primary.iter());
        exception.extend(node.exception.iter());
        for label in &labels {
            match node.children.get(&label.to_ascii_lowercase()) {
                Some(child) => {
                    node = child;
                    primary.extend(node.primary.iter());
                    exception.extend(node.exception.iter());
                }
                None => break,
            }
        }

        (primary, exception)
    }
}

impl<V: PartialEq> HostMatcher<V> {
    /// Entries that apply to `host` (primary minus exception), structural
    /// equality deciding cancellation.
    pub fn lookup(&self, host: &str) -> Vec<&V> {
        let (primary, exception) = self.collect(host);
        primary
            .into_iter()
            .filter(|p| !exception.iter().any(|e| *e == *p))
            .collect()
    }
}

impl<V: Eq + Hash + Clone> HostMatcher<V> {
    /// Like [`Self::lookup`] but for large value sets where hash-based
    /// cancellation is cheaper than the linear scan `lookup` does.
    pub fn lookup_hashed(&self, host: &str) -> Vec<V> {
        let (primary, exception) = self.collect(host);
        let exception: std::collections::HashSet<&V> = exception.into_iter().collect();
        primary
            .into_iter()
            .filter(|p| !exception.contains(p))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_rule_applies_to_subdomains() {
        let mut m: HostMatcher<&str> = HostMatcher::new();
        m.add_primary_rule("example.com", ".ad-banner");
        assert_eq!(m.lookup("example.com"), vec![&".ad-banner"]);
        assert_eq!(m.lookup("www.example.com"), vec![&".ad-banner"]);
        assert!(m.lookup("other.com").is_empty());
    }

    #[test]
    fn exception_cancels_for_host_and_subdomains() {
        let mut m: HostMatcher<&str> = HostMatcher::new();
        m.add_primary_rule("example.com", ".ad-banner");
        m.add_exception_rule("sub.example.com", ".ad-banner");
        assert_eq!(m.lookup("example.com"), vec![&".ad-banner"]);
        assert!(m.lookup("sub.example.com").is_empty());
        assert!(m.lookup("deep.sub.example.com").is_empty());
    }

    #[test]
    fn unrelated_values_are_unaffected_by_exception() {
        let mut m: HostMatcher<&str> = HostMatcher::new();
        m.add_primary_rule("example.com", ".ad-banner");
        m.add_primary_rule("example.com", ".tracker");
        m.add_exception_rule("example.com", ".ad-banner");
        assert_eq!(m.lookup("example.com"), vec![&".tracker"]);
    }

    #[test]
    fn case_insensitive_labels() {
        let mut m: HostMatcher<&str> = HostMatcher::new();
        m.add_primary_rule("Example.COM", ".x");
        assert_eq!(m.lookup("example.com"), vec![&".x"]);
    }

    #[test]
    fn universal_pattern_matches_every_host() {
        let mut m: HostMatcher<&str> = HostMatcher::new();
        m.add_primary_global(".popup");
        assert_eq!(m.lookup("example.com"), vec![&".popup"]);
        assert_eq!(m.lookup("anything.else"), vec![&".popup"]);
    }

    #[test]
    fn global_exception_cancels_global_primary_everywhere() {
        let mut m: HostMatcher<&str> = HostMatcher::new();
        m.add_primary_global(".popup");
        m.add_exception_global(".popup");
        assert!(m.lookup("example.com").is_empty());
    }

    #[test]
    fn host_exception_cancels_only_that_host_not_global_entries() {
        let mut m: HostMatcher<&str> = HostMatcher::new();
        m.add_primary_global(".popup");
        m.add_exception_rule("example.com", ".popup");
        assert!(m.lookup("example.com").is_empty());
        assert_eq!(m.lookup("other.com"), vec![&".popup"]);
    }
}

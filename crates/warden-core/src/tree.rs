//! Radix rule tree (§4.2): three rooted radix trees over token strings,
//! keyed by anchor class (`floating`, `start-anchored`, `domain-anchored`),
//! searched against a request URL.
//!
//! Node/edge/traversal layout is a direct port of the reference
//! implementation's token-radix tree: edges are kept sorted for binary
//! search, and pattern search walks wildcard/separator branches
//! non-deterministically via an explicit work stack (never recursion) so an
//! adversarial pattern can't blow the call stack.

use crate::token::{self, Token};
use crate::url;

/// One edge out of a node, labeled by the first token of the child's
/// prefix. `node.prefix[0]` always equals `label` by construction.
struct Edge<T> {
    label: Token,
    node: Node<T>,
}

/// A radix-tree node. `prefix` is the full token run from the parent's edge
/// (including the edge label); `leaf` holds the payload for rules whose
/// pattern ends exactly here.
struct Node<T> {
    prefix: Vec<Token>,
    edges: Vec<Edge<T>>,
    leaf: Option<Vec<T>>,
}

impl<T> Node<T> {
    fn empty() -> Self {
        Self {
            prefix: Vec::new(),
            edges: Vec::new(),
            leaf: None,
        }
    }

    fn find_edge_idx(&self, label: Token) -> Result<usize, usize> {
        self.edges
            .binary_search_by_key(&label.sort_key(), |e| e.label.sort_key())
    }

    fn insert(&mut self, tokens: &[Token], value: T) {
        if tokens.is_empty() {
            self.leaf.get_or_insert_with(Vec::new).push(value);
            return;
        }

        let label = tokens[0];
        match self.find_edge_idx(label) {
            Ok(idx) => {
                let child = &mut self.edges[idx].node;
                let lcp = longest_common_prefix(&child.prefix, tokens);
                if lcp < child.prefix.len() {
                    split_child(child, lcp);
                }
                child.insert(&tokens[lcp..], value);
            }
            Err(idx) => {
                let mut new_node = Node::empty();
                new_node.prefix = tokens.to_vec();
                new_node.leaf = Some(vec![value]);
                self.edges.insert(idx, Edge { label, node: new_node });
            }
        }
    }
}

/// Split `child` so its prefix becomes only the first `lcp` tokens, with the
/// remainder demoted to a new sole child edge carrying the old payload.
fn split_child<T>(child: &mut Node<T>, lcp: usize) {
    let old = std::mem::replace(child, Node::empty());
    let common = old.prefix[..lcp].to_vec();
    let suffix_node = Node {
        prefix: old.prefix[lcp..].to_vec(),
        edges: old.edges,
        leaf: old.leaf,
    };
    let suffix_label = suffix_node.prefix[0];
    child.prefix = common;
    child.edges = vec![Edge {
        label: suffix_label,
        node: suffix_node,
    }];
}

fn longest_common_prefix(a: &[Token], b: &[Token]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// A single non-deterministic-traversal work item.
struct Frame<'a, T> {
    node: &'a Node<T>,
    prefix_pos: usize,
    input_pos: usize,
}

/// Walk `node`'s subtree against `input` starting at byte offset 0 of
/// `input` (the caller already sliced `input` to the desired start point),
/// collecting every leaf payload reachable by a valid match.
fn traverse<'a, T>(root: &'a Node<T>, input: &[u8], out: &mut Vec<&'a T>) {
    let mut stack = vec![Frame {
        node: root,
        prefix_pos: 0,
        input_pos: 0,
    }];

    // Bound total work so a pathological pattern (many wildcards over a
    // long URL) cannot make a single request unboundedly expensive.
    const MAX_STEPS: usize = 200_000;
    let mut steps = 0usize;

    while let Some(Frame {
        node,
        prefix_pos,
        input_pos,
    }) = stack.pop()
    {
        steps += 1;
        if steps > MAX_STEPS {
            break;
        }

        if prefix_pos < node.prefix.len() {
            match node.prefix[prefix_pos] {
                Token::Literal(b) => {
                    if input_pos < input.len() && input[input_pos] == b {
                        stack.push(Frame {
                            node,
                            prefix_pos: prefix_pos + 1,
                            input_pos: input_pos + 1,
                        });
                    }
                }
                Token::Wildcard => {
                    // zero bytes
                    stack.push(Frame {
                        node,
                        prefix_pos: prefix_pos + 1,
                        input_pos,
                    });
                    // one (and, by repeated popping, many) bytes
                    if input_pos < input.len() {
                        stack.push(Frame {
                            node,
                            prefix_pos,
                            input_pos: input_pos + 1,
                        });
                    }
                }
                Token::Separator => {
                    if input_pos >= input.len() {
                        stack.push(Frame {
                            node,
                            prefix_pos: prefix_pos + 1,
                            input_pos,
                        });
                    } else if url::is_boundary_char(input[input_pos]) {
                        // stop consuming separator bytes here...
                        stack.push(Frame {
                            node,
                            prefix_pos: prefix_pos + 1,
                            input_pos: input_pos + 1,
                        });
                        // ...or keep consuming more consecutive separator bytes
                        stack.push(Frame {
                            node,
                            prefix_pos,
                            input_pos: input_pos + 1,
                        });
                    }
                }
                Token::Anchor => {
                    if input_pos == input.len() {
                        stack.push(Frame {
                            node,
                            prefix_pos: prefix_pos + 1,
                            input_pos,
                        });
                    }
                }
            }
            continue;
        }

        // Prefix exhausted at this node: it's a match point.
        if let Some(leaf) = &node.leaf {
            out.extend(leaf.iter());
        }

        for edge in &node.edges {
            let admissible = match edge.label {
                Token::Literal(b) => input_pos < input.len() && input[input_pos] == b,
                Token::Wildcard => true,
                Token::Separator => {
                    input_pos >= input.len() || url::is_boundary_char(input[input_pos])
                }
                Token::Anchor => input_pos == input.len(),
            };
            if admissible {
                stack.push(Frame {
                    node: &edge.node,
                    prefix_pos: 0,
                    input_pos,
                });
            }
        }
    }
}

/// Three rooted radix trees keyed by anchor class, searched together
/// against a request URL per §4.2.
pub struct RuleTree<T> {
    floating: Node<T>,
    start_anchored: Node<T>,
    domain_anchored: Node<T>,
}

impl<T> Default for RuleTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RuleTree<T> {
    pub fn new() -> Self {
        Self {
            floating: Node::empty(),
            start_anchored: Node::empty(),
            domain_anchored: Node::empty(),
        }
    }

    /// Insert `pattern` (pre-`$modifiers` text) with payload `value`,
    /// selecting a root from its anchor prefix (§4.2 step 2).
    pub fn insert(&mut self, pattern: &str, value: T) {
        let tokens = token::tokenize(pattern);
        if let Some(rest) = token::strip_domain_anchor(&tokens) {
            self.domain_anchored.insert(rest, value);
        } else if let Some(rest) = token::strip_start_anchor(&tokens) {
            self.start_anchored.insert(rest, value);
        } else {
            self.floating.insert(&tokens, value);
        }
    }

    /// Search all three roots against `url` per §4.2 steps 1-3, returning
    /// every candidate rule reachable by any valid anchor/offset
    /// combination. Duplicates (the same rule reached via more than one
    /// backtracking path) may appear; callers dedupe by rule identity.
    pub fn find(&self, url: &str) -> Vec<&T> {
        let bytes = url.as_bytes();
        let mut out = Vec::new();

        // Step 1: start-anchored, position 0 only.
        traverse(&self.start_anchored, bytes, &mut out);

        // Step 2: floating, every byte offset.
        for i in 0..=bytes.len() {
            traverse(&self.floating, &bytes[i..], &mut out);
        }

        // Step 3: domain-anchored, at host start and after every '.' in
        // the host portion.
        if let Some(host_start) = url::get_scheme_end(url) {
            traverse(&self.domain_anchored, &bytes[host_start..], &mut out);
            if let Some((hs, he)) = url::get_host_position(url) {
                for i in hs..he {
                    if bytes[i] == b'.' {
                        traverse(&self.domain_anchored, &bytes[i + 1..], &mut out);
                    }
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(patterns: &[(&str, u32)]) -> RuleTree<u32> {
        let mut tree = RuleTree::new();
        for (p, id) in patterns {
            tree.insert(p, *id);
        }
        tree
    }

    #[test]
    fn floating_literal_match() {
        let tree = build(&[("/banner/img", 1)]);
        assert_eq!(
            tree.find("http://example.com/banner/img"),
            vec![&1]
        );
        assert!(tree.find("http://example.com/banner-img").is_empty());
    }

    #[test]
    fn domain_anchor_match() {
        let tree = build(&[("||example.org^", 1)]);
        assert_eq!(tree.find("http://example.org:8080"), vec![&1]);
        assert!(tree.find("http://example.com").is_empty());
    }

    #[test]
    fn domain_anchor_matches_subdomain_boundary() {
        let tree = build(&[("||ads.example.com^", 1)]);
        assert_eq!(tree.find("https://x.ads.example.com/"), vec![&1]);
        assert!(tree.find("https://xads.example.com/").is_empty());
    }

    #[test]
    fn start_anchor_match() {
        let tree = build(&[("|http://example.org/", 1)]);
        assert_eq!(tree.find("http://example.org/"), vec![&1]);
        assert!(tree.find("https://example.org/").is_empty());
    }

    #[test]
    fn wildcard_matches_any_span() {
        let tree = build(&[("/ads/*banner", 1)]);
        assert_eq!(tree.find("http://e.com/ads/xxxxbanner"), vec![&1]);
        assert_eq!(tree.find("http://e.com/ads/banner"), vec![&1]);
        assert!(tree.find("http://e.com/ad/banner").is_empty());
    }

    #[test]
    fn shared_prefix_splits_edge_without_losing_either_rule() {
        let tree = build(&[("/scripts/ads", 1), ("/scripts/track", 2)]);
        assert_eq!(tree.find("http://e.com/scripts/ads"), vec![&1]);
        assert_eq!(tree.find("http://e.com/scripts/track"), vec![&2]);
    }

    #[test]
    fn separator_matches_end_of_input_or_boundary_byte() {
        let tree = build(&[("/track^", 1)]);
        assert_eq!(tree.find("http://e.com/track"), vec![&1]);
        assert_eq!(tree.find("http://e.com/track?x=1"), vec![&1]);
        assert!(tree.find("http://e.com/tracker").is_empty());
    }
}

//! Filter-list ingestion: turns [`crate::parser::parse_line`] output into an
//! installed [`RuleStore`] (§3, §4.8).
//!
//! One [`RuleSetBuilder`] accumulates every line of every enabled list
//! before building anything, since `$badfilter` cancellation (§3 supplement)
//! needs the full aggregate rule set to find the textual duplicate it
//! targets — a rule on list A can be cancelled by a `$badfilter` on list B
//! regardless of which list loads first.

use warden_core::cosmetic::CosmeticStore;
use warden_core::decision::RuleStore;
use warden_core::hostmatch::HostMatcher;
use warden_core::tree::RuleTree;
use warden_core::types::{HostsMap, ListId, ListNames, Rule, RuleOrigin, RuleProvenance};

use crate::parser::{parse_line, HostPatternList, NetworkLine, ParsedLine};

/// Per-list ingestion counts, reported by `warden-cli compile`/`check`.
#[derive(Debug, Clone, Default)]
pub struct ListStats {
    pub list_id: ListId,
    pub name: String,
    pub total_lines: usize,
    pub parsed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub badfiltered: usize,
}

impl ListStats {
    /// Fraction of non-empty lines that parsed cleanly or were a recognized
    /// skip (comment/header/cosmetic-hiding), used as the `check` subcommand's
    /// CI gate.
    pub fn parse_ratio(&self) -> f64 {
        if self.total_lines == 0 {
            return 1.0;
        }
        (self.parsed + self.skipped) as f64 / self.total_lines as f64
    }
}

struct PendingNetwork {
    origin: RuleOrigin,
    list_name: String,
    line: NetworkLine,
}

/// Accumulates parsed lines from one or more filter-list sources, then
/// builds a single [`RuleStore`] from all of them at once.
#[derive(Default)]
pub struct RuleSetBuilder {
    network: Vec<PendingNetwork>,
    hosts: HostsMap,
    cosmetics: CosmeticStore,
    list_names: ListNames,
    stats: Vec<ListStats>,
}

impl RuleSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and ingest every line of `text`, under list name `name`,
    /// assigned the next `list_id`. Returns this list's own parse stats;
    /// the same value is retained in [`Self::stats`] for [`Self::build`]'s
    /// caller to inspect after every list is added.
    pub fn add_list(&mut self, name: &str, text: &str) -> ListStats {
        let list_id = self.stats.len() as ListId;
        self.list_names.insert(list_id, name);

        let mut stat = ListStats {
            list_id,
            name: name.to_string(),
            ..Default::default()
        };

        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            stat.total_lines += 1;
            let line_no = (idx + 1) as u32;
            let origin = RuleOrigin { list_id, line_no };

            match parse_line(line) {
                ParsedLine::Skip => stat.skipped += 1,
                ParsedLine::Error(_msg) => {
                    stat.failed += 1;
                    log::warn!("{name}:{line_no}: failed to parse '{line}'");
                }
                ParsedLine::Network(net) => {
                    stat.parsed += 1;
                    self.network.push(PendingNetwork {
                        origin,
                        list_name: name.to_string(),
                        line: net,
                    });
                }
                ParsedLine::Hosts(list) => {
                    stat.parsed += 1;
                    for host in list {
                        self.hosts.insert(
                            host,
                            RuleProvenance {
                                origin,
                                list_name: name.to_string(),
                                source_line: line.to_string(),
                            },
                        );
                    }
                }
                ParsedLine::Scriptlet { hosts, exception, call } => {
                    stat.parsed += 1;
                    route_host_pattern(&mut self.cosmetics.scriptlets, &hosts, exception, call);
                }
                ParsedLine::JsRule { hosts, exception, body } => {
                    stat.parsed += 1;
                    route_host_pattern(&mut self.cosmetics.js_rules, &hosts, exception, body);
                }
                ParsedLine::ExtCss { hosts, exception, selector } => {
                    stat.parsed += 1;
                    route_host_pattern(&mut self.cosmetics.ext_css, &hosts, exception, selector);
                }
                ParsedLine::JsonPrune { hosts, spec } => {
                    stat.parsed += 1;
                    route_host_pattern(&mut self.cosmetics.json_prune, &hosts, false, spec);
                }
            }
        }

        self.stats.push(stat.clone());
        stat
    }

    pub fn stats(&self) -> &[ListStats] {
        &self.stats
    }

    /// Apply `$badfilter` cancellation, then build the network rule tree and
    /// hand everything off to a fresh [`RuleStore`].
    pub fn build(self) -> RuleStore {
        let (badfilters, mut candidates): (Vec<PendingNetwork>, Vec<PendingNetwork>) =
            self.network.into_iter().partition(|p| p.line.is_badfilter);

        candidates.retain(|candidate| {
            !badfilters
                .iter()
                .any(|bf| badfilter_cancels(&bf.line, &candidate.line))
        });

        let mut tree = RuleTree::new();
        let mut rules = Vec::with_capacity(candidates.len());
        for pending in candidates {
            let pattern = pending.line.pattern.clone();
            let rule = Rule {
                kind: pending.line.kind,
                resource_types: pending.line.resource_types,
                scheme_mask: pending.line.scheme_mask,
                modifiers: pending.line.modifiers,
                flags: pending.line.flags,
                provenance: RuleProvenance {
                    origin: pending.origin,
                    list_name: pending.list_name,
                    source_line: pending.line.pattern.clone(),
                },
                redirect_target: pending.line.redirect_target,
            };
            let id = rules.len() as u32;
            rules.push(rule);
            tree.insert(&pattern, id);
        }

        RuleStore::new(tree, rules, self.list_names)
            .with_hosts(self.hosts)
            .with_cosmetics(self.cosmetics)
    }
}

/// Does `badfilter`'s target (every field but `is_badfilter` itself) match
/// `candidate`? Comparing the whole parsed line, not just the pattern,
/// matches the reference semantics: `$badfilter` cancels the one rule it is
/// textually identical to, not every rule sharing its pattern.
fn badfilter_cancels(badfilter: &NetworkLine, candidate: &NetworkLine) -> bool {
    candidate.kind == badfilter.kind
        && candidate.pattern == badfilter.pattern
        && candidate.resource_types == badfilter.resource_types
        && candidate.scheme_mask == badfilter.scheme_mask
        && candidate.modifiers == badfilter.modifiers
        && candidate.flags == badfilter.flags
        && candidate.redirect_target == badfilter.redirect_target
}

/// Install `value` into `matcher` for every host the parsed `<hostpat>`
/// prefix named: primary entries for `hosts.include` (or every host, if
/// `hosts.universal`) go to the primary or exception side depending on the
/// line's own separator (`#%#` vs. `#@%#`); `hosts.exclude` entries
/// (`~host`) are always an exception scoped to that one value, regardless
/// of the line's separator.
fn route_host_pattern<V: Clone>(
    matcher: &mut HostMatcher<V>,
    hosts: &HostPatternList,
    exception: bool,
    value: V,
) {
    if hosts.universal {
        if exception {
            matcher.add_exception_global(value.clone());
        } else {
            matcher.add_primary_global(value.clone());
        }
    }
    for host in &hosts.include {
        if exception {
            matcher.add_exception_rule(host, value.clone());
        } else {
            matcher.add_primary_rule(host, value.clone());
        }
    }
    for host in &hosts.exclude {
        matcher.add_exception_rule(host, value.clone());
    }
}

//! Host-scoped cosmetic injection stores (§4.5 step 3, §4.8).
//!
//! Four independent [`HostMatcher`] indices, one per cosmetic rule kind,
//! each keyed by the hostname(s) the rule line named (`<hostpat>#%#...`
//! etc.) with the same generic-domain/exception semantics network rules
//! get from [`crate::tree::RuleTree`]. `CosmeticStore::bundle_for` collects
//! everything a response to a given host needs in one pass so
//! `handle_response` doesn't have to know about each kind's wire format.

use crate::hostmatch::HostMatcher;
use crate::jsonprune::JsonPruneSpec;

/// A parsed `//scriptlet('name', 'arg1', 'arg2')` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptletCall {
    pub name: String,
    pub args: Vec<String>,
}

impl ScriptletCall {
    /// Parse the body following `#%#` — expected shape
    /// `//scriptlet('name'[, 'arg', ...])`.
    pub fn parse(body: &str) -> Option<Self> {
        let body = body.trim();
        let inner = body.strip_prefix("//scriptlet(")?.strip_suffix(')')?;
        let mut fields = split_unquoted_commas(inner)
            .into_iter()
            .map(|raw| unquote(raw.trim()))
            .collect::<Option<Vec<_>>>()?;
        if fields.is_empty() {
            return None;
        }
        let name = fields.remove(0);
        Some(ScriptletCall { name, args: fields })
    }

    /// Render as a call into the scriptlet bundle's namespace.
    pub fn render(&self) -> String {
        let mut out = format!("window.__wardenScriptlets[{}](", js_string_literal(&self.name));
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&js_string_literal(arg));
        }
        out.push_str(");");
        out
    }
}

fn split_unquoted_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth_quote: Option<char> = None;
    let mut start = 0;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match depth_quote {
            Some(q) => {
                if c == q && (i == 0 || bytes[i - 1] != b'\\') {
                    depth_quote = None;
                }
            }
            None => match c {
                '\'' | '"' => depth_quote = Some(c),
                ',' => {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

fn unquote(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'\'' || bytes[0] == b'"') && bytes[bytes.len() - 1] == bytes[0] {
        Some(s[1..s.len() - 1].to_string())
    } else if s.is_empty() {
        Some(String::new())
    } else {
        None
    }
}

fn js_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// All host-scoped cosmetic indices built from one compiled rule set.
#[derive(Default)]
pub struct CosmeticStore {
    pub scriptlets: HostMatcher<ScriptletCall>,
    pub js_rules: HostMatcher<String>,
    pub ext_css: HostMatcher<String>,
    pub json_prune: HostMatcher<JsonPruneSpec>,
}

/// Everything to inject into one HTML response for a given host, already
/// rendered down to bundle fragments ready for the streaming rewriter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostBundle {
    /// `(()=>{ ...scriptlet calls... })();` or empty if none matched.
    pub scriptlet_js: Option<String>,
    /// `(function(){ ...raw JS rule bodies... })()` or empty if none matched.
    pub js_rule_js: Option<String>,
    /// Extended-CSS selectors to hand to the extended-CSS bundle's apply call.
    pub ext_css_selectors: Vec<String>,
}

impl HostBundle {
    pub fn is_empty(&self) -> bool {
        self.scriptlet_js.is_none() && self.js_rule_js.is_none() && self.ext_css_selectors.is_empty()
    }
}

impl CosmeticStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect scriptlet/JS-rule/extended-CSS entries registered for `host`
    /// (and its ancestor domains) into a single renderable bundle.
    pub fn bundle_for(&self, host: &str) -> HostBundle {
        let calls = self.scriptlets.lookup(host);
        let scriptlet_js = if calls.is_empty() {
            None
        } else {
            let mut out = String::from("(()=>{");
            for call in calls {
                out.push_str(&call.render());
            }
            out.push_str("})();");
            Some(out)
        };

        let scripts = self.js_rules.lookup(host);
        let js_rule_js = if scripts.is_empty() {
            None
        } else {
            let mut out = String::from("(function(){");
            for script in scripts {
                out.push_str(script);
                if !script.trim_end().ends_with(';') {
                    out.push(';');
                }
            }
            out.push_str("})()");
            Some(out)
        };

        let ext_css_selectors = self.ext_css.lookup(host).into_iter().cloned().collect();

        HostBundle {
            scriptlet_js,
            js_rule_js,
            ext_css_selectors,
        }
    }

    /// Per-host JSON-prune specs (applied to JSON bodies, not HTML).
    pub fn json_prune_for(&self, host: &str) -> Vec<JsonPruneSpec> {
        self.json_prune.lookup(host).into_iter().cloned().collect()
    }
}

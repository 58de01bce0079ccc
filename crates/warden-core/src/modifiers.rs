//! Modifier catalog (§4.4): the `$domain=`, `$method=`, `$removeparam`, and
//! similar options that narrow when a rule applies or describe what it does
//! beyond a flat block/allow.
//!
//! Matching modifiers narrow *whether* a rule applies (AND-combined with
//! each other, and with the resource-type mask carried on [`Rule`]
//! directly). Modifying modifiers describe *what to do* once a rule has
//! matched and don't participate in the match decision themselves.
//!
//! Kept as one tagged-variant enum with a `match` in [`Modifier::cancels`]
//! rather than a trait object per variant: there's a fixed, small set of
//! modifiers and every one of them needs a different notion of "are these
//! the same restriction," so dynamic dispatch would just hide the
//! distinctions this module exists to make explicit.

use crate::jsonprune::JsonPruneSpec;
use crate::types::{HeaderMap, RequestContext};

/// One `domain=` list entry, in one of the three shapes §4.4 names: a plain
/// domain matched by suffix, an eTLD+1 TLD-wildcard (`foo.*`, matching
/// whatever TLD `foo` carries), or a `/regex/` matched against the host
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum DomainEntry {
    Plain(String),
    /// The registrable-domain label before the wildcard, e.g. `foo` for
    /// `foo.*`.
    TldWildcard(String),
    /// The pattern text with its surrounding `/.../` stripped.
    Regex(String),
}

impl DomainEntry {
    fn parse(text: &str) -> Self {
        if let Some(pattern) = text.strip_prefix('/').and_then(|t| t.strip_suffix('/')) {
            return DomainEntry::Regex(pattern.to_string());
        }
        if let Some(label) = text.strip_suffix(".*") {
            return DomainEntry::TldWildcard(label.to_ascii_lowercase());
        }
        DomainEntry::Plain(text.to_ascii_lowercase())
    }

    /// `host` is the matched-against hostname (request's Referer host, or
    /// the URL host fallback); `etld1` is that same host's eTLD+1, used only
    /// by the TLD-wildcard form.
    fn matches(&self, host: &str, etld1: &str) -> bool {
        match self {
            DomainEntry::Plain(pattern) => host == pattern || host.ends_with(&format!(".{pattern}")),
            DomainEntry::TldWildcard(label) => etld1
                .split('.')
                .next()
                .is_some_and(|first| first.eq_ignore_ascii_case(label)),
            DomainEntry::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(host))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSet {
    include: Vec<DomainEntry>,
    exclude: Vec<DomainEntry>,
}

impl DomainSet {
    pub fn parse(value: &str) -> Self {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for part in value.split('|').filter(|p| !p.is_empty()) {
            match part.strip_prefix('~') {
                Some(rest) => exclude.push(DomainEntry::parse(rest)),
                None => include.push(DomainEntry::parse(part)),
            }
        }
        Self { include, exclude }
    }

    /// Match against `host` (the Referer host, falling back to the request
    /// URL host) and its eTLD+1.
    pub fn allows(&self, host: &str, etld1: &str) -> bool {
        if self.exclude.iter().any(|e| e.matches(host, etld1)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|e| e.matches(host, etld1))
    }

    /// Multiset equality: same entries, same signs, duplicates count.
    fn cancels(&self, other: &DomainSet) -> bool {
        same_multiset(&self.include, &other.include) && same_multiset(&self.exclude, &other.exclude)
    }
}

fn same_multiset<T: Ord + Clone>(a: &[T], b: &[T]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort();
    b.sort();
    a == b
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSet {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl MethodSet {
    pub fn parse(value: &str) -> Self {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for part in value.split('|').filter(|p| !p.is_empty()) {
            if let Some(m) = part.strip_prefix('~') {
                exclude.push(m.to_ascii_uppercase());
            } else {
                include.push(part.to_ascii_uppercase());
            }
        }
        Self { include, exclude }
    }

    pub fn allows(&self, method: &str) -> bool {
        let method = method.to_ascii_uppercase();
        if self.exclude.contains(&method) {
            return false;
        }
        self.include.is_empty() || self.include.contains(&method)
    }

    /// Set equality: order and duplicates don't matter.
    fn cancels(&self, other: &MethodSet) -> bool {
        same_set(&self.include, &other.include) && same_set(&self.exclude, &other.exclude)
    }
}

fn same_set(a: &[String], b: &[String]) -> bool {
    use std::collections::HashSet;
    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    a == b
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMatch {
    pub name: String,
    pub value: Option<String>,
}

impl HeaderMatch {
    pub fn parse(value: &str) -> Self {
        match value.split_once(':') {
            Some((name, val)) => HeaderMatch {
                name: name.trim().to_string(),
                value: Some(val.trim().to_string()),
            },
            None => HeaderMatch {
                name: value.trim().to_string(),
                value: None,
            },
        }
    }

    pub fn allows(&self, headers: &HeaderMap) -> bool {
        match headers.get(&self.name) {
            None => false,
            Some(actual) => match &self.value {
                None => true,
                Some(expected) => actual == expected,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    // --- matching modifiers: AND-combined gates on whether a rule fires ---
    Domain(DomainSet),
    Method(MethodSet),
    ThirdParty(bool),
    Header(HeaderMatch),
    /// `$document`/`$doc` — matches only top-level navigations, per
    /// `Sec-Fetch-Dest: document` + `Sec-Fetch-User: ?1`.
    Document,

    // --- modifying modifiers: effects applied once a rule has matched ---
    RemoveParam(RemoveParamSpec),
    RemoveHeader(String),
    SetHeader { name: String, value: String },
    JsonPrune(JsonPruneSpec),
    Csp(String),
    RemoveJsConstant(Vec<String>),
    /// `$all` — matches every resource type and method; a documented no-op
    /// beyond what the resource-type mask already defaults to.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveParamSpec {
    /// Bare `$removeparam` with no value: strip the entire query string.
    All,
    Name(String),
    Regex(String),
}

/// Header names a `removeheader`/`header` rule may never target, regardless
/// of list or user intent — stripping these breaks the transport, not just
/// the page.
pub const FORBIDDEN_HEADERS: &[&str] = &[
    "Access-Control-Allow-Origin",
    "Access-Control-Allow-Credentials",
    "Access-Control-Allow-Headers",
    "Access-Control-Allow-Methods",
    "Access-Control-Expose-Headers",
    "Access-Control-Max-Age",
    "Access-Control-Request-Headers",
    "Access-Control-Request-Method",
    "Origin",
    "Timing-Allow-Origin",
    "Allow",
    "Cross-Origin-Embedder-Policy",
    "Cross-Origin-Opener-Policy",
    "Cross-Origin-Resource-Policy",
    "Content-Security-Policy",
    "Content-Security-Policy-Report-Only",
    "Expect-CT",
    "Feature-Policy",
    "Permissions-Policy",
    "Origin-Isolation",
    "Strict-Transport-Security",
    "Upgrade-Insecure-Requests",
    "X-Content-Type-Options",
    "X-Download-Options",
    "X-Frame-Options",
    "X-Permitted-Cross-Domain-Policies",
    "X-Powered-By",
    "X-XSS-Protection",
    "Public-Key-Pins",
    "Public-Key-Pins-Report-Only",
    "Sec-WebSocket-Key",
    "Sec-WebSocket-Extensions",
    "Sec-WebSocket-Accept",
    "Sec-WebSocket-Protocol",
    "Sec-WebSocket-Version",
    "Sec-Fetch-Mode",
    "Sec-Fetch-Dest",
    "Sec-Fetch-Site",
    "Sec-Fetch-User",
    "Referrer-Policy",
    "Content-Type",
    "Content-Length",
    "Accept",
    "Accept-Encoding",
    "Host",
    "Connection",
    "Transfer-Encoding",
    "Upgrade",
    "P3P",
];

pub fn is_forbidden_header(name: &str) -> bool {
    let canon = HeaderMap::canonicalize(name);
    FORBIDDEN_HEADERS.iter().any(|h| *h == canon)
}

impl Modifier {
    /// Does this matching modifier admit `ctx`/`headers`/`method`? Returns
    /// `true` unconditionally for modifying modifiers, since they never
    /// gate the match.
    pub fn admits(&self, ctx: &RequestContext, headers: &HeaderMap, method: &str) -> bool {
        match self {
            Modifier::Domain(d) => d.allows(&ctx.site_host, &ctx.site_etld1),
            Modifier::Method(m) => m.allows(method),
            Modifier::ThirdParty(want) => ctx.is_third_party == *want,
            Modifier::Header(h) => h.allows(headers),
            Modifier::Document => {
                headers
                    .get("sec-fetch-dest")
                    .map(|v| v.eq_ignore_ascii_case("document"))
                    .unwrap_or(false)
                    && headers.get("sec-fetch-user").map(|v| v == "?1").unwrap_or(false)
            }
            _ => true,
        }
    }

    /// Structural equality used to decide whether an exception rule's
    /// modifier cancels a block rule's modifier of the same kind.
    pub fn cancels(&self, other: &Modifier) -> bool {
        match (self, other) {
            (Modifier::Domain(a), Modifier::Domain(b)) => a.cancels(b),
            (Modifier::Method(a), Modifier::Method(b)) => a.cancels(b),
            (Modifier::ThirdParty(a), Modifier::ThirdParty(b)) => a == b,
            (Modifier::Header(a), Modifier::Header(b)) => a == b,
            (Modifier::RemoveParam(a), Modifier::RemoveParam(b)) => a == b,
            (Modifier::RemoveHeader(a), Modifier::RemoveHeader(b)) => {
                a.eq_ignore_ascii_case(b)
            }
            (Modifier::SetHeader { name: n1, value: v1 }, Modifier::SetHeader { name: n2, value: v2 }) => {
                n1.eq_ignore_ascii_case(n2) && v1 == v2
            }
            (Modifier::JsonPrune(a), Modifier::JsonPrune(b)) => a == b,
            (Modifier::Csp(a), Modifier::Csp(b)) => a == b,
            // remove-js-constant cancellation is order-sensitive: the
            // constants must be named in the same sequence, not just the
            // same set.
            (Modifier::RemoveJsConstant(a), Modifier::RemoveJsConstant(b)) => a == b,
            (Modifier::All, Modifier::All) => true,
            (Modifier::Document, Modifier::Document) => true,
            _ => false,
        }
    }

    pub fn is_matching(&self) -> bool {
        matches!(
            self,
            Modifier::Domain(_)
                | Modifier::Method(_)
                | Modifier::ThirdParty(_)
                | Modifier::Header(_)
                | Modifier::Document
        )
    }
}

/// Does `exception_modifiers` cancel `regular_modifiers`? Per §3: an
/// exception cancels a regular rule iff the exception's *matching* modifiers
/// are a superset (per-modifier `cancels`-equality) of the regular rule's
/// *matching* modifiers — not set equality, and modifying modifiers never
/// participate. A bare `@@||tracker.com^$domain=app.com` (exception matching
/// set `{Domain}`) cancels plain `||tracker.com^` (regular matching set
/// `{}`), since `{} ⊆ {Domain}`.
pub fn modifier_sets_cancel(exception_modifiers: &[Modifier], regular_modifiers: &[Modifier]) -> bool {
    let exception_matching: Vec<&Modifier> = exception_modifiers.iter().filter(|m| m.is_matching()).collect();
    regular_modifiers
        .iter()
        .filter(|m| m.is_matching())
        .all(|m| exception_matching.iter().any(|e| m.cancels(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_set_parses_include_exclude() {
        let d = DomainSet::parse("example.com|~sub.example.com");
        assert!(d.allows("example.com", "example.com"));
        assert!(d.allows("www.example.com", "example.com"));
        assert!(!d.allows("sub.example.com", "example.com"));
        assert!(!d.allows("other.com", "other.com"));
    }

    #[test]
    fn domain_set_tld_wildcard_matches_any_tld_for_the_label() {
        let d = DomainSet::parse("google.*");
        assert!(d.allows("google.com", "google.com"));
        assert!(d.allows("www.google.co.uk", "google.co.uk"));
        assert!(!d.allows("evil-google.com", "evil-google.com"));
    }

    #[test]
    fn domain_set_regex_matches_against_host() {
        let d = DomainSet::parse(r"/^(.*\.)?ads\.example\.com$/");
        assert!(d.allows("ads.example.com", "example.com"));
        assert!(d.allows("x.ads.example.com", "example.com"));
        assert!(!d.allows("example.com", "example.com"));
    }

    #[test]
    fn domain_set_cancels_is_multiset_equality() {
        let a = DomainSet::parse("a.com|a.com|~b.com");
        let b = DomainSet::parse("a.com|~b.com|a.com");
        assert!(a.cancels(&b));
        let c = DomainSet::parse("a.com|~b.com");
        assert!(!a.cancels(&c));
    }

    #[test]
    fn method_set_cancels_is_set_equality() {
        let a = MethodSet::parse("GET|POST");
        let b = MethodSet::parse("POST|GET|GET");
        assert!(a.cancels(&b));
    }

    #[test]
    fn remove_js_constant_cancel_is_order_sensitive() {
        let a = Modifier::RemoveJsConstant(vec!["x".into(), "y".into()]);
        let b = Modifier::RemoveJsConstant(vec!["y".into(), "x".into()]);
        assert!(!a.cancels(&b));
        let c = Modifier::RemoveJsConstant(vec!["x".into(), "y".into()]);
        assert!(a.cancels(&c));
    }

    #[test]
    fn forbidden_headers_are_case_insensitive() {
        assert!(is_forbidden_header("content-length"));
        assert!(is_forbidden_header("x-frame-options"));
        assert!(!is_forbidden_header("X-Custom"));
    }

    #[test]
    fn document_modifier_admits_only_top_level_navigation() {
        let ctx_any = |request_type| RequestContext {
            url: "https://example.com/".into(),
            req_host: "example.com".into(),
            req_etld1: "example.com".into(),
            site_host: "example.com".into(),
            site_etld1: "example.com".into(),
            is_third_party: false,
            request_type,
            scheme: crate::types::SchemeMask::HTTPS,
        };
        let ctx = ctx_any(crate::types::RequestType::MAIN_FRAME);

        let mut nav_headers = HeaderMap::new();
        nav_headers.set("Sec-Fetch-Dest", "document");
        nav_headers.set("Sec-Fetch-User", "?1");
        assert!(Modifier::Document.admits(&ctx, &nav_headers, "GET"));

        let mut sub_headers = HeaderMap::new();
        sub_headers.set("Sec-Fetch-Dest", "document");
        assert!(!Modifier::Document.admits(&ctx, &sub_headers, "GET"));
        assert!(!Modifier::Document.admits(&ctx, &HeaderMap::new(), "GET"));
    }

    #[test]
    fn modifier_sets_cancel_when_equal() {
        let a = vec![Modifier::ThirdParty(true), Modifier::Method(MethodSet::parse("GET"))];
        let b = vec![Modifier::Method(MethodSet::parse("GET")), Modifier::ThirdParty(true)];
        assert!(modifier_sets_cancel(&a, &b));
    }

    #[test]
    fn exception_superset_cancels_regular_subset() {
        // `@@||tracker.com^$domain=app.com` (exception matching set
        // `{Domain}`) cancels plain `||tracker.com^` (regular matching set
        // `{}`): `{} ⊆ {Domain}`.
        let exception = vec![Modifier::Domain(DomainSet::parse("app.com"))];
        let regular: Vec<Modifier> = vec![];
        assert!(modifier_sets_cancel(&exception, &regular));
    }

    #[test]
    fn exception_subset_does_not_cancel_regular_superset() {
        let exception = vec![Modifier::ThirdParty(true)];
        let regular = vec![
            Modifier::ThirdParty(true),
            Modifier::Method(MethodSet::parse("GET")),
        ];
        assert!(!modifier_sets_cancel(&exception, &regular));
    }

    #[test]
    fn modifying_modifiers_are_ignored_by_cancellation() {
        let exception = vec![Modifier::RemoveParam(RemoveParamSpec::Name("utm_source".into()))];
        let regular: Vec<Modifier> = vec![];
        // Neither side carries a matching modifier, so the (empty) subset
        // relation holds regardless of the modifying modifiers present.
        assert!(modifier_sets_cancel(&exception, &regular));
    }
}

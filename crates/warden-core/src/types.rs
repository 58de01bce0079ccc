//! Shared type definitions used across the matching engine, modifier
//! engine, and response rewriter.

use std::borrow::Cow;
use std::collections::HashMap;

// =============================================================================
// Request types / party / scheme bit masks
// =============================================================================

bitflags::bitflags! {
    /// Resource-type bit mask, used by the OR-combined resource-type
    /// modifiers (`$script`, `$image`, ...).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestType: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUBDOCUMENT = 1 << 5;
        const MAIN_FRAME = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;
        const CSP_REPORT = 1 << 12;
        const BEACON = 1 << 13;
        const FETCH = 1 << 14;
        const SPECULATIVE = 1 << 15;

        const ALL = 0xFFFF;
        const DOCUMENT = Self::MAIN_FRAME.bits() | Self::SUBDOCUMENT.bits();
    }
}

impl RequestType {
    /// Parse from the proxy front-end's request-type string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "main_frame" | "document" => Self::MAIN_FRAME,
            "sub_frame" | "subdocument" => Self::SUBDOCUMENT,
            "stylesheet" => Self::STYLESHEET,
            "script" => Self::SCRIPT,
            "image" => Self::IMAGE,
            "font" => Self::FONT,
            "object" => Self::OBJECT,
            "xhr" | "xmlhttprequest" => Self::XMLHTTPREQUEST,
            "ping" | "beacon" => Self::PING,
            "csp_report" => Self::CSP_REPORT,
            "media" => Self::MEDIA,
            "websocket" => Self::WEBSOCKET,
            _ => Self::OTHER,
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SchemeMask: u8 {
        const HTTP = 1 << 0;
        const HTTPS = 1 << 1;
        const WS = 1 << 2;
        const WSS = 1 << 3;
        const DATA = 1 << 4;
        const FTP = 1 << 5;
        const ALL = 0xFF;
    }
}

bitflags::bitflags! {
    /// Per-rule behavior flags that aren't better modeled as modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RuleFlags: u16 {
        /// `$important` — a block wins even against an otherwise-cancelling
        /// exception rule.
        const IMPORTANT = 1 << 0;
        /// `$match-case` — pattern matching is case-sensitive.
        const MATCH_CASE = 1 << 1;
        /// Rule originated from the user (endpoint-installed or user list),
        /// not a subscribed filter list.
        const IS_USER_RULE = 1 << 2;
    }
}

// =============================================================================
// HTTP message model
// =============================================================================

/// A mutable HTTP request as seen by the core. The proxy front-end owns the
/// connection; the core only inspects and mutates this view.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    pub request_type: RequestType,
    /// Context/initiator hostname (the page that triggered the request).
    pub site_host: Option<String>,
}

impl HttpRequest {
    pub fn referer_host(&self) -> Option<String> {
        self.headers
            .get("referer")
            .and_then(|v| crate::url::extract_host(v).map(|h| h.to_ascii_lowercase()))
    }

    pub fn is_document(&self) -> bool {
        self.headers
            .get("sec-fetch-dest")
            .map(|v| v.eq_ignore_ascii_case("document"))
            .unwrap_or(false)
            && self
                .headers
                .get("sec-fetch-user")
                .map(|v| v == "?1")
                .unwrap_or(false)
    }
}

/// A mutable HTTP response as seen by the core.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Case-insensitive, order-preserving, multi-valued header map.
///
/// Keys are stored canonicalized (`Foo-Bar` form) so the forbidden-header
/// denylist and `removeheader`/`header` modifiers can compare names exactly
/// once, regardless of how the header arrived over the wire.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn canonicalize(name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        let mut start_of_word = true;
        for c in name.chars() {
            if c == '-' {
                out.push('-');
                start_of_word = true;
            } else if start_of_word {
                out.extend(c.to_uppercase());
                start_of_word = false;
            } else {
                out.extend(c.to_lowercase());
            }
        }
        out
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let canon = Self::canonicalize(name);
        self.entries.push((canon, value.into()));
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let canon = Self::canonicalize(name);
        self.entries.retain(|(k, _)| k != &canon);
        self.entries.push((canon, value.into()));
    }

    /// First value for `name`, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        let canon = Self::canonicalize(name);
        self.entries
            .iter()
            .find(|(k, _)| k == &canon)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, case-insensitive, in insertion order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        let canon = Self::canonicalize(name);
        self.entries
            .iter()
            .filter(move |(k, _)| k == &canon)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let canon = Self::canonicalize(name);
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != &canon);
        self.entries.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Media type from `Content-Type`, ignoring any `;charset=...` parameter.
    pub fn content_type_media(&self) -> Option<&str> {
        self.get("content-type")
            .map(|v| v.split(';').next().unwrap_or(v).trim())
    }

    /// Declared charset parameter of `Content-Type`, if any.
    pub fn content_type_charset(&self) -> Option<Cow<'_, str>> {
        let ct = self.get("content-type")?;
        for part in ct.split(';').skip(1) {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("charset=") {
                return Some(Cow::Owned(rest.trim_matches('"').to_ascii_lowercase()));
            }
        }
        None
    }
}

impl From<Vec<(String, String)>> for HeaderMap {
    fn from(entries: Vec<(String, String)>) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in entries {
            map.insert(&k, v);
        }
        map
    }
}

/// Context derived once per request, threaded through matching, modifier
/// application, and rewriting.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub url: String,
    pub req_host: String,
    pub req_etld1: String,
    pub site_host: String,
    pub site_etld1: String,
    pub is_third_party: bool,
    pub request_type: RequestType,
    pub scheme: SchemeMask,
}

impl RequestContext {
    pub fn build(psl: &crate::psl::PslEngine, req: &HttpRequest) -> Self {
        let req_host = crate::url::extract_host(&req.url).unwrap_or("").to_ascii_lowercase();
        let site_host = req
            .site_host
            .clone()
            .or_else(|| req.referer_host())
            .unwrap_or_else(|| req_host.clone());
        let req_etld1 = psl.etld1(&req_host);
        let site_etld1 = psl.etld1(&site_host);
        let is_third_party = req_etld1 != site_etld1;
        let scheme = crate::url::extract_scheme(&req.url).unwrap_or(SchemeMask::HTTP);

        Self {
            url: req.url.clone(),
            req_host,
            req_etld1,
            site_host,
            site_etld1,
            is_third_party,
            request_type: req.request_type,
            scheme,
        }
    }
}

// =============================================================================
// Decision outcomes (the wire surface from §6)
// =============================================================================

/// Outcome of `handle_request`.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// Nothing matched; forward the request unchanged.
    None,
    /// Synthesize and return this response instead of forwarding.
    Block(HttpResponse),
    /// Synthesize a redirect response instead of forwarding.
    Redirect(HttpResponse),
    /// The request was mutated in place (e.g. `removeparam`).
    Modified,
}

/// Outcome of `handle_response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    None,
    Modified,
}

/// Provenance of a matched rule, used for block-page headers and for
/// ordering modifier application by `(list_id, line_no)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleOrigin {
    pub list_id: u16,
    pub line_no: u32,
}

/// A logged rule identity, kept separate from `RuleOrigin` so callers can
/// carry a human-readable list name alongside the numeric id.
#[derive(Debug, Clone)]
pub struct RuleProvenance {
    pub origin: RuleOrigin,
    pub list_name: String,
    pub source_line: String,
}

/// Whether a rule blocks/redirects/modifies a request, or cancels one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Block,
    Allow,
}

/// A single parsed filter-list or hosts-format entry, ready for insertion
/// into a [`crate::tree::RuleTree`].
#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: RuleKind,
    pub resource_types: RequestType,
    pub scheme_mask: SchemeMask,
    pub modifiers: Vec<crate::modifiers::Modifier>,
    pub flags: RuleFlags,
    pub provenance: RuleProvenance,
    /// `$redirect=` target, for rules that swap in a substitute resource
    /// instead of an outright block.
    pub redirect_target: Option<String>,
}

impl Rule {
    /// A rule with at least one modifying modifier narrows or transforms
    /// the request/response rather than blocking it outright.
    pub fn is_modifying(&self) -> bool {
        self.modifiers.iter().any(|m| !m.is_matching())
    }

    pub fn modifying_modifiers(&self) -> impl Iterator<Item = &crate::modifiers::Modifier> {
        self.modifiers.iter().filter(|m| !m.is_matching())
    }

    pub fn matching_modifiers(&self) -> impl Iterator<Item = &crate::modifiers::Modifier> {
        self.modifiers.iter().filter(|m| m.is_matching())
    }
}

pub type ListId = u16;

/// Names of enabled filter lists, indexed by `list_id`, for block-page
/// `X-Block-List` headers and logging. Kept outside the rule tree so the
/// tree's leaves stay small.
#[derive(Debug, Clone, Default)]
pub struct ListNames(HashMap<ListId, String>);

impl ListNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ListId, name: impl Into<String>) {
        self.0.insert(id, name.into());
    }

    pub fn get(&self, id: ListId) -> Option<&str> {
        self.0.get(&id).map(|s| s.as_str())
    }
}

/// Hosts-format block list (§4.8): `0.0.0.0 host` / `127.0.0.1 host` lines
/// from a hosts file, unioned across every enabled list. Unlike
/// [`crate::hostmatch::HostMatcher`] this is exact-match only — a hosts
/// file entry for `ads.example.com` does not implicitly block
/// `sub.ads.example.com`.
#[derive(Debug, Clone, Default)]
pub struct HostsMap(HashMap<String, RuleProvenance>);

impl HostsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a host entry, keeping whichever provenance sorts first by
    /// `(list_id, line_no)` if the same host appears in more than one list.
    pub fn insert(&mut self, host: String, provenance: RuleProvenance) {
        match self.0.get(&host) {
            Some(existing) if existing.origin <= provenance.origin => {}
            _ => {
                self.0.insert(host, provenance);
            }
        }
    }

    pub fn get(&self, host: &str) -> Option<&RuleProvenance> {
        self.0.get(host)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod hosts_map_tests {
    use super::*;

    fn prov(list_id: u16, line_no: u32) -> RuleProvenance {
        RuleProvenance {
            origin: RuleOrigin { list_id, line_no },
            list_name: "hosts".to_string(),
            source_line: "0.0.0.0 ads.example.com".to_string(),
        }
    }

    #[test]
    fn exact_match_only_no_subdomain_inheritance() {
        let mut map = HostsMap::new();
        map.insert("ads.example.com".to_string(), prov(0, 1));
        assert!(map.get("ads.example.com").is_some());
        assert!(map.get("sub.ads.example.com").is_none());
    }

    #[test]
    fn earliest_provenance_wins_on_duplicate_host() {
        let mut map = HostsMap::new();
        map.insert("ads.example.com".to_string(), prov(1, 5));
        map.insert("ads.example.com".to_string(), prov(0, 9));
        assert_eq!(map.get("ads.example.com").unwrap().origin, RuleOrigin { list_id: 0, line_no: 9 });
    }
}

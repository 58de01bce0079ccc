//! Filter-list line classification and per-line parsing (§4.8).
//!
//! One line in, one [`ParsedLine`] out. Dispatch order mirrors the
//! reference parser's shape check cascade: hosts-format first (since it's
//! the cheapest and most specific shape), then the cosmetic separators
//! (`#%#`, `#?#`, the json-prune call form), with the network-rule branch
//! as the default for everything else. A line that can't be classified into
//! any recognized shape at all (truly malformed syntax) comes back as
//! `ParsedLine::Error`; the caller counts and logs it but keeps going — a
//! single bad line must never abort ingestion of the rest of the list.

use std::net::IpAddr;

use warden_core::jsonprune::JsonPruneSpec;
use warden_core::modifiers::{
    is_forbidden_header, DomainSet, HeaderMatch, MethodSet, Modifier, RemoveParamSpec,
};
use warden_core::types::{RequestType, RuleFlags, RuleKind, SchemeMask};

/// Hostnames sentinel-ignored on a hosts-format line (§4.8 supplement):
/// loopback aliases and the sentinel IPs mapped to themselves are never
/// installed as blocking entries.
const IGNORED_HOSTS: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "0.0.0.0",
    "127.0.0.1",
];

/// A hostname-pattern list as it appears before `#%#`/`#?#`/`##` separators:
/// a comma-separated list of patterns, each optionally `~`-negated, with
/// `*` meaning "every host". Positive entries are primary; negated entries
/// are exceptions scoped to that one cosmetic value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPatternList {
    pub universal: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl HostPatternList {
    pub fn parse(text: &str) -> Self {
        let mut list = HostPatternList::default();
        for raw in text.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            if raw == "*" {
                list.universal = true;
                continue;
            }
            match raw.strip_prefix('~') {
                Some(host) => list.exclude.push(host.trim().to_ascii_lowercase()),
                None => list.include.push(raw.to_ascii_lowercase()),
            }
        }
        list
    }
}

/// A fully parsed network-rule line, still missing the provenance
/// (`list_id`/`line_no`) that only the builder — which knows which list and
/// which line it's ingesting — can attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkLine {
    pub kind: RuleKind,
    pub pattern: String,
    pub resource_types: RequestType,
    pub scheme_mask: SchemeMask,
    pub modifiers: Vec<Modifier>,
    pub flags: RuleFlags,
    pub redirect_target: Option<String>,
    /// `$badfilter`: cancels the exact textual duplicate of this rule (sans
    /// the `badfilter` option itself) found anywhere in the aggregate rule
    /// set, at build time (§3 supplement). Never reaches the live tree as
    /// an ordinary rule.
    pub is_badfilter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Blank, comment, or `[Adblock Plus 2.0]`-style header line.
    Skip,
    Network(NetworkLine),
    /// `0.0.0.0`/`127.0.0.1`-format line naming one or more hosts.
    Hosts(Vec<String>),
    Scriptlet {
        hosts: HostPatternList,
        exception: bool,
        call: warden_core::cosmetic::ScriptletCall,
    },
    JsRule {
        hosts: HostPatternList,
        exception: bool,
        body: String,
    },
    ExtCss {
        hosts: HostPatternList,
        exception: bool,
        selector: String,
    },
    JsonPrune {
        hosts: HostPatternList,
        spec: JsonPruneSpec,
    },
    /// Line matched a recognized shape but failed to parse within it (e.g.
    /// an unknown `$modifier`, a malformed `domain=` list, an unparsable
    /// scriptlet call).
    Error(String),
}

/// Classify and parse one already-trimmed, non-empty line.
pub fn parse_line(line: &str) -> ParsedLine {
    if is_comment_line(line) {
        return ParsedLine::Skip;
    }

    if let Some(hosts) = parse_hosts_line(line) {
        return if hosts.is_empty() {
            ParsedLine::Skip
        } else {
            ParsedLine::Hosts(hosts)
        };
    }

    if let Some(parsed) = parse_cosmetic_line(line) {
        return parsed;
    }

    parse_network_line(line)
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || line.starts_with('#')
}

fn parse_hosts_line(line: &str) -> Option<Vec<String>> {
    let mut parts = line.split('#').next().unwrap_or(line).split_whitespace();
    let first = parts.next()?;
    if first.parse::<IpAddr>().is_err() {
        return None;
    }
    if first != "0.0.0.0" && first != "127.0.0.1" {
        return None;
    }

    let hosts: Vec<String> = parts
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty() && !IGNORED_HOSTS.contains(&h.as_str()))
        .collect();
    Some(hosts)
}

/// Dispatch the cosmetic-rule separators: `#%#` (scriptlet or raw JS),
/// `#@%#` (JS exception), `#?#`/`#@?#` (extended CSS), and the
/// `...json-prune(...)` call form, which piggybacks on the `#%#` separator
/// with a recognizable call name.
fn parse_cosmetic_line(line: &str) -> Option<ParsedLine> {
    for (sep, exception) in [("#@%#", true), ("#%#", false)] {
        if let Some((host_part, body)) = line.split_once(sep) {
            if host_part.chars().any(|c| c == '#' || c == '$') {
                continue;
            }
            let hosts = HostPatternList::parse(host_part);
            let body = body.trim();
            if let Some(spec) = parse_json_prune_call(body) {
                return Some(ParsedLine::JsonPrune { hosts, spec });
            }
            if let Some(call) = warden_core::cosmetic::ScriptletCall::parse(body) {
                return Some(ParsedLine::Scriptlet { hosts, exception, call });
            }
            if body.is_empty() {
                return Some(ParsedLine::Error(format!("empty {sep} body")));
            }
            return Some(ParsedLine::JsRule { hosts, exception, body: body.to_string() });
        }
    }

    for (sep, exception) in [("#@?#", true), ("#?#", false)] {
        if let Some((host_part, selector)) = line.split_once(sep) {
            if host_part.chars().any(|c| c == '#' || c == '$') {
                continue;
            }
            let hosts = HostPatternList::parse(host_part);
            let selector = selector.trim();
            if selector.is_empty() {
                return Some(ParsedLine::Error("empty extended-CSS selector".to_string()));
            }
            return Some(ParsedLine::ExtCss { hosts, exception, selector: selector.to_string() });
        }
    }

    // Generic-only cosmetic hiding rules (`##`/`#@#`) carry no JS/CSS
    // payload the core needs to act on beyond "don't treat this as a
    // network pattern" — the core's scope is the injection/CSP protocol,
    // not reproducing a cosmetic-hiding stylesheet engine (distilled §1
    // non-goal). Recognize and skip them rather than misparsing as network.
    for sep in ["#@#", "##"] {
        if let Some((host_part, _selector)) = line.split_once(sep) {
            if !host_part.chars().any(|c| c == '#' || c == '$') {
                return Some(ParsedLine::Skip);
            }
        }
    }

    None
}

/// `<hostpat>#%#//json-prune('path.one', 'path.two')`-shaped call form,
/// recognized before the generic scriptlet-call parse so it doesn't get
/// mistaken for an arbitrary scriptlet named `json-prune`.
fn parse_json_prune_call(body: &str) -> Option<JsonPruneSpec> {
    let inner = body.strip_prefix("//json-prune(")?.strip_suffix(')')?;
    let args: Vec<String> = split_unquoted_commas(inner)
        .into_iter()
        .filter_map(|raw| unquote(raw.trim()))
        .collect();
    if args.is_empty() {
        return None;
    }
    Some(JsonPruneSpec::parse(&args.join(" ")))
}

fn split_unquoted_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let bytes = s.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(q) => {
                if b == q && (i == 0 || bytes[i - 1] != b'\\') {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b',' => {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&s[start..]);
    parts
}

fn unquote(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'\'' || bytes[0] == b'"') && bytes[bytes.len() - 1] == bytes[0] {
        Some(s[1..s.len() - 1].to_string())
    } else {
        None
    }
}

fn parse_network_line(line: &str) -> ParsedLine {
    let (kind, rest) = match line.strip_prefix("@@") {
        Some(rest) => (RuleKind::Allow, rest),
        None => (RuleKind::Block, line),
    };

    let (pattern_part, options_text) = split_unescaped(rest, '$');
    let pattern = pattern_part.to_string();

    let options = match options_text {
        Some(text) => match parse_modifier_list(text) {
            Ok(opts) => opts,
            Err(e) => return ParsedLine::Error(e),
        },
        None => ParsedOptions::default(),
    };

    ParsedLine::Network(NetworkLine {
        kind,
        pattern,
        resource_types: options.resource_types,
        scheme_mask: options.scheme_mask,
        modifiers: options.modifiers,
        flags: options.flags,
        redirect_target: options.redirect_target,
        is_badfilter: options.is_badfilter,
    })
}

/// Split on the first unescaped occurrence of `sep`; `\$`/`\,` escape past
/// a literal separator without being emitted as a backslash in the output.
fn split_unescaped(s: &str, sep: char) -> (String, Option<String>) {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            if let Some(&(_, next)) = chars.peek() {
                if next == sep || next == '\\' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
            out.push(c);
            continue;
        }
        if c == sep {
            return (out, Some(s[i + c.len_utf8()..].to_string()));
        }
        out.push(c);
    }
    (out, None)
}

#[derive(Default)]
struct ParsedOptions {
    resource_types: RequestType,
    scheme_mask: SchemeMask,
    modifiers: Vec<Modifier>,
    flags: RuleFlags,
    redirect_target: Option<String>,
    is_badfilter: bool,
}

fn parse_modifier_list(text: &str) -> Result<ParsedOptions, String> {
    let mut opts = ParsedOptions::default();
    let mut type_include = RequestType::empty();
    let mut type_exclude = RequestType::empty();
    let mut scheme_include = SchemeMask::empty();
    let mut scheme_exclude = SchemeMask::empty();

    for raw in split_on_unescaped_commas(text) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (negated, name) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let lower = name.to_ascii_lowercase();

        if lower == "badfilter" {
            opts.is_badfilter = true;
            continue;
        }
        if lower == "important" {
            opts.flags |= RuleFlags::IMPORTANT;
            continue;
        }
        if lower == "match-case" || lower == "match_case" {
            opts.flags |= RuleFlags::MATCH_CASE;
            continue;
        }
        if lower == "document" || lower == "doc" {
            opts.modifiers.push(Modifier::Document);
            continue;
        }
        if lower == "all" {
            opts.modifiers.push(Modifier::All);
            continue;
        }
        if lower == "third-party" || lower == "3p" {
            opts.modifiers.push(Modifier::ThirdParty(!negated));
            continue;
        }
        if lower == "first-party" || lower == "1p" {
            opts.modifiers.push(Modifier::ThirdParty(negated));
            continue;
        }

        if let Some(value) = strip_kv(name, "domain=") {
            validate_mixed_inversion(value, "domain")?;
            opts.modifiers.push(Modifier::Domain(DomainSet::parse(value)));
            continue;
        }
        if let Some(value) = strip_kv(name, "method=") {
            validate_mixed_inversion(value, "method")?;
            opts.modifiers.push(Modifier::Method(MethodSet::parse(value)));
            continue;
        }
        if let Some(value) = strip_kv(name, "header=") {
            opts.modifiers.push(Modifier::Header(HeaderMatch::parse(value)));
            continue;
        }
        // `setheader=Name:Value` is the modifying counterpart to the
        // `header=` matching modifier above: it always carries a literal
        // value (never a regex) and always targets the response, so it
        // gets its own keyword rather than overloading `header=`'s shape.
        if let Some(value) = strip_kv(name, "setheader=") {
            let Some((header_name, header_value)) = value.split_once(':') else {
                return Err(format!("setheader= missing ':' in '{value}'"));
            };
            let header_name = header_name.trim();
            if is_forbidden_header(header_name) {
                return Err(format!("setheader targets forbidden header '{header_name}'"));
            }
            opts.modifiers.push(Modifier::SetHeader {
                name: header_name.to_string(),
                value: header_value.trim().to_string(),
            });
            continue;
        }
        if let Some(value) = strip_kv(name, "removeparam=") {
            let spec = if let Some(re) = value.strip_prefix('/').and_then(|v| v.strip_suffix('/')) {
                RemoveParamSpec::Regex(re.to_string())
            } else {
                RemoveParamSpec::Name(value.to_string())
            };
            opts.modifiers.push(Modifier::RemoveParam(spec));
            continue;
        }
        if lower == "removeparam" {
            opts.modifiers.push(Modifier::RemoveParam(RemoveParamSpec::All));
            continue;
        }
        if let Some(value) = strip_kv(name, "removeheader=") {
            let (target, header_name) = match value.strip_prefix("request:") {
                Some(rest) => (HeaderTarget::Request, rest),
                None => (HeaderTarget::Response, value),
            };
            if is_forbidden_header(header_name) {
                return Err(format!("removeheader targets forbidden header '{header_name}'"));
            }
            let prefixed = match target {
                HeaderTarget::Request => format!("request:{header_name}"),
                HeaderTarget::Response => header_name.to_string(),
            };
            opts.modifiers.push(Modifier::RemoveHeader(prefixed));
            continue;
        }
        if let Some(value) = strip_kv(name, "jsonprune=") {
            opts.modifiers.push(Modifier::JsonPrune(JsonPruneSpec::parse(value)));
            continue;
        }
        if let Some(value) = strip_kv(name, "csp=") {
            opts.modifiers.push(Modifier::Csp(value.to_string()));
            continue;
        }
        if let Some(value) = strip_kv(name, "remove-js-constant=") {
            let names = value.split('|').filter(|s| !s.is_empty()).map(str::to_string).collect();
            opts.modifiers.push(Modifier::RemoveJsConstant(names));
            continue;
        }
        if let Some(value) = strip_kv(name, "redirect=").or_else(|| strip_kv(name, "redirect-rule=")) {
            if !value.is_empty() {
                opts.redirect_target = Some(value.to_string());
            }
            continue;
        }

        if let Some(mask) = resource_type_mask(&lower) {
            if negated {
                type_exclude |= mask;
            } else {
                type_include |= mask;
            }
            continue;
        }
        if let Some(mask) = scheme_mask_for(&lower) {
            if negated {
                scheme_exclude |= mask;
            } else {
                scheme_include |= mask;
            }
            continue;
        }

        return Err(format!("unknown modifier '{raw}'"));
    }

    opts.resource_types = finalize_mask(type_include, type_exclude, RequestType::ALL);
    opts.scheme_mask = finalize_mask(scheme_include, scheme_exclude, SchemeMask::ALL);

    Ok(opts)
}

enum HeaderTarget {
    Request,
    Response,
}

/// A bare `$script,image` narrows to the OR of named types; an absent or
/// all-negated list defaults to every type, minus whatever was excluded.
fn finalize_mask<T>(include: T, exclude: T, all: T) -> T
where
    T: std::ops::BitAnd<Output = T> + std::ops::Not<Output = T> + Copy + PartialEq + Default,
{
    let base = if include == T::default() { all } else { include };
    base & !exclude
}

fn strip_kv<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let lower_prefix_len = prefix.len();
    if name.len() >= lower_prefix_len && name[..lower_prefix_len].eq_ignore_ascii_case(prefix) {
        Some(&name[lower_prefix_len..])
    } else {
        None
    }
}

/// `domain=`/`method=` forbid mixing negated and non-negated entries in the
/// same list (§4.4).
fn validate_mixed_inversion(value: &str, modifier_name: &str) -> Result<(), String> {
    let mut saw_positive = false;
    let mut saw_negative = false;
    for part in value.split('|').filter(|p| !p.is_empty()) {
        if part.starts_with('~') {
            saw_negative = true;
        } else {
            saw_positive = true;
        }
    }
    if saw_positive && saw_negative {
        Err(format!("{modifier_name}= mixes negated and non-negated entries"))
    } else {
        Ok(())
    }
}

fn split_on_unescaped_commas(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == ',' || next == '$' {
                    current.push(next);
                    chars.next();
                    continue;
                }
            }
            current.push(c);
            continue;
        }
        if c == ',' {
            parts.push(std::mem::take(&mut current));
            continue;
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn resource_type_mask(name: &str) -> Option<RequestType> {
    Some(match name {
        "script" => RequestType::SCRIPT,
        "image" => RequestType::IMAGE,
        "stylesheet" => RequestType::STYLESHEET,
        "object" => RequestType::OBJECT,
        "subdocument" => RequestType::SUBDOCUMENT,
        "xhr" | "xmlhttprequest" => RequestType::XMLHTTPREQUEST,
        "font" => RequestType::FONT,
        "media" => RequestType::MEDIA,
        "other" => RequestType::OTHER,
        "ping" => RequestType::PING,
        "websocket" => RequestType::WEBSOCKET,
        "beacon" => RequestType::BEACON,
        "fetch" => RequestType::FETCH,
        "csp_report" => RequestType::CSP_REPORT,
        _ => return None,
    })
}

fn scheme_mask_for(name: &str) -> Option<SchemeMask> {
    Some(match name {
        "http" => SchemeMask::HTTP,
        "https" => SchemeMask::HTTPS,
        "ws" => SchemeMask::WS,
        "wss" => SchemeMask::WSS,
        "data" => SchemeMask::DATA,
        "ftp" => SchemeMask::FTP,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_headers() {
        assert_eq!(parse_line("! a comment"), ParsedLine::Skip);
        assert_eq!(parse_line("[Adblock Plus 2.0]"), ParsedLine::Skip);
        assert_eq!(parse_line(""), ParsedLine::Skip);
    }

    #[test]
    fn hosts_format_line_lists_hosts_and_skips_loopback_aliases() {
        match parse_line("0.0.0.0 ads.example.com tracker.example.net") {
            ParsedLine::Hosts(hosts) => {
                assert_eq!(hosts, vec!["ads.example.com", "tracker.example.net"]);
            }
            other => panic!("expected Hosts, got {other:?}"),
        }
        assert_eq!(parse_line("0.0.0.0 localhost"), ParsedLine::Skip);
        assert_eq!(parse_line("127.0.0.1 127.0.0.1"), ParsedLine::Skip);
    }

    #[test]
    fn exception_network_rule_strips_prefix() {
        match parse_line("@@||tracker.com^$domain=app.com") {
            ParsedLine::Network(n) => {
                assert_eq!(n.kind, RuleKind::Allow);
                assert_eq!(n.pattern, "||tracker.com^");
                assert_eq!(n.modifiers.len(), 1);
            }
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn plain_network_rule_with_no_modifiers() {
        match parse_line("/banner/img") {
            ParsedLine::Network(n) => {
                assert_eq!(n.kind, RuleKind::Block);
                assert_eq!(n.pattern, "/banner/img");
                assert!(n.modifiers.is_empty());
                assert_eq!(n.resource_types, RequestType::ALL);
            }
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn resource_type_modifier_narrows_mask() {
        match parse_line("||ads.example.com^$script,image") {
            ParsedLine::Network(n) => {
                assert_eq!(n.resource_types, RequestType::SCRIPT | RequestType::IMAGE);
            }
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn negated_resource_type_excludes_from_all() {
        match parse_line("||ads.example.com^$~xhr") {
            ParsedLine::Network(n) => {
                assert!(!n.resource_types.contains(RequestType::XMLHTTPREQUEST));
                assert!(n.resource_types.contains(RequestType::SCRIPT));
            }
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn badfilter_flag_is_recognized_without_becoming_a_modifier() {
        match parse_line("||ads.example.com^$badfilter") {
            ParsedLine::Network(n) => {
                assert!(n.is_badfilter);
                assert!(n.modifiers.is_empty());
            }
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn important_flag_is_set() {
        match parse_line("||ads.example.com^$important") {
            ParsedLine::Network(n) => assert!(n.flags.contains(RuleFlags::IMPORTANT)),
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn mixed_domain_inversion_is_a_parse_error() {
        match parse_line("||ads.example.com^$domain=a.com|~b.com") {
            ParsedLine::Error(_) => {}
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_modifier_is_a_parse_error() {
        match parse_line("||ads.example.com^$not-a-real-modifier") {
            ParsedLine::Error(_) => {}
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn removeheader_rejects_forbidden_header() {
        match parse_line("||ads.example.com^$removeheader=Content-Type") {
            ParsedLine::Error(msg) => assert!(msg.contains("forbidden")),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn removeheader_request_prefix_is_preserved() {
        match parse_line("||ads.example.com^$removeheader=request:X-Tracking-Id") {
            ParsedLine::Network(n) => {
                assert_eq!(n.modifiers[0], Modifier::RemoveHeader("request:X-Tracking-Id".to_string()));
            }
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn escaped_comma_and_dollar_in_domain_list_are_preserved() {
        match parse_line(r"||ads.example.com^$domain=a\,b.com") {
            ParsedLine::Network(n) => {
                let Modifier::Domain(set) = &n.modifiers[0] else {
                    panic!("expected Domain modifier")
                };
                assert!(set.allows("a,b.com", "a,b.com"));
                assert!(!set.allows("other.com", "other.com"));
            }
            other => panic!("expected Network, got {other:?}"),
        }
    }

    #[test]
    fn scriptlet_rule_parses_host_pattern_and_call() {
        match parse_line("example.com,~sub.example.com#%#//scriptlet('prevent-xhr', 'json')") {
            ParsedLine::Scriptlet { hosts, exception, call } => {
                assert!(!exception);
                assert_eq!(hosts.include, vec!["example.com".to_string()]);
                assert_eq!(hosts.exclude, vec!["sub.example.com".to_string()]);
                assert_eq!(call.name, "prevent-xhr");
            }
            other => panic!("expected Scriptlet, got {other:?}"),
        }
    }

    #[test]
    fn universal_host_pattern_scriptlet() {
        match parse_line("*#%#//scriptlet('prevent-xhr')") {
            ParsedLine::Scriptlet { hosts, .. } => assert!(hosts.universal),
            other => panic!("expected Scriptlet, got {other:?}"),
        }
    }

    #[test]
    fn raw_js_rule_when_body_is_not_a_scriptlet_call() {
        match parse_line("example.com#%#window.foo = 1;") {
            ParsedLine::JsRule { body, exception, .. } => {
                assert!(!exception);
                assert_eq!(body, "window.foo = 1;");
            }
            other => panic!("expected JsRule, got {other:?}"),
        }
    }

    #[test]
    fn js_rule_exception_uses_at_percent_separator() {
        match parse_line("example.com#@%#window.foo = 1;") {
            ParsedLine::JsRule { exception, .. } => assert!(exception),
            other => panic!("expected JsRule, got {other:?}"),
        }
    }

    #[test]
    fn extended_css_rule_and_exception() {
        match parse_line("example.com#?#div:has-text(Ad)") {
            ParsedLine::ExtCss { exception, selector, .. } => {
                assert!(!exception);
                assert_eq!(selector, "div:has-text(Ad)");
            }
            other => panic!("expected ExtCss, got {other:?}"),
        }
        match parse_line("example.com#@?#div:has-text(Ad)") {
            ParsedLine::ExtCss { exception, .. } => assert!(exception),
            other => panic!("expected ExtCss, got {other:?}"),
        }
    }

    #[test]
    fn json_prune_call_form() {
        match parse_line("api.example.com#%#//json-prune('ads.tracker', 'meta.debug')") {
            ParsedLine::JsonPrune { spec, .. } => assert_eq!(spec.paths.len(), 2),
            other => panic!("expected JsonPrune, got {other:?}"),
        }
    }

    #[test]
    fn generic_cosmetic_hiding_rule_is_skipped() {
        assert_eq!(parse_line("example.com##.ad-banner"), ParsedLine::Skip);
        assert_eq!(parse_line("example.com#@#.ad-banner"), ParsedLine::Skip);
    }
}

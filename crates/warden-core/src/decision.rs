//! Request/response decision orchestration (§6): wires the rule tree,
//! modifier engine, and response synthesis together into the two entry
//! points a proxy front-end actually calls.

use crate::cosmetic::CosmeticStore;
use crate::jsconst::remove_js_constants;
use crate::jsonprune::JsonPruneSpec;
use crate::modifiers::{modifier_sets_cancel, Modifier, RemoveParamSpec};
use crate::psl::PslEngine;
use crate::response::{build_block_response, build_redirect_response};
use crate::rewrite::html as html_rewrite;
use crate::tree::RuleTree;
use crate::types::{
    HostsMap, HttpRequest, HttpResponse, ListId, ListNames, RequestContext, RequestOutcome,
    ResponseOutcome, Rule, RuleKind,
};

/// All compiled rule data for one filtering pass. Built once per process
/// (or per filter-list reload), then read-only for the lifetime of every
/// request handled against it.
pub struct RuleStore {
    network: RuleTree<u32>,
    rules: Vec<Rule>,
    list_names: ListNames,
    hosts: HostsMap,
    cosmetics: CosmeticStore,
}

impl RuleStore {
    pub fn new(network: RuleTree<u32>, rules: Vec<Rule>, list_names: ListNames) -> Self {
        Self {
            network,
            rules,
            list_names,
            hosts: HostsMap::new(),
            cosmetics: CosmeticStore::new(),
        }
    }

    pub fn with_hosts(mut self, hosts: HostsMap) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_cosmetics(mut self, cosmetics: CosmeticStore) -> Self {
        self.cosmetics = cosmetics;
        self
    }

    /// Index `rule` into the network tree under `pattern` and register its
    /// list name. Used both by the bulk filter-list builder (`warden-rules`)
    /// and by the loopback `/allow-rule`/`/unblock` endpoints to install one
    /// exception rule into the live store after the initial build — the
    /// caller is responsible for serializing concurrent calls (§5's "single
    /// writer lock" during mutation; reads stay lock-free).
    pub fn insert_rule(&mut self, pattern: &str, rule: Rule) {
        let id = self.rules.len() as u32;
        self.rules.push(rule);
        self.network.insert(pattern, id);
    }

    pub fn insert_host(&mut self, host: String, provenance: crate::types::RuleProvenance) {
        self.hosts.insert(host, provenance);
    }

    pub fn register_list_name(&mut self, id: ListId, name: impl Into<String>) {
        self.list_names.insert(id, name);
    }

    pub fn cosmetics_mut(&mut self) -> &mut CosmeticStore {
        &mut self.cosmetics
    }

    fn candidates(&self, url: &str) -> Vec<&Rule> {
        let mut seen = std::collections::HashSet::new();
        self.network
            .find(url)
            .into_iter()
            .filter(|idx| seen.insert(**idx))
            .map(|idx| &self.rules[*idx as usize])
            .collect()
    }

    pub fn list_name(&self, id: ListId) -> &str {
        self.list_names.get(id).unwrap_or("unknown")
    }
}

fn admitted<'a>(candidates: &[&'a Rule], ctx: &RequestContext, req: &HttpRequest) -> Vec<&'a Rule> {
    candidates
        .iter()
        .copied()
        .filter(|r| r.resource_types.intersects(ctx.request_type))
        .filter(|r| r.scheme_mask.intersects(ctx.scheme))
        .filter(|r| r.matching_modifiers().all(|m| m.admits(ctx, &req.headers, &req.method)))
        .collect()
}

/// Sort candidates by `(list_id, line_no)` ascending (§4.5's resolved
/// modifier-ordering open question).
fn by_provenance_order(rules: &mut [&Rule]) {
    rules.sort_by_key(|r| r.provenance.origin);
}

/// `$important` is the one deliberate exception to exception monotonicity
/// (§3 supplement): it makes a blocking rule win even against an exception
/// that would otherwise cancel it.
fn is_cancelled(rule: &Rule, allows: &[&Rule]) -> bool {
    if rule.flags.contains(crate::types::RuleFlags::IMPORTANT) {
        return false;
    }
    allows
        .iter()
        .any(|a| modifier_sets_cancel(&a.modifiers, &rule.modifiers))
}

/// Handle an outgoing request. Returns what the caller should do instead
/// of (or in addition to) forwarding it unchanged.
pub fn handle_request(store: &RuleStore, psl: &PslEngine, req: &mut HttpRequest) -> RequestOutcome {
    let ctx = RequestContext::build(psl, req);

    if let Some(provenance) = store.hosts.get(&ctx.req_host) {
        let list_name = store.list_name(provenance.origin.list_id);
        return RequestOutcome::Block(build_block_response(provenance, list_name));
    }

    let candidates = store.candidates(&ctx.url);
    let admitted = admitted(&candidates, &ctx, req);

    let (allows, blocks): (Vec<&Rule>, Vec<&Rule>) =
        admitted.into_iter().partition(|r| r.kind == RuleKind::Allow);

    let mut plain_blocks: Vec<&Rule> = Vec::new();
    let mut modifying_blocks: Vec<&Rule> = Vec::new();
    for b in blocks {
        if is_cancelled(b, &allows) {
            continue;
        }
        if b.is_modifying() {
            modifying_blocks.push(b);
        } else {
            plain_blocks.push(b);
        }
    }

    if !plain_blocks.is_empty() {
        by_provenance_order(&mut plain_blocks);
        let winner = plain_blocks[0];
        let provenance = &winner.provenance;
        let list_name = store.list_name(provenance.origin.list_id);
        return match &winner.redirect_target {
            Some(target) => RequestOutcome::Redirect(build_redirect_response(target, provenance, list_name)),
            None => RequestOutcome::Block(build_block_response(provenance, list_name)),
        };
    }

    if modifying_blocks.is_empty() {
        return RequestOutcome::None;
    }

    by_provenance_order(&mut modifying_blocks);
    let mut changed = false;
    for rule in modifying_blocks {
        for modifier in rule.modifying_modifiers() {
            changed |= apply_request_modifier(modifier, req);
        }
    }

    if changed {
        RequestOutcome::Modified
    } else {
        RequestOutcome::None
    }
}

fn apply_request_modifier(modifier: &Modifier, req: &mut HttpRequest) -> bool {
    match modifier {
        Modifier::RemoveParam(spec) => {
            let predicate: Box<dyn Fn(&str) -> bool> = match spec {
                RemoveParamSpec::All => Box::new(|_: &str| true),
                RemoveParamSpec::Name(name) => {
                    let name = name.clone();
                    Box::new(move |k: &str| k == name)
                }
                RemoveParamSpec::Regex(pattern) => match regex::Regex::new(pattern) {
                    Ok(re) => Box::new(move |k: &str| re.is_match(k)),
                    Err(_) => Box::new(|_: &str| false),
                },
            };
            match crate::url::remove_query_params(&req.url, &*predicate) {
                Some(new_url) => {
                    req.url = new_url;
                    true
                }
                None => false,
            }
        }
        // `removeheader=request:Name` targets the request; the bare
        // `removeheader=Name` form targets the response and is handled in
        // `handle_response` instead.
        Modifier::RemoveHeader(name) => match name.strip_prefix("request:") {
            Some(header) if !crate::modifiers::is_forbidden_header(header) => {
                req.headers.remove(header)
            }
            _ => false,
        },
        _ => false,
    }
}

const CSP_HEADER: &str = "Content-Security-Policy";
const CSP_REPORT_ONLY_HEADER: &str = "Content-Security-Policy-Report-Only";

/// Handle an incoming response body/headers for the same request context
/// `handle_request` already evaluated: applies per-rule modifying modifiers
/// (§4.4), then the host-scoped cosmetic injection pass (§4.5 step 3) —
/// scriptlets, raw JS rules, and extended-CSS selectors into HTML bodies,
/// JSON-prune specs into JSON bodies. A nonce is generated and threaded
/// through both the CSP header(s) and any `<meta>` CSP tags only if
/// cosmetic injection actually has something to splice into this response.
pub fn handle_response(
    store: &RuleStore,
    psl: &PslEngine,
    req: &HttpRequest,
    resp: &mut HttpResponse,
) -> ResponseOutcome {
    let ctx = RequestContext::build(psl, req);
    let candidates = store.candidates(&ctx.url);
    let admitted = admitted(&candidates, &ctx, req);
    let (allows, blocks): (Vec<&Rule>, Vec<&Rule>) =
        admitted.into_iter().partition(|r| r.kind == RuleKind::Allow);

    let mut modifying: Vec<&Rule> = blocks
        .into_iter()
        .filter(|b| !is_cancelled(b, &allows) && b.is_modifying())
        .collect();
    by_provenance_order(&mut modifying);

    let mut changed = false;
    let is_html = resp.headers.content_type_media() == Some("text/html");

    let bundle = store.cosmetics.bundle_for(&ctx.req_host);
    let json_prune_rules = store.cosmetics.json_prune_for(&ctx.req_host);
    let wants_js_const_removal = is_html
        && modifying
            .iter()
            .flat_map(|r| r.modifying_modifiers())
            .any(|m| matches!(m, Modifier::RemoveJsConstant(_)));

    // Only pay for decompression/charset-decoding when a body rewrite is
    // actually going to happen; a response with no matching cosmetics and
    // no `$remove-js-constant` rule is forwarded exactly as received.
    let html_ready = is_html
        && (wants_js_const_removal || !bundle.is_empty())
        && decode_html_body(resp);
    if html_ready {
        // Decoding already turned the wire representation from (possibly)
        // compressed bytes into plain UTF-8 text; that alone makes this a
        // modified response even if no rewrite below ends up touching it.
        changed = true;
    }

    for rule in &modifying {
        for modifier in rule.modifying_modifiers() {
            match modifier {
                Modifier::JsonPrune(spec) => {
                    changed |= apply_json_prune(resp, spec);
                }
                Modifier::RemoveJsConstant(names) => {
                    if html_ready {
                        let body = resp.body.clone();
                        let rewritten =
                            html_rewrite::rewrite_inline_scripts(&body, |text| {
                                let replaced = remove_js_constants(text, names);
                                (replaced != text).then_some(replaced)
                            });
                        if rewritten != resp.body {
                            resp.body = rewritten;
                            changed = true;
                        }
                    }
                }
                Modifier::Csp(value) => {
                    // `$csp=<policy>` appends a standalone policy line
                    // rather than patching an existing directive; browsers
                    // enforce every CSP header value independently, so an
                    // appended header only ever narrows, never loosens.
                    resp.headers.insert(CSP_HEADER, value.clone());
                    changed = true;
                }
                // `removeheader=Name` (no `request:` prefix) targets the
                // response; the prefixed form is handled on the request
                // side in `apply_request_modifier`.
                Modifier::RemoveHeader(name) if !name.starts_with("request:") => {
                    if !crate::modifiers::is_forbidden_header(name) && resp.headers.remove(name) {
                        changed = true;
                    }
                }
                Modifier::SetHeader { name, value } => {
                    if !crate::modifiers::is_forbidden_header(name) {
                        resp.headers.set(name, value.clone());
                        changed = true;
                    }
                }
                _ => {}
            }
        }
    }

    if !json_prune_rules.is_empty() {
        for spec in &json_prune_rules {
            changed |= apply_json_prune(resp, spec);
        }
    }

    if html_ready && !bundle.is_empty() {
        let mut fragment = String::new();
        if let Some(js) = &bundle.scriptlet_js {
            fragment.push_str("<script>");
            fragment.push_str(js);
            fragment.push_str("</script>");
        }
        if let Some(js) = &bundle.js_rule_js {
            fragment.push_str("<script>");
            fragment.push_str(js);
            fragment.push_str("</script>");
        }
        if !bundle.ext_css_selectors.is_empty() {
            let joined = bundle.ext_css_selectors.join("\n");
            fragment.push_str("<script>(()=>{window.__wardenExtCSS(");
            fragment.push_str(&serde_json::to_string(&joined).unwrap_or_default());
            fragment.push_str(")})();</script>");
        }

        let nonce = patch_csp_for_injection(resp);
        let fragment = match &nonce {
            Some(n) if !n.is_empty() => fragment.replace("<script>", &format!("<script nonce=\"{n}\">")),
            _ => fragment,
        };

        resp.body = html_rewrite::inject(&resp.body, fragment.as_bytes());
        changed = true;
    }

    if html_ready {
        // The body is now plain `identity`-encoded UTF-8, regardless of the
        // encoding/charset it arrived in; the old length and encoding
        // headers would otherwise describe bytes that no longer exist.
        resp.headers.remove("content-length");
        resp.headers.remove("content-encoding");
        resp.headers.set("transfer-encoding", "chunked");
        resp.headers.set("content-type", "text/html; charset=utf-8");
    }

    if changed {
        ResponseOutcome::Modified
    } else {
        ResponseOutcome::None
    }
}

/// Decompress `resp`'s body per its `Content-Encoding` and charset-decode it
/// to UTF-8 in place, per §4.6. Returns `false` (leaving `resp` completely
/// untouched) if the encoding is unsupported or decompression fails, so a
/// broken or unexpected upstream encoding degrades to "rewrite skipped,
/// original body delivered" rather than a corrupted response.
fn decode_html_body(resp: &mut HttpResponse) -> bool {
    let content_encoding = resp.headers.get("content-encoding").unwrap_or("").to_string();
    let raw = match crate::rewrite::compress::decode_body(&content_encoding, &resp.body) {
        Ok(raw) => raw,
        Err(err) => {
            log::warn!("response body rewrite skipped, decode failed: {err}");
            return false;
        }
    };

    let charset = resp
        .headers
        .content_type_charset()
        .map(|c| c.into_owned())
        .or_else(|| html_rewrite::sniff_meta_charset(&raw, 1024));
    resp.body = crate::rewrite::compress::decode_charset(&raw, charset.as_deref()).into_bytes();
    true
}

fn apply_json_prune(resp: &mut HttpResponse, spec: &JsonPruneSpec) -> bool {
    if resp.headers.content_type_media() != Some("application/json") {
        return false;
    }
    let Ok(mut doc) = serde_json::from_slice::<serde_json::Value>(&resp.body) else {
        return false;
    };
    if !spec.apply(&mut doc) {
        return false;
    }
    match serde_json::to_vec(&doc) {
        Ok(bytes) => {
            resp.body = bytes;
            true
        }
        Err(_) => false,
    }
}

/// Generate a nonce and patch the CSP header(s) plus any `<meta>` CSP tags
/// in the body so an injected `<script nonce="...">` is admitted (§4.7).
/// Returns the nonce used, or `None` if nothing needed patching (in which
/// case the injected script may omit the `nonce=` attribute entirely).
fn patch_csp_for_injection(resp: &mut HttpResponse) -> Option<String> {
    let nonce = crate::csp::generate_nonce();
    let mut patched_anything = false;

    for header_name in [CSP_HEADER, CSP_REPORT_ONLY_HEADER] {
        let values: Vec<String> = resp.headers.get_all(header_name).map(str::to_string).collect();
        if values.is_empty() {
            continue;
        }
        resp.headers.remove(header_name);
        for value in values {
            let patched = crate::csp::patch_for_script(&value, &nonce);
            if patched != value {
                patched_anything = true;
            }
            resp.headers.insert(header_name, patched);
        }
    }

    let rewritten = html_rewrite::patch_meta_csp(&resp.body, |content| {
        let patched = crate::csp::patch_for_script(content, &nonce);
        (patched != content).then_some(patched)
    });
    if rewritten != resp.body {
        resp.body = rewritten;
        patched_anything = true;
    }

    patched_anything.then_some(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmetic::ScriptletCall;
    use crate::types::{HeaderMap, RequestType, RuleOrigin, RuleProvenance};

    fn psl() -> PslEngine {
        PslEngine::fallback()
    }

    fn req(url: &str) -> HttpRequest {
        HttpRequest {
            url: url.to_string(),
            method: "GET".to_string(),
            headers: HeaderMap::new(),
            request_type: RequestType::all(),
            site_host: None,
        }
    }

    fn empty_store() -> RuleStore {
        RuleStore::new(RuleTree::new(), Vec::new(), ListNames::new())
    }

    #[test]
    fn hosts_map_entry_blocks_before_network_tree_runs() {
        let mut list_names = ListNames::new();
        list_names.insert(0, "hosts");
        let mut hosts = HostsMap::new();
        hosts.insert(
            "ads.example.com".to_string(),
            RuleProvenance {
                origin: RuleOrigin { list_id: 0, line_no: 3 },
                list_name: "hosts".to_string(),
                source_line: "ads.example.com".to_string(),
            },
        );
        let store = RuleStore::new(RuleTree::new(), Vec::new(), list_names).with_hosts(hosts);

        let mut request = req("https://ads.example.com/pixel.gif");
        let outcome = handle_request(&store, &psl(), &mut request);
        assert!(matches!(outcome, RequestOutcome::Block(_)));
    }

    #[test]
    fn response_without_matching_cosmetics_is_untouched() {
        let store = empty_store();
        let request = req("https://example.com/");
        let mut resp = HttpResponse {
            status: 200,
            headers: {
                let mut h = HeaderMap::new();
                h.set("Content-Type", "text/html; charset=utf-8");
                h
            },
            body: b"<html><head></head><body></body></html>".to_vec(),
        };
        let outcome = handle_response(&store, &psl(), &request, &mut resp);
        assert_eq!(outcome, ResponseOutcome::None);
    }

    #[test]
    fn scriptlet_bundle_is_injected_into_html_body() {
        let mut cosmetics = CosmeticStore::new();
        cosmetics
            .scriptlets
            .add_primary_rule("example.com", ScriptletCall::parse("//scriptlet('prevent-xhr')").unwrap());
        let store = empty_store().with_cosmetics(cosmetics);

        let request = req("https://example.com/");
        let mut resp = HttpResponse {
            status: 200,
            headers: {
                let mut h = HeaderMap::new();
                h.set("Content-Type", "text/html; charset=utf-8");
                h
            },
            body: b"<html><head></head><body></body></html>".to_vec(),
        };
        let outcome = handle_response(&store, &psl(), &request, &mut resp);
        assert_eq!(outcome, ResponseOutcome::Modified);
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("prevent-xhr"));
    }

    #[test]
    fn cosmetic_injection_patches_csp_none_directive_with_nonce() {
        let mut cosmetics = CosmeticStore::new();
        cosmetics.js_rules.add_primary_rule("example.com", "window.x = 1".to_string());
        let store = empty_store().with_cosmetics(cosmetics);

        let request = req("https://example.com/");
        let mut resp = HttpResponse {
            status: 200,
            headers: {
                let mut h = HeaderMap::new();
                h.set("Content-Type", "text/html; charset=utf-8");
                h.set("Content-Security-Policy", "script-src 'none'");
                h
            },
            body: b"<html><head></head><body></body></html>".to_vec(),
        };
        handle_response(&store, &psl(), &request, &mut resp);
        let csp = resp.headers.get("Content-Security-Policy").unwrap();
        assert!(csp.contains("'nonce-"));
        assert!(!csp.contains("'none'"));
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("nonce=\""));
    }

    #[test]
    fn gzip_compressed_html_is_decoded_before_injection_and_headers_are_fixed_up() {
        use std::io::Write;

        let mut cosmetics = CosmeticStore::new();
        cosmetics
            .scriptlets
            .add_primary_rule("example.com", ScriptletCall::parse("//scriptlet('prevent-xhr')").unwrap());
        let store = empty_store().with_cosmetics(cosmetics);

        let html = b"<html><head></head><body></body></html>";
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(html).unwrap();
        let compressed = enc.finish().unwrap();

        let request = req("https://example.com/");
        let mut resp = HttpResponse {
            status: 200,
            headers: {
                let mut h = HeaderMap::new();
                h.set("Content-Type", "text/html; charset=utf-8");
                h.set("Content-Encoding", "gzip");
                h.set("Content-Length", compressed.len().to_string());
                h
            },
            body: compressed,
        };

        let outcome = handle_response(&store, &psl(), &request, &mut resp);
        assert_eq!(outcome, ResponseOutcome::Modified);
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("prevent-xhr"));
        assert!(resp.headers.get("Content-Encoding").is_none());
        assert!(resp.headers.get("Content-Length").is_none());
        assert_eq!(resp.headers.get("Transfer-Encoding"), Some("chunked"));
        assert_eq!(resp.headers.get("Content-Type"), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn unsupported_content_encoding_leaves_response_untouched() {
        let mut cosmetics = CosmeticStore::new();
        cosmetics
            .scriptlets
            .add_primary_rule("example.com", ScriptletCall::parse("//scriptlet('prevent-xhr')").unwrap());
        let store = empty_store().with_cosmetics(cosmetics);

        let request = req("https://example.com/");
        let original_body = b"<html><head></head><body></body></html>".to_vec();
        let mut resp = HttpResponse {
            status: 200,
            headers: {
                let mut h = HeaderMap::new();
                h.set("Content-Type", "text/html; charset=utf-8");
                h.set("Content-Encoding", "compress");
                h
            },
            body: original_body.clone(),
        };

        let outcome = handle_response(&store, &psl(), &request, &mut resp);
        assert_eq!(outcome, ResponseOutcome::None);
        assert_eq!(resp.body, original_body);
        assert_eq!(resp.headers.get("Content-Encoding"), Some("compress"));
    }
}

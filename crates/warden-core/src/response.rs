//! Block/redirect response synthesis (§4.5/§6).
//!
//! A block is a normal, cacheable-looking 200 response carrying a small
//! HTML page and provenance headers, not an error status — upstream
//! tooling (browsers, XHR callers) treats 4xx/5xx from a proxy very
//! differently than from the origin, and a block should read like content,
//! not a broken connection. A redirect is always 307, never 308: 308 forces
//! the user agent to replay the original request body on the new URL,
//! which is never what a rewritten tracking redirect wants.

use crate::types::{HttpResponse, RuleProvenance};

const BLOCK_PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Blocked</title></head>
<body style="font-family:sans-serif;color:#888;background:#fafafa">
<p>Request blocked by rule <code>{rule}</code> from <code>{list}</code>.</p>
</body></html>"#;

pub fn build_block_response(provenance: &RuleProvenance, list_name: &str) -> HttpResponse {
    let body = BLOCK_PAGE_TEMPLATE
        .replace("{rule}", &html_escape(&provenance.source_line))
        .replace("{list}", &html_escape(list_name));

    let mut headers = crate::types::HeaderMap::new();
    headers.set("Content-Type", "text/html; charset=utf-8");
    headers.set("Content-Length", body.len().to_string());
    headers.set("Cache-Control", "no-store");
    headers.set("X-Blocked-By", "warden");
    headers.set("X-Block-Rule", provenance.source_line.clone());
    headers.set("X-Block-List", list_name);

    HttpResponse {
        status: 200,
        headers,
        body: body.into_bytes(),
    }
}

pub fn build_redirect_response(target: &str, provenance: &RuleProvenance, list_name: &str) -> HttpResponse {
    let mut headers = crate::types::HeaderMap::new();
    headers.set("Location", target);
    headers.set("Content-Length", "0");
    headers.set("Cache-Control", "no-store");
    headers.set("X-Blocked-By", "warden");
    headers.set("X-Block-Rule", provenance.source_line.clone());
    headers.set("X-Block-List", list_name);

    HttpResponse {
        status: 307,
        headers,
        body: Vec::new(),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RuleOrigin;

    fn provenance() -> RuleProvenance {
        RuleProvenance {
            origin: RuleOrigin { list_id: 1, line_no: 42 },
            list_name: "easylist".into(),
            source_line: "||ads.example.com^".into(),
        }
    }

    #[test]
    fn block_response_is_200_with_provenance_headers() {
        let resp = build_block_response(&provenance(), "easylist");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.headers.get("X-Blocked-By"), Some("warden"));
        assert_eq!(resp.headers.get("X-Block-Rule"), Some("||ads.example.com^"));
        assert_eq!(resp.headers.get("X-Block-List"), Some("easylist"));
        assert_eq!(resp.headers.get("Cache-Control"), Some("no-store"));
    }

    #[test]
    fn redirect_response_is_307_never_308() {
        let resp = build_redirect_response("https://example.com/clean", &provenance(), "easylist");
        assert_eq!(resp.status, 307);
        assert_eq!(resp.headers.get("Location"), Some("https://example.com/clean"));
    }

    #[test]
    fn block_page_escapes_rule_text() {
        let mut p = provenance();
        p.source_line = "<script>".into();
        let resp = build_block_response(&p, "easylist");
        let body = String::from_utf8(resp.body).unwrap();
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;"));
    }
}

//! Streaming HTML splice rewriting (§4.6).
//!
//! This is not a general-purpose HTML rewriter: it tokenizes only as far as
//! necessary to locate one injection point (the end of the opening
//! `<head>` tag, falling back to `<body>`, falling back to document start),
//! then abandons tokenization entirely and raw-copies every remaining byte
//! verbatim. A response body that never needs a second splice point never
//! pays for a second scan.

/// Find the byte offset immediately after `<head ...>`'s closing `>`,
/// skipping past comments and respecting quoted attribute values so a `>`
/// inside a quoted attribute doesn't end the tag early.
fn find_tag_end(html: &[u8], tag: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < html.len() {
        if html[i] != b'<' {
            i += 1;
            continue;
        }
        if html[i..].starts_with(b"<!--") {
            match find_subslice(&html[i + 4..], b"-->") {
                Some(end) => {
                    i += 4 + end + 3;
                    continue;
                }
                None => break, // unterminated comment: nothing more to find
            }
        }
        let name_start = i + 1;
        if name_start < html.len()
            && html[name_start] != b'/'
            && html.len() >= name_start + tag.len()
            && html[name_start..name_start + tag.len()].eq_ignore_ascii_case(tag)
            && is_name_boundary(html.get(name_start + tag.len()).copied())
        {
            if let Some(end) = scan_tag_end(html, i) {
                return Some(end + 1);
            }
        }
        i += 1;
    }
    None
}

fn is_name_boundary(b: Option<u8>) -> bool {
    match b {
        None => true,
        Some(b) => b == b'>' || b == b'/' || b.is_ascii_whitespace(),
    }
}

fn scan_tag_end(html: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let mut in_quote: Option<u8> = None;
    while i < html.len() {
        let b = html[i];
        match in_quote {
            Some(q) => {
                if b == q {
                    in_quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => in_quote = Some(b),
                b'>' => return Some(i),
                _ => {}
            },
        }
        i += 1;
    }
    None
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Where an injected fragment should land, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplicePoint {
    AfterHeadOpen(usize),
    AfterBodyOpen(usize),
    DocumentStart,
}

pub fn find_splice_point(html: &[u8]) -> SplicePoint {
    if let Some(pos) = find_tag_end(html, b"head") {
        return SplicePoint::AfterHeadOpen(pos);
    }
    if let Some(pos) = find_tag_end(html, b"body") {
        return SplicePoint::AfterBodyOpen(pos);
    }
    SplicePoint::DocumentStart
}

/// Splice `fragment` into `html` at the best available injection point,
/// raw-copying everything before and after it untouched.
pub fn inject(html: &[u8], fragment: &[u8]) -> Vec<u8> {
    let offset = match find_splice_point(html) {
        SplicePoint::AfterHeadOpen(p) | SplicePoint::AfterBodyOpen(p) => p,
        SplicePoint::DocumentStart => 0,
    };
    let mut out = Vec::with_capacity(html.len() + fragment.len());
    out.extend_from_slice(&html[..offset]);
    out.extend_from_slice(fragment);
    out.extend_from_slice(&html[offset..]);
    out
}

/// Build the `<script nonce="...">...</script>` fragment for a CSP-safe
/// inline injection.
pub fn nonce_script_fragment(nonce: &str, body: &str) -> Vec<u8> {
    format!("<script nonce=\"{nonce}\">{body}</script>").into_bytes()
}

/// Advance to the next start or end tag at or after `from`, skipping
/// comments. Returns the byte range `[start, end)` covering the whole tag
/// including its `<`/`>` delimiters.
fn scan_next_tag(html: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i < html.len() {
        if html[i] != b'<' {
            i += 1;
            continue;
        }
        if html[i..].starts_with(b"<!--") {
            match find_subslice(&html[i + 4..], b"-->") {
                Some(end) => {
                    i += 4 + end + 3;
                    continue;
                }
                None => return None,
            }
        }
        if let Some(end) = scan_tag_end(html, i) {
            return Some((i, end + 1));
        }
        i += 1;
    }
    None
}

/// The tag name of a `<...>`/`</...>` span, lowercase comparison expected
/// via `eq_ignore_ascii_case` at call sites.
fn tag_name(html: &[u8], tag_start: usize) -> &[u8] {
    let mut j = tag_start + 1;
    if j < html.len() && html[j] == b'/' {
        j += 1;
    }
    let name_start = j;
    while j < html.len() && !html[j].is_ascii_whitespace() && html[j] != b'>' && html[j] != b'/' {
        j += 1;
    }
    &html[name_start..j]
}

fn is_closing_tag(html: &[u8], tag_start: usize) -> bool {
    html.get(tag_start + 1) == Some(&b'/')
}

/// Find an attribute by name within a single tag's raw bytes (including the
/// enclosing `<`/`>`). Returns the byte range of the attribute's value, with
/// surrounding quotes stripped if present.
fn find_attr<'a>(tag: &'a [u8], attr: &[u8]) -> Option<&'a [u8]> {
    let mut i = 1;
    while i < tag.len() && !tag[i].is_ascii_whitespace() && tag[i] != b'>' {
        i += 1;
    }
    while i < tag.len() {
        while i < tag.len() && tag[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= tag.len() || tag[i] == b'>' || tag[i] == b'/' {
            break;
        }
        let name_start = i;
        while i < tag.len() && tag[i] != b'=' && !tag[i].is_ascii_whitespace() && tag[i] != b'>' {
            i += 1;
        }
        let name_end = i;
        while i < tag.len() && tag[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value: &[u8] = &[];
        if i < tag.len() && tag[i] == b'=' {
            i += 1;
            while i < tag.len() && tag[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < tag.len() && (tag[i] == b'"' || tag[i] == b'\'') {
                let q = tag[i];
                i += 1;
                let value_start = i;
                while i < tag.len() && tag[i] != q {
                    i += 1;
                }
                value = &tag[value_start..i];
                if i < tag.len() {
                    i += 1;
                }
            } else {
                let value_start = i;
                while i < tag.len() && !tag[i].is_ascii_whitespace() && tag[i] != b'>' {
                    i += 1;
                }
                value = &tag[value_start..i];
            }
        }
        if tag[name_start..name_end].eq_ignore_ascii_case(attr) {
            return Some(value);
        }
    }
    None
}

fn try_patch_meta_tag(tag: &[u8], patch: &mut impl FnMut(&str) -> Option<String>) -> Option<Vec<u8>> {
    let http_equiv = find_attr(tag, b"http-equiv")?;
    let http_equiv = std::str::from_utf8(http_equiv).ok()?;
    if !http_equiv.eq_ignore_ascii_case("content-security-policy") {
        return None;
    }
    let content = find_attr(tag, b"content")?;
    let content_str = std::str::from_utf8(content).ok()?;
    let patched = patch(content_str)?;

    // Locate the raw byte offsets of the content value again so we can
    // splice into the original tag bytes rather than re-serialize
    // attributes we didn't touch.
    let content_offset = content.as_ptr() as usize - tag.as_ptr() as usize;
    let mut out = Vec::with_capacity(tag.len() + patched.len());
    out.extend_from_slice(&tag[..content_offset]);
    out.extend_from_slice(patched.as_bytes());
    out.extend_from_slice(&tag[content_offset + content.len()..]);
    Some(out)
}

/// Patch every `<meta http-equiv="content-security-policy" content="...">`
/// tag's `content` attribute via `patch`, which receives the existing policy
/// string and returns the replacement (or `None` to leave it untouched).
/// Everything outside matched meta tags is copied through unchanged.
pub fn patch_meta_csp(html: &[u8], mut patch: impl FnMut(&str) -> Option<String>) -> Vec<u8> {
    let mut out = Vec::with_capacity(html.len());
    let mut pos = 0;
    while let Some((tag_start, tag_end)) = scan_next_tag(html, pos) {
        out.extend_from_slice(&html[pos..tag_start]);
        let name = tag_name(html, tag_start);
        if !is_closing_tag(html, tag_start) && name.eq_ignore_ascii_case(b"meta") {
            if let Some(rewritten) = try_patch_meta_tag(&html[tag_start..tag_end], &mut patch) {
                out.extend_from_slice(&rewritten);
                pos = tag_end;
                continue;
            }
        }
        out.extend_from_slice(&html[tag_start..tag_end]);
        pos = tag_end;
    }
    out.extend_from_slice(&html[pos..]);
    out
}

/// Look for a declared charset in the first `<meta>` tag that carries one —
/// either `<meta charset="...">` or the older
/// `<meta http-equiv="Content-Type" content="...;charset=...">` form — the
/// same two shapes browsers sniff when no `Content-Type` charset parameter
/// is present (§4.6). Only scans up to `limit` bytes, matching how browsers
/// bound their own meta-charset sniff to the head of the document rather
/// than the whole body.
pub fn sniff_meta_charset(html: &[u8], limit: usize) -> Option<String> {
    let bound = html.len().min(limit);
    let mut pos = 0;
    while let Some((tag_start, tag_end)) = scan_next_tag(&html[..bound], pos) {
        if is_closing_tag(html, tag_start) || !tag_name(html, tag_start).eq_ignore_ascii_case(b"meta") {
            pos = tag_end;
            continue;
        }
        let tag = &html[tag_start..tag_end];
        if let Some(charset) = find_attr(tag, b"charset") {
            return std::str::from_utf8(charset).ok().map(str::to_string);
        }
        if let Some(content) = find_attr(tag, b"content") {
            if let Ok(content) = std::str::from_utf8(content) {
                if let Some(idx) = content.to_ascii_lowercase().find("charset=") {
                    let rest = content[idx + "charset=".len()..].trim();
                    let charset = rest.split(|c: char| c == ';' || c.is_whitespace()).next().unwrap_or(rest);
                    if !charset.is_empty() {
                        return Some(charset.trim_matches('"').trim_matches('\'').to_string());
                    }
                }
            }
        }
        pos = tag_end;
    }
    None
}

/// Rewrite the text contents of every inline (no `src` attribute)
/// `<script>` element via `transform`, which receives the script's current
/// text and returns the replacement text (or `None` to leave it as-is).
/// Scripts with a `src` attribute are left untouched since there is no
/// inline body to rewrite.
pub fn rewrite_inline_scripts(html: &[u8], mut transform: impl FnMut(&str) -> Option<String>) -> Vec<u8> {
    let mut out = Vec::with_capacity(html.len());
    let mut pos = 0;
    while let Some((tag_start, tag_end)) = scan_next_tag(html, pos) {
        out.extend_from_slice(&html[pos..tag_start]);
        let name = tag_name(html, tag_start);
        let is_open_script = !is_closing_tag(html, tag_start) && name.eq_ignore_ascii_case(b"script");
        out.extend_from_slice(&html[tag_start..tag_end]);
        pos = tag_end;

        if !is_open_script {
            continue;
        }
        let has_src = find_attr(&html[tag_start..tag_end], b"src").is_some();
        if has_src {
            continue;
        }
        let Some(close_rel) = find_subslice(&html[pos..], b"</script") else {
            continue;
        };
        let text_start = pos;
        let text_end = pos + close_rel;
        let close_tag_end = match scan_tag_end(html, text_end) {
            Some(e) => e + 1,
            None => html.len(),
        };

        match std::str::from_utf8(&html[text_start..text_end])
            .ok()
            .and_then(|t| transform(t))
        {
            Some(new_text) => out.extend_from_slice(new_text.as_bytes()),
            None => out.extend_from_slice(&html[text_start..text_end]),
        }
        out.extend_from_slice(&html[text_end..close_tag_end]);
        pos = close_tag_end;
    }
    out.extend_from_slice(&html[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splices_after_head_open_tag() {
        let html = b"<html><head lang=\"en\"><title>t</title></head><body></body></html>";
        let out = inject(html, b"<!--X-->");
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "<html><head lang=\"en\"><!--X--><title>t</title></head><body></body></html>"
        );
    }

    #[test]
    fn quoted_attribute_gt_does_not_end_tag_early() {
        let html = br#"<head data-x="a>b"><title>t</title></head>"#;
        let out = inject(html, b"Z");
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, r#"<head data-x="a>b">Z<title>t</title></head>"#);
    }

    #[test]
    fn falls_back_to_body_when_no_head() {
        let html = b"<html><body class=\"x\">hi</body></html>";
        let out = inject(html, b"Z");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<html><body class=\"x\">Zhi</body></html>"
        );
    }

    #[test]
    fn falls_back_to_document_start_when_neither_present() {
        let html = b"<svg></svg>";
        let out = inject(html, b"Z");
        assert_eq!(String::from_utf8(out).unwrap(), "Z<svg></svg>");
    }

    #[test]
    fn comment_before_head_is_skipped_not_matched() {
        let html = b"<!-- <head> fake --><head><title>t</title></head>";
        let out = inject(html, b"Z");
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "<!-- <head> fake --><head>Z<title>t</title></head>");
    }

    #[test]
    fn patches_meta_csp_content_attribute() {
        let html = br#"<head><meta http-equiv="Content-Security-Policy" content="script-src 'none'"></head>"#;
        let out = patch_meta_csp(html, |csp| Some(format!("{csp}; patched")));
        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            r#"<head><meta http-equiv="Content-Security-Policy" content="script-src 'none'; patched"></head>"#
        );
    }

    #[test]
    fn leaves_non_csp_meta_tags_untouched() {
        let html = br#"<meta http-equiv="refresh" content="5">"#;
        let out = patch_meta_csp(html, |_| Some("changed".to_string()));
        assert_eq!(out, html);
    }

    #[test]
    fn rewrites_inline_script_text_only() {
        let html = b"<script>var a = 1;</script><script src=\"x.js\">ignored</script>";
        let out = rewrite_inline_scripts(html, |_| Some("var a = 2;".to_string()));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<script>var a = 2;</script><script src=\"x.js\">ignored</script>"
        );
    }

    #[test]
    fn rewrite_inline_scripts_leaves_text_when_transform_returns_none() {
        let html = b"<script>keep me</script>";
        let out = rewrite_inline_scripts(html, |_| None);
        assert_eq!(out, html);
    }

    #[test]
    fn sniffs_meta_charset_attribute() {
        let html = br#"<head><meta charset="Shift_JIS"></head>"#;
        assert_eq!(sniff_meta_charset(html, 1024), Some("Shift_JIS".to_string()));
    }

    #[test]
    fn sniffs_meta_http_equiv_charset() {
        let html = br#"<head><meta http-equiv="Content-Type" content="text/html; charset=ISO-8859-1"></head>"#;
        assert_eq!(sniff_meta_charset(html, 1024), Some("ISO-8859-1".to_string()));
    }

    #[test]
    fn sniff_meta_charset_returns_none_when_absent() {
        let html = b"<head><title>t</title></head>";
        assert_eq!(sniff_meta_charset(html, 1024), None);
    }
}

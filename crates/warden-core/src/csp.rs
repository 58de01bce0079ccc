//! CSP nonce injection (§4.7).
//!
//! When the rewriter splices inline script/style into a page it must also
//! patch any Content-Security-Policy the page already sends, or the
//! injected content gets blocked by the very thing we're routing around.
//! Patching follows the CSP3 "does a source list allow all inline
//! behavior" algorithm: only add a nonce source when the existing list
//! wouldn't already admit inline content.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;

/// Nonce byte length. 18 raw bytes (144 bits) comfortably clears CSP3's
/// recommended 128-bit floor while matching the reference implementation's
/// nonce size exactly.
const NONCE_BYTES: usize = 18;

/// Generate a fresh CSPRNG-backed nonce, base64-encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

struct Directive {
    name: String,
    sources: Vec<String>,
}

fn parse(csp: &str) -> Vec<Directive> {
    csp.split(';')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| {
            let mut parts = d.split_whitespace();
            let name = parts.next().unwrap_or("").to_ascii_lowercase();
            let sources = parts.map(str::to_string).collect();
            Directive { name, sources }
        })
        .collect()
}

fn serialize(directives: &[Directive]) -> String {
    directives
        .iter()
        .map(|d| {
            if d.sources.is_empty() {
                d.name.clone()
            } else {
                format!("{} {}", d.name, d.sources.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// CSP3 "does a source list allow all inline behavior for type" check.
fn allows_inline(sources: &[String]) -> bool {
    if sources.is_empty() {
        return false;
    }
    let has_nonce_or_hash = sources.iter().any(|s| {
        s.starts_with("'nonce-") || s.starts_with("'sha256-") || s.starts_with("'sha384-") || s.starts_with("'sha512-")
    });
    let has_strict_dynamic = sources.iter().any(|s| s == "'strict-dynamic'");
    let has_unsafe_inline = sources.iter().any(|s| s == "'unsafe-inline'");
    has_unsafe_inline && !has_nonce_or_hash && !has_strict_dynamic
}

fn patch_by_priority(csp: &str, priority: &[&str], nonce: &str) -> String {
    let mut directives = parse(csp);
    if let Some(idx) = priority
        .iter()
        .find_map(|name| directives.iter().position(|d| d.name == *name))
    {
        if !allows_inline(&directives[idx].sources) {
            let is_bare_none = directives[idx].sources.len() == 1 && directives[idx].sources[0] == "'none'";
            if directives[idx].sources.is_empty() || is_bare_none {
                directives[idx].sources = vec![format!("'nonce-{nonce}'")];
            } else {
                directives[idx].sources.push(format!("'nonce-{nonce}'"));
            }
        }
    }
    serialize(&directives)
}

/// Patch a CSP header so an injected `<script>` carrying `nonce` is
/// admitted. Directive priority: `script-src-elem` > `script-src` >
/// `default-src`; a policy with none of those present is left untouched
/// (there's nothing restricting inline script, so nothing to patch).
pub fn patch_for_script(csp: &str, nonce: &str) -> String {
    patch_by_priority(csp, &["script-src-elem", "script-src", "default-src"], nonce)
}

/// Same as [`patch_for_script`] but for injected `<style>`/`style=` content.
pub fn patch_for_style(csp: &str, nonce: &str) -> String {
    patch_by_priority(csp, &["style-src-elem", "style-src", "default-src"], nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_is_base64_of_18_bytes() {
        let nonce = generate_nonce();
        let decoded = BASE64.decode(&nonce).unwrap();
        assert_eq!(decoded.len(), NONCE_BYTES);
    }

    #[test]
    fn patches_script_src_elem_first() {
        let csp = "default-src 'self'; script-src 'self'; script-src-elem 'self'";
        let patched = patch_for_script(csp, "abc123");
        assert!(patched.contains("script-src-elem 'self' 'nonce-abc123'"));
        assert!(!patched.contains("script-src 'self' 'nonce"));
    }

    #[test]
    fn falls_back_to_default_src_when_no_script_directive() {
        let csp = "default-src 'self'";
        let patched = patch_for_script(csp, "abc123");
        assert_eq!(patched, "default-src 'self' 'nonce-abc123'");
    }

    #[test]
    fn leaves_policy_with_no_relevant_directive_untouched() {
        let csp = "frame-ancestors 'none'";
        assert_eq!(patch_for_script(csp, "abc123"), csp);
    }

    #[test]
    fn skips_patch_when_unsafe_inline_already_allows_it() {
        let csp = "script-src 'unsafe-inline'";
        assert_eq!(patch_for_script(csp, "abc123"), csp);
    }

    #[test]
    fn none_is_replaced_not_appended_to() {
        let csp = "script-src 'none'";
        let patched = patch_for_script(csp, "abc123");
        assert_eq!(patched, "script-src 'nonce-abc123'");
    }

    #[test]
    fn patches_when_unsafe_inline_is_negated_by_nonce_or_strict_dynamic() {
        let csp = "script-src 'unsafe-inline' 'strict-dynamic'";
        let patched = patch_for_script(csp, "abc123");
        assert!(patched.contains("'nonce-abc123'"));
    }
}

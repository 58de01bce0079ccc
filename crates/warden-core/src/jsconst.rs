//! `$remove-js-constant` application: blanks out a named top-level
//! assignment statement in an inline script, the way `remove-js-constant`
//! is documented to behave — it doesn't try to understand the script, it
//! just erases the statement so the name falls through to `undefined`.
//!
//! A name may be a bare identifier (`adsEnabled`, matching a `var`/`let`/
//! `const` declaration) or a dotted property path (`googletag.cmd`,
//! matching a plain assignment to that path) — both forms are top-level
//! statements of the shape `[var|let|const ]name = ...;` on their own line.

/// Remove each named declaration/assignment, in order, from `js`. Names are
/// matched independently; removing one never affects whether a later name
/// is still found.
pub fn remove_js_constants(js: &str, names: &[String]) -> String {
    let mut out = js.to_string();
    for name in names {
        let pattern = format!(
            r"(?m)^[ \t]*(?:(?:var|let|const)\s+)?{}\s*=[^;]*;[ \t]*$",
            regex::escape(name)
        );
        if let Ok(re) = regex::Regex::new(&pattern) {
            out = re.replace_all(&out, "").to_string();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_single_declaration() {
        let js = "const adsEnabled = true;\nconsole.log('x');";
        let out = remove_js_constants(js, &["adsEnabled".to_string()]);
        assert!(!out.contains("adsEnabled"));
        assert!(out.contains("console.log"));
    }

    #[test]
    fn leaves_unrelated_names_untouched() {
        let js = "let a = 1;\nlet b = 2;";
        let out = remove_js_constants(js, &["a".to_string()]);
        assert!(!out.contains("let a"));
        assert!(out.contains("let b = 2;"));
    }

    #[test]
    fn removes_multiple_names_independently() {
        let js = "var x = 1;\nvar y = 2;\nvar z = 3;";
        let out = remove_js_constants(js, &["x".to_string(), "z".to_string()]);
        assert!(!out.contains("var x"));
        assert!(out.contains("var y = 2;"));
        assert!(!out.contains("var z"));
    }

    #[test]
    fn removes_dotted_property_assignment() {
        let js = "googletag.cmd = [];\nconsole.log('ok');";
        let out = remove_js_constants(js, &["googletag.cmd".to_string()]);
        assert!(!out.contains("googletag.cmd"));
        assert!(out.contains("console.log"));
    }
}

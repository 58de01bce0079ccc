//! `$jsonprune` modifier grammar and application (§4.4a).
//!
//! The modifier value is a space-separated list of dotted property paths to
//! delete from a JSON response body. A path segment of `[]` means "every
//! element of the array at this point" rather than a literal key. An
//! optional leading token starting with `$` names a comma-separated list of
//! paths that must all resolve to a present value before any deletion
//! happens at all — a safety gate against pruning a response shape the
//! rule's author didn't actually anticipate.
//!
//! This is deliberately not full JSONPath: only dotted keys and the bare
//! `[]` wildcard are supported, matching the narrow grammar the reference
//! modifier actually implements.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    ArrayWildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath(pub Vec<PathSegment>);

impl JsonPath {
    fn parse(s: &str) -> Self {
        JsonPath(
            s.split('.')
                .filter(|seg| !seg.is_empty())
                .map(|seg| {
                    if seg == "[]" {
                        PathSegment::ArrayWildcard
                    } else {
                        PathSegment::Key(seg.to_string())
                    }
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPruneSpec {
    pub required: Vec<JsonPath>,
    pub paths: Vec<JsonPath>,
}

impl JsonPruneSpec {
    /// Parse a raw `$jsonprune=...` modifier value.
    pub fn parse(value: &str) -> Self {
        let mut required = Vec::new();
        let mut paths = Vec::new();

        for token in value.split_whitespace() {
            if let Some(rest) = token.strip_prefix('$') {
                required.extend(rest.split(',').filter(|s| !s.is_empty()).map(JsonPath::parse));
            } else {
                paths.push(JsonPath::parse(token));
            }
        }

        Self { required, paths }
    }

    /// Delete every matched path from `root` in place. Returns whether
    /// anything was actually removed. No-ops (returns `false`) if any
    /// required-property path fails to resolve to a present value.
    pub fn apply(&self, root: &mut Value) -> bool {
        for req in &self.required {
            if resolve(root, &req.0).is_none() {
                return false;
            }
        }

        let mut changed = false;
        for path in &self.paths {
            changed |= delete_path(root, &path.0);
        }
        changed
    }
}

fn resolve<'a>(value: &'a Value, segs: &[PathSegment]) -> Option<&'a Value> {
    match segs.split_first() {
        None => Some(value),
        Some((PathSegment::Key(key), rest)) => resolve(value.as_object()?.get(key)?, rest),
        Some((PathSegment::ArrayWildcard, rest)) => {
            value.as_array()?.iter().find_map(|item| resolve(item, rest))
        }
    }
}

fn delete_path(value: &mut Value, segs: &[PathSegment]) -> bool {
    match segs {
        [] => false,
        [PathSegment::Key(key)] => {
            if let Some(obj) = value.as_object_mut() {
                obj.remove(key).is_some()
            } else {
                false
            }
        }
        [PathSegment::Key(key), rest @ ..] => value
            .as_object_mut()
            .and_then(|obj| obj.get_mut(key))
            .map(|child| delete_path(child, rest))
            .unwrap_or(false),
        [PathSegment::ArrayWildcard] => {
            if let Some(arr) = value.as_array() {
                if arr.is_empty() {
                    false
                } else {
                    // "delete the array itself" is ambiguous for a bare
                    // trailing wildcard; treat it as clearing every element
                    // to null rather than removing array slots (preserves
                    // index-dependent consumers downstream).
                    if let Some(arr) = value.as_array_mut() {
                        for item in arr.iter_mut() {
                            *item = Value::Null;
                        }
                    }
                    true
                }
            } else {
                false
            }
        }
        [PathSegment::ArrayWildcard, rest @ ..] => {
            if let Some(arr) = value.as_array_mut() {
                let mut changed = false;
                for item in arr.iter_mut() {
                    changed |= delete_path(item, rest);
                }
                changed
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_required_gate_and_paths() {
        let spec = JsonPruneSpec::parse("$data.id ads.items.[].tracker meta.debug");
        assert_eq!(spec.required.len(), 1);
        assert_eq!(spec.paths.len(), 2);
    }

    #[test]
    fn deletes_nested_key() {
        let spec = JsonPruneSpec::parse("ads.tracker");
        let mut doc = json!({"ads": {"tracker": "x", "keep": 1}});
        assert!(spec.apply(&mut doc));
        assert_eq!(doc, json!({"ads": {"keep": 1}}));
    }

    #[test]
    fn deletes_through_array_wildcard() {
        let spec = JsonPruneSpec::parse("items.[].tracker");
        let mut doc = json!({"items": [{"tracker": 1, "id": 1}, {"tracker": 2, "id": 2}]});
        assert!(spec.apply(&mut doc));
        assert_eq!(doc, json!({"items": [{"id": 1}, {"id": 2}]}));
    }

    #[test]
    fn required_gate_blocks_prune_when_missing() {
        let spec = JsonPruneSpec::parse("$data.id ads.tracker");
        let mut doc = json!({"ads": {"tracker": 1}});
        assert!(!spec.apply(&mut doc));
        assert_eq!(doc, json!({"ads": {"tracker": 1}}));
    }

    #[test]
    fn required_gate_allows_prune_when_present() {
        let spec = JsonPruneSpec::parse("$data.id ads.tracker");
        let mut doc = json!({"data": {"id": 7}, "ads": {"tracker": 1}});
        assert!(spec.apply(&mut doc));
        assert_eq!(doc, json!({"data": {"id": 7}, "ads": {}}));
    }
}

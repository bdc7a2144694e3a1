//! Dotted-path engine for navigating nested JSON values.
//!
//! Paths are dotted strings such as `a.b.2.c`: identifiers traverse object
//! keys, numeric segments index arrays, and a trailing `.*` marks a wildcard
//! that binds to a whole subtree. The first segment of a path is its *root*,
//! which is always a declared property name.

use serde_json::Value;
use std::fmt;

/// A single part of a path under construction.
///
/// Used by [`normalize`] so callers can mix string and index parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Part {
    /// A key (may itself contain dots; preserved as-is).
    Key(String),
    /// An array index.
    Index(usize),
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Key(k) => write!(f, "{}", k),
            Part::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<String> for Part {
    fn from(s: String) -> Self {
        Part::Key(s)
    }
}

impl From<&str> for Part {
    fn from(s: &str) -> Self {
        Part::Key(s.to_owned())
    }
}

impl From<usize> for Part {
    fn from(i: usize) -> Self {
        Part::Index(i)
    }
}

/// Join path parts into a normalized dotted string.
///
/// Parts that already contain dots are preserved as-is, so
/// `normalize(["a.b", "c"])` yields `a.b.c`.
pub fn normalize<I>(parts: I) -> String
where
    I: IntoIterator,
    I::Item: Into<Part>,
{
    let mut out = String::new();
    for part in parts {
        if !out.is_empty() {
            out.push('.');
        }
        out.push_str(&part.into().to_string());
    }
    out
}

/// Split a path into its segments.
#[inline]
pub fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('.')
}

/// The root segment of a path: everything before the first `.`.
#[inline]
pub fn root(path: &str) -> &str {
    match path.find('.') {
        Some(i) => &path[..i],
        None => path,
    }
}

/// Returns true if the path addresses below its root property.
#[inline]
pub fn is_deep(path: &str) -> bool {
    path.contains('.')
}

/// Returns true if the path is a wildcard (`.*` suffix).
#[inline]
pub fn is_wildcard(path: &str) -> bool {
    path.ends_with(".*")
}

/// The base of a wildcard path (`a.b.*` -> `a.b`); identity otherwise.
#[inline]
pub fn wildcard_base(path: &str) -> &str {
    path.strip_suffix(".*").unwrap_or(path)
}

/// Returns true iff `candidate` equals `parent` or lies inside its subtree.
///
/// Matching is segment-aware: `a.bc` is not a descendant of `a.b`.
pub fn is_descendant(parent: &str, candidate: &str) -> bool {
    candidate == parent
        || (candidate.len() > parent.len()
            && candidate.starts_with(parent)
            && candidate.as_bytes()[parent.len()] == b'.')
}

/// Decide whether a change at `path` triggers an effect bound to
/// `effect_path`.
///
/// Non-wildcard effect paths fire on the exact path and on replacements of
/// any ancestor (replacing `a` changes `a.b.c`), but not on descendant
/// writes. Wildcard effect paths fire on their base, on every descendant of
/// the base, and on ancestor replacements.
pub fn matches(effect_path: &str, path: &str) -> bool {
    if let Some(base) = effect_path.strip_suffix(".*") {
        return is_descendant(base, path) || is_descendant(path, base);
    }
    if let Some(base) = path.strip_suffix(".*") {
        return is_descendant(base, effect_path) || is_descendant(effect_path, base);
    }
    // Equal, or the changed path is an ancestor of the effect path.
    is_descendant(path, effect_path)
}

/// Replace a leading `from_prefix` in `path` with `to_prefix`.
///
/// The trailing segments are preserved: `translate("x", "y", "x.sub")`
/// yields `y.sub`. The caller is expected to have checked that `path` is a
/// descendant of `from_prefix`.
pub fn translate(from_prefix: &str, to_prefix: &str, path: &str) -> String {
    format!("{}{}", to_prefix, &path[from_prefix.len()..])
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(arr) => segment.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(arr) => segment.parse::<usize>().ok().and_then(move |i| arr.get_mut(i)),
        _ => None,
    }
}

/// Walk a path through a value tree; `None` on any missing segment.
pub fn get_in<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in split(path) {
        current = step(current, segment)?;
    }
    Some(current)
}

/// Mutable variant of [`get_in`].
pub fn get_in_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in split(path) {
        current = step_mut(current, segment)?;
    }
    Some(current)
}

/// Assign a value at a path inside a tree.
///
/// Walks all but the last segment; any missing intermediate makes the whole
/// call a no-op returning `None`. On reaching the parent the normalized path
/// is returned even when the leaf slot itself is not assignable (a
/// non-numeric key on an array leaves the tree untouched); object leaves are
/// created, array leaves accept indices up to and including the current
/// length.
pub fn set_in(root: &mut Value, path: &str, value: Value) -> Option<String> {
    let (parent_path, leaf) = match path.rfind('.') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    };
    let parent = if parent_path.is_empty() {
        root
    } else {
        get_in_mut(root, parent_path)?
    };
    match parent {
        Value::Object(map) => {
            map.insert(leaf.to_owned(), value);
        }
        Value::Array(arr) => {
            if let Ok(i) = leaf.parse::<usize>() {
                if i < arr.len() {
                    arr[i] = value;
                } else if i == arr.len() {
                    arr.push(value);
                }
            }
        }
        _ => return None,
    }
    Some(path.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_parts() {
        assert_eq!(normalize(["a", "b", "c"]), "a.b.c");
        assert_eq!(normalize(["a.b", "c"]), "a.b.c");
        assert_eq!(
            normalize([Part::from("tourists"), Part::from(2usize), Part::from("name")]),
            "tourists.2.name"
        );
    }

    #[test]
    fn test_root_and_is_deep() {
        assert_eq!(root("a.b.c"), "a");
        assert_eq!(root("a"), "a");
        assert!(is_deep("a.b"));
        assert!(!is_deep("a"));
    }

    #[test]
    fn test_is_descendant() {
        assert!(is_descendant("a", "a"));
        assert!(is_descendant("a", "a.b"));
        assert!(is_descendant("a.b", "a.b.2.c"));
        assert!(!is_descendant("a.b", "a.bc"));
        assert!(!is_descendant("a.b", "a"));
    }

    #[test]
    fn test_matches_exact_and_ancestor() {
        assert!(matches("a", "a"));
        // Replacing an ancestor changes the effect's path.
        assert!(matches("a.b", "a"));
        // A descendant write does not touch the effect's own value.
        assert!(!matches("a", "a.b"));
    }

    #[test]
    fn test_matches_wildcard() {
        assert!(matches("a.*", "a"));
        assert!(matches("a.*", "a.b"));
        assert!(matches("a.*", "a.b.c"));
        assert!(matches("a.b.*", "a"));
        assert!(!matches("a.*", "b"));
        assert!(!matches("a.*", "ab"));
    }

    #[test]
    fn test_translate() {
        assert_eq!(translate("x", "y", "x.sub"), "y.sub");
        assert_eq!(translate("x", "y", "x"), "y");
        assert_eq!(translate("a.b", "z", "a.b.c.d"), "z.c.d");
    }

    #[test]
    fn test_get_in() {
        let doc = json!({"a": {"b": [10, {"c": 42}]}});
        assert_eq!(get_in(&doc, "a.b.1.c"), Some(&json!(42)));
        assert_eq!(get_in(&doc, "a.b.0"), Some(&json!(10)));
        assert_eq!(get_in(&doc, "a.x"), None);
        assert_eq!(get_in(&doc, "a.b.9"), None);
        // Non-integer segments miss on arrays.
        assert_eq!(get_in(&doc, "a.b.-1"), None);
    }

    #[test]
    fn test_set_in() {
        let mut doc = json!({"a": {"b": [1, 2]}});
        assert_eq!(set_in(&mut doc, "a.b.0", json!(9)), Some("a.b.0".into()));
        assert_eq!(doc["a"]["b"][0], json!(9));

        // Appending at the current length extends the array.
        assert_eq!(set_in(&mut doc, "a.b.2", json!(3)), Some("a.b.2".into()));
        assert_eq!(doc["a"]["b"], json!([9, 2, 3]));

        // New object keys are created.
        assert_eq!(set_in(&mut doc, "a.c", json!(true)), Some("a.c".into()));
        assert_eq!(doc["a"]["c"], json!(true));
    }

    #[test]
    fn test_set_in_missing_intermediate_is_noop() {
        let mut doc = json!({"a": 1});
        assert_eq!(set_in(&mut doc, "b.c", json!(1)), None);
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_set_in_scalar_parent_is_noop() {
        let mut doc = json!({"a": 1});
        assert_eq!(set_in(&mut doc, "a.b", json!(2)), None);
        assert_eq!(doc, json!({"a": 1}));
    }
}

use nested_validation::PathIndex;
use nested_validation::path::{
    extract_indices, flatten, is_nested_attr, resolve_attr_path, set_attr_path, strip_indices,
    without_brackets,
};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

/// Strategy for plain attribute names.
fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,7}"
}

fn indexed(base: &str, indices: &[u32]) -> String {
    let mut path = base.to_string();
    for i in indices {
        path.push_str(&format!("[{}]", i));
    }
    path
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // extract_indices returns exactly the concrete indices of the path
    #[test]
    fn extract_returns_indices(base in arb_name(), indices in prop::collection::vec(0u32..10_000, 0..5)) {
        let path = indexed(&base, &indices);
        let expected: Vec<PathIndex> = indices.iter().map(|&i| PathIndex::Index(i64::from(i))).collect();
        prop_assert_eq!(extract_indices(&path), expected);
    }

    // strip_indices replaces every index with an open bracket
    #[test]
    fn strip_opens_every_bracket(base in arb_name(), indices in prop::collection::vec(0u32..10_000, 0..5)) {
        let path = indexed(&base, &indices);
        let expected = format!("{}{}", base, "[]".repeat(indices.len()));
        prop_assert_eq!(strip_indices(&path), expected.clone());
        // stripping is idempotent
        prop_assert_eq!(strip_indices(&expected), expected);
    }

    #[test]
    fn bracket_paths_are_nested(base in arb_name(), indices in prop::collection::vec(0u32..100, 0..4)) {
        let path = indexed(&base, &indices);
        prop_assert_eq!(is_nested_attr(&path), !indices.is_empty());
        prop_assert_eq!(without_brackets(&path), base);
    }

    #[test]
    fn dotted_paths_are_nested(a in arb_name(), b in arb_name()) {
        let dotted = format!("{}.{}", a, b);
        let leading = format!(".{}", a);
        prop_assert!(is_nested_attr(&dotted));
        prop_assert!(!is_nested_attr(&leading));
    }

    // any non-open path written with set_attr_path reads back unchanged
    #[test]
    fn set_then_resolve(
        keys in prop::collection::vec(arb_name(), 1..4),
        index in prop::option::of(0usize..6),
        n in any::<i64>(),
    ) {
        let mut path = keys.join(".");
        if let Some(i) = index {
            path.push_str(&format!("[{}]", i));
        }
        let mut attrs = Map::new();
        prop_assert!(set_attr_path(&path, &mut attrs, json!(n)));
        prop_assert_eq!(resolve_attr_path(&path, &attrs), Some(&json!(n)));
    }

    // flattening registers every object level under its dotted key
    #[test]
    fn flatten_registers_every_level(keys in prop::collection::vec(arb_name(), 1..5), leaf in "[a-z]{0,6}") {
        let mut attrs = Map::new();
        let path = keys.join(".");
        prop_assert!(set_attr_path(&path, &mut attrs, Value::String(leaf.clone())));
        let flat = flatten(&attrs);
        for depth in 1..=keys.len() {
            let prefix = keys[..depth].join(".");
            prop_assert!(flat.contains_key(&prefix), "missing {}", prefix);
        }
        prop_assert_eq!(flat.get(&path), Some(&Value::String(leaf)));
    }
}

#[test]
fn unusual_index_content() {
    assert_eq!(extract_indices("a[007]"), vec![PathIndex::Index(7)]);
    assert_eq!(extract_indices("a[-1]"), vec![PathIndex::Index(-1)]);
    assert_eq!(extract_indices("a[12abc]"), vec![PathIndex::Index(12)]);
    assert_eq!(extract_indices("a[]"), vec![PathIndex::NaN]);
    assert_eq!(extract_indices("a[x][2]"), vec![PathIndex::NaN, PathIndex::Index(2)]);
    assert_eq!(extract_indices("a[3"), vec![PathIndex::NaN]);
    assert_eq!(extract_indices("[0]"), vec![]);
    assert_eq!(extract_indices("plain"), vec![]);
}

#[test]
fn strip_keeps_surrounding_segments() {
    assert_eq!(strip_indices("owners[2].address.lines[10]"), "owners[].address.lines[]");
    assert_eq!(strip_indices("plain.path"), "plain.path");
    assert_eq!(strip_indices("a[3"), "a[3");
}

#[test]
fn nesting_ignores_leading_separators() {
    assert!(!is_nested_attr("name"));
    assert!(!is_nested_attr(".name"));
    assert!(!is_nested_attr("]name"));
    assert!(is_nested_attr("a.b"));
    assert!(is_nested_attr("a[]"));
}

#[test]
fn flatten_does_not_descend_into_arrays() {
    let attrs = json!({"owner": {"name": "x", "tags": [{"a": 1}]}, "n": 1});
    let flat = flatten(attrs.as_object().unwrap());
    let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
    assert!(keys.contains(&"owner"));
    assert!(keys.contains(&"owner.name"));
    assert!(keys.contains(&"owner.tags"));
    assert!(keys.contains(&"n"));
    assert!(!keys.iter().any(|k| k.contains("tags.") || k.contains("tags[")));
}

#[test]
fn set_refuses_open_brackets() {
    let mut attrs = Map::new();
    assert!(!set_attr_path("items[]", &mut attrs, json!(1)));
    assert!(attrs.is_empty());
    assert!(set_attr_path("items[2]", &mut attrs, json!(1)));
    assert_eq!(attrs["items"], json!([null, null, 1]));
}

#[test]
fn set_refuses_indices_far_past_the_end() {
    let mut attrs = Map::new();
    assert!(!set_attr_path("tags[18446744073709551615]", &mut attrs, json!(1)));
    assert!(!set_attr_path("tags[1000000000]", &mut attrs, json!(1)));
    assert!(!set_attr_path("owner.tags[5000].name", &mut attrs, json!(1)));
    assert!(attrs.is_empty());

    // padding within reach still works
    assert!(set_attr_path("tags[3]", &mut attrs, json!(1)));
    assert_eq!(attrs["tags"], json!([null, null, null, 1]));
    assert!(set_attr_path("tags[1027]", &mut attrs, json!(2)));
    assert_eq!(attrs["tags"].as_array().map(Vec::len), Some(1028));
}

//! Open-array expansion.
//!
//! `items[]` against `{items: [a, b]}` expands to the leaves `items[0]` and
//! `items[1]`; `grid[][]` expands to one node per row, each holding one leaf
//! per cell. Expansions are recomputed from the current data on every call.

use crate::path::{resolve_attr_path, split_open_bracket};
use crate::types::SubAttributes;
use serde_json::{Map, Value};

/// Expands `path` against `attributes`.
///
/// A path without an open bracket is returned as a single leaf with no
/// indices. A missing, empty or non-sequence value at an open bracket yields
/// an empty node.
pub fn expand(path: &str, attributes: &Map<String, Value>) -> SubAttributes {
    expand_from(path, attributes, Vec::new())
}

/// Like [`expand`], prefixing every leaf's index list with `prior`.
pub fn expand_from(
    path: &str,
    attributes: &Map<String, Value>,
    prior: Vec<usize>,
) -> SubAttributes {
    let Some((prefix, remainder)) = split_open_bracket(path) else {
        return SubAttributes::Leaf {
            attr: path.to_string(),
            index: prior,
        };
    };

    let len = resolve_attr_path(prefix, attributes)
        .and_then(Value::as_array)
        .map_or(0, Vec::len);

    tracing::trace!(path, prefix, len, "expanding open array");

    let children = (0..len)
        .map(|i| {
            let mut index = prior.clone();
            index.push(i);
            expand_from(&format!("{}[{}]{}", prefix, i, remainder), attributes, index)
        })
        .collect();

    SubAttributes::Node(children)
}

//! Attribute path grammar.
//!
//! Paths use `.` for nested-record traversal, `[n]` for a concrete sequence
//! index and `[]` for an open index meaning "every element". Segments may be
//! mixed freely: `owners[2].address.lines[]`.

use crate::types::PathIndex;
use serde_json::{Map, Value};

// ─── extract_indices ────────────────────────────────────────────────────────

/// Collects the content of every bracket segment, left to right:
/// `foo[0][1]` → `[0, 1]`.
///
/// Scanning only starts when the first `[` is past position 0. Content that
/// does not begin with an integer (including the empty content of `[]`) is
/// reported as [`PathIndex::NaN`] instead of being rejected; an unterminated
/// bracket ends the scan with a `NaN` entry.
pub fn extract_indices(path: &str) -> Vec<PathIndex> {
    let mut indices = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = path[cursor..].find('[') {
        let start = cursor + rel;
        if start == 0 {
            break;
        }
        match path[start + 1..].find(']') {
            Some(rel_end) => {
                let end = start + 1 + rel_end;
                indices.push(parse_index(&path[start + 1..end]));
                cursor = end + 1;
            }
            None => {
                indices.push(PathIndex::NaN);
                break;
            }
        }
    }

    indices
}

/// Integer prefix parse: optional leading whitespace and sign, then digits.
/// Anything after the digits is ignored; no digits at all is `NaN`.
fn parse_index(content: &str) -> PathIndex {
    let trimmed = content.trim_start();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<i64>() {
        Ok(n) if negative => PathIndex::Index(-n),
        Ok(n) => PathIndex::Index(n),
        Err(_) => PathIndex::NaN,
    }
}

// ─── strip_indices ──────────────────────────────────────────────────────────

/// Empties every bracket segment: `foo[3][1]` → `foo[][]`.
///
/// Used to find the rule declared for a whole sequence rather than for one
/// element. A path with no brackets is returned unchanged.
pub fn strip_indices(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        match rest[open..].find(']') {
            Some(rel_close) => {
                out.push_str("[]");
                rest = &rest[open + rel_close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

// ─── is_nested_attr ─────────────────────────────────────────────────────────

/// True when the path uses dot or array notation: `foo.bar`, `foo[]`, `foo[1]`.
///
/// Only the first `.` and the first `]` are considered, and each must sit
/// past position 0.
pub fn is_nested_attr(path: &str) -> bool {
    matches!(path.find('.'), Some(i) if i > 0) || matches!(path.find(']'), Some(i) if i > 0)
}

/// Splits at the first open bracket: `a[].b[]` → `("a", ".b[]")`.
pub fn split_open_bracket(path: &str) -> Option<(&str, &str)> {
    path.find("[]").map(|pos| (&path[..pos], &path[pos + 2..]))
}

/// True if the path contains at least one open bracket.
pub fn has_open_bracket(path: &str) -> bool {
    path.contains("[]")
}

/// Removes every bracket segment: `owners[2].lines[]` → `owners.lines`.
pub fn without_brackets(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

// ─── Segments ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
    Open,
}

/// Splits a path into key/index segments. Returns `None` on malformed input
/// (empty key, unterminated or non-numeric bracket).
fn split_segments(path: &str) -> Option<Vec<Segment<'_>>> {
    if path.is_empty() {
        return None;
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        let (key, mut brackets) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if key.is_empty() {
            // `a.[0]` or a leading bracket has nothing to index into
            return None;
        }
        segments.push(Segment::Key(key));

        while !brackets.is_empty() {
            let close = brackets.find(']')?;
            if !brackets.starts_with('[') {
                return None;
            }
            let content = &brackets[1..close];
            if content.is_empty() {
                segments.push(Segment::Open);
            } else {
                segments.push(Segment::Index(content.parse().ok()?));
            }
            brackets = &brackets[close + 1..];
        }
    }
    Some(segments)
}

// ─── Get / set ──────────────────────────────────────────────────────────────

/// Resolves an attribute path against a record's attributes.
///
/// Returns `None` if any segment fails to resolve, the path is malformed, or
/// the path contains an open bracket.
pub fn resolve_attr_path<'a>(path: &str, attributes: &'a Map<String, Value>) -> Option<&'a Value> {
    let segments = split_segments(path)?;
    let mut iter = segments.into_iter();

    let mut current = match iter.next()? {
        Segment::Key(key) => attributes.get(key)?,
        _ => return None,
    };

    for seg in iter {
        current = match seg {
            Segment::Key(key) => current.as_object()?.get(key)?,
            Segment::Index(i) => current.as_array()?.get(i)?,
            Segment::Open => return None,
        };
    }
    Some(current)
}

/// Largest number of `null` slots a single write may pad an array with.
pub const MAX_INDEX_GAP: usize = 1024;

/// Writes `value` at `path`, creating intermediate objects and arrays as
/// needed. Arrays are padded with `null` up to the written index.
///
/// Returns `false` (leaving the attributes untouched) when the path is
/// malformed, contains an open bracket, or indexes more than
/// [`MAX_INDEX_GAP`] slots past the end of an array.
pub fn set_attr_path(path: &str, attributes: &mut Map<String, Value>, value: Value) -> bool {
    let Some(segments) = split_segments(path) else {
        return false;
    };
    if segments.contains(&Segment::Open) {
        return false;
    }

    let (first, rest) = match segments.split_first() {
        Some((Segment::Key(key), rest)) => (*key, rest),
        _ => return false,
    };

    if rest.is_empty() {
        attributes.insert(first.to_string(), value);
        return true;
    }
    if !indices_in_reach(attributes.get(first), rest) {
        return false;
    }

    let slot = attributes.entry(first.to_string()).or_insert(Value::Null);
    set_in_value(slot, rest, value);
    true
}

/// Read-only walk checking every index segment against the array it would
/// grow.
fn indices_in_reach(mut slot: Option<&Value>, segments: &[Segment<'_>]) -> bool {
    for seg in segments {
        slot = match seg {
            Segment::Key(key) => slot.and_then(Value::as_object).and_then(|map| map.get(*key)),
            Segment::Index(i) => {
                let items = slot.and_then(Value::as_array);
                let len = items.map_or(0, Vec::len);
                if *i > len.saturating_add(MAX_INDEX_GAP) {
                    return false;
                }
                items.and_then(|items| items.get(*i))
            }
            Segment::Open => return false,
        };
    }
    true
}

fn set_in_value(slot: &mut Value, segments: &[Segment<'_>], value: Value) {
    let Some((seg, rest)) = segments.split_first() else {
        *slot = value;
        return;
    };

    match seg {
        Segment::Key(key) => {
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(map) = slot {
                let child = map.entry(key.to_string()).or_insert(Value::Null);
                set_in_value(child, rest, value);
            }
        }
        Segment::Index(i) => {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(items) = slot {
                if items.len() <= *i {
                    items.resize(*i + 1, Value::Null);
                }
                set_in_value(&mut items[*i], rest, value);
            }
        }
        Segment::Open => {}
    }
}

// ─── flatten ────────────────────────────────────────────────────────────────

/// Flattens nested objects into dotted keys.
///
/// Every intermediate object is registered under its own key alongside its
/// children, so `{owner: {name: "x"}}` yields both `owner` and `owner.name`.
/// Arrays are not descended into.
pub fn flatten(attributes: &Map<String, Value>) -> Map<String, Value> {
    let mut into = Map::new();
    flatten_into(attributes, "", &mut into);
    into
}

fn flatten_into(obj: &Map<String, Value>, prefix: &str, into: &mut Map<String, Value>) {
    for (key, val) in obj {
        let full = format!("{}{}", prefix, key);
        if let Value::Object(inner) = val {
            flatten_into(inner, &format!("{}.", full), into);
        }
        into.insert(full, val.clone());
    }
}

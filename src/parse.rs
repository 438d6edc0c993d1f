use crate::error::{ParseError, ParseErrorKind};
use crate::types::RuleSet;

/// Parse a YAML (or JSON) rule-set document.
///
/// The root must be a mapping from attribute path to declaration: a rule
/// object, a list of rule objects, or a method name. Functions cannot be
/// written in a document; attach them to the returned [`RuleSet`] in code.
///
/// ```rust
/// let rules = nested_validation::parse_rules(r#"
/// name:
///   required: true
///   msg: Please enter a name
/// "tags[]":
///   - required: true
///   - maxLength: 10
/// "#).unwrap();
/// assert_eq!(rules.len(), 2);
/// ```
pub fn parse_rules(input: &str) -> Result<RuleSet, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError {
            kind: ParseErrorKind::Syntax,
            message: "empty input".to_string(),
            path: None,
        });
    }

    check_multi_document(input)?;

    let value: serde_json::Value = serde_saphyr::from_str(input).map_err(|e| {
        let msg = e.to_string();
        ParseError {
            kind: classify_saphyr_error(&msg),
            message: msg,
            path: None,
        }
    })?;

    if !value.is_object() {
        return Err(ParseError {
            kind: ParseErrorKind::TypeMismatch,
            message: "rule set must be a mapping from attribute path to rules".to_string(),
            path: None,
        });
    }

    serde_json::from_value(value).map_err(|e| {
        let msg = e.to_string();
        // declaration errors are reported as "<attr>: <reason>"
        let path = msg.split_once(": ").map(|(attr, _)| attr.to_string());
        ParseError {
            kind: ParseErrorKind::TypeMismatch,
            message: msg,
            path,
        }
    })
}

/// Check for multiple YAML documents (--- separator).
/// Only matches `---` at column 0 to avoid false positives inside block scalars.
fn check_multi_document(input: &str) -> Result<(), ParseError> {
    let mut doc_count = 0;
    for line in input.lines() {
        if line.starts_with("---") && line[3..].trim().is_empty() {
            doc_count += 1;
            if doc_count > 1 {
                return Err(ParseError {
                    kind: ParseErrorKind::Syntax,
                    message: "multi-document YAML is not supported".to_string(),
                    path: None,
                });
            }
        }
    }
    Ok(())
}

fn classify_saphyr_error(msg: &str) -> ParseErrorKind {
    let lower = msg.to_lowercase();
    if lower.contains("invalid type") || lower.contains("expected") {
        ParseErrorKind::TypeMismatch
    } else {
        ParseErrorKind::Syntax
    }
}

//! Closed enumerations used throughout the validation engine.
//!
//! These are "closed" enums: only the defined variants are built in. Custom
//! validator kinds are registered by name through
//! [`crate::config::register_validator`] and never appear here.

use serde::{Deserialize, Serialize};

/// Built-in validator kinds, keyed in rule objects by their camelCase name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidatorKind {
    Required,
    Acceptance,
    Min,
    Max,
    Range,
    Length,
    MinLength,
    MaxLength,
    RangeLength,
    OneOf,
    EqualTo,
    Pattern,
    Fn,
    InlineFn,
}

impl ValidatorKind {
    /// Every built-in kind, in catalog order.
    pub const ALL: [ValidatorKind; 14] = [
        ValidatorKind::Required,
        ValidatorKind::Acceptance,
        ValidatorKind::Min,
        ValidatorKind::Max,
        ValidatorKind::Range,
        ValidatorKind::Length,
        ValidatorKind::MinLength,
        ValidatorKind::MaxLength,
        ValidatorKind::RangeLength,
        ValidatorKind::OneOf,
        ValidatorKind::EqualTo,
        ValidatorKind::Pattern,
        ValidatorKind::Fn,
        ValidatorKind::InlineFn,
    ];

    /// The key used for this kind inside a rule object.
    pub fn as_str(self) -> &'static str {
        match self {
            ValidatorKind::Required => "required",
            ValidatorKind::Acceptance => "acceptance",
            ValidatorKind::Min => "min",
            ValidatorKind::Max => "max",
            ValidatorKind::Range => "range",
            ValidatorKind::Length => "length",
            ValidatorKind::MinLength => "minLength",
            ValidatorKind::MaxLength => "maxLength",
            ValidatorKind::RangeLength => "rangeLength",
            ValidatorKind::OneOf => "oneOf",
            ValidatorKind::EqualTo => "equalTo",
            ValidatorKind::Pattern => "pattern",
            ValidatorKind::Fn => "fn",
            ValidatorKind::InlineFn => "inlineFn",
        }
    }

    /// Looks up a built-in kind by its rule-object key.
    pub fn from_key(key: &str) -> Option<ValidatorKind> {
        ValidatorKind::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl std::fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named patterns understood by the `pattern` validator out of the box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinPattern {
    Digits,
    Number,
    Email,
    Url,
}

impl BuiltinPattern {
    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinPattern::Digits => "digits",
            BuiltinPattern::Number => "number",
            BuiltinPattern::Email => "email",
            BuiltinPattern::Url => "url",
        }
    }
}

/// Whether a full validation pass ended valid or invalid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    Valid,
    Invalid,
}

impl Validity {
    pub fn from_bool(is_valid: bool) -> Validity {
        if is_valid {
            Validity::Valid
        } else {
            Validity::Invalid
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Validity::Valid => "valid",
            Validity::Invalid => "invalid",
        }
    }
}

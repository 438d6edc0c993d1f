//! Built-in validators, default messages and named patterns.
//!
//! Every validator receives an [`Invocation`]: the value under test plus the
//! attribute, the rule parameter, the owning record, the computed snapshot and
//! the concrete indices of the leaf being validated. The invocation also
//! exposes the active formatters and the whole catalog through
//! [`Invocation::call`], so custom validators can build on the built-ins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::config;
use crate::enums::{BuiltinPattern, ValidatorKind};
use crate::error::ValidatorFault;
use crate::format::Formatters;
use crate::record::HasValidationSpec;
use crate::types::{Outcome, Param, PathIndex, Validator};

// ─── Default messages ───────────────────────────────────────────────────────

/// Message templates keyed by validator kind or pattern name. `{0}` is the
/// label, `{1}` onwards the rule parameters.
pub static DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("required", "{0} is required"),
    ("acceptance", "{0} must be accepted"),
    ("min", "{0} must be greater than or equal to {1}"),
    ("max", "{0} must be less than or equal to {1}"),
    ("range", "{0} must be between {1} and {2}"),
    ("length", "{0} must be {1} characters"),
    ("minLength", "{0} must be at least {1} characters"),
    ("maxLength", "{0} must be at most {1} characters"),
    ("rangeLength", "{0} must be between {1} and {2} characters"),
    ("oneOf", "{0} must be one of: {1}"),
    ("equalTo", "{0} must be the same as {1}"),
    ("digits", "{0} must only contain digits"),
    ("number", "{0} must be a number"),
    ("email", "{0} must be a valid email"),
    ("url", "{0} must be a valid url"),
    ("inlinePattern", "{0} is invalid"),
];

const FALLBACK_MESSAGE: &str = "{0} is invalid";

// ─── Cached regexes ─────────────────────────────────────────────────────────

/// Non-ASCII letter ranges accepted by the email and url patterns.
const UCS: &str = r"\x{00A0}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFEF}";

const DIGITS_SOURCE: &str = r"^[0-9]+$";

const NUMBER_SOURCE: &str = r"^-?(?:[0-9]+|[0-9]{1,3}(?:,[0-9]{3})+)(?:\.[0-9]+)?$";

const EMAIL_SOURCE: &str = concat!(
    r"(?i)^(?:",
    r"(?:[a-z0-9!#$%\&'*+\-/=?^_`{|}\~<U>]+(?:\.[a-z0-9!#$%\&'*+\-/=?^_`{|}\~<U>]+)*)",
    r"|",
    r#"(?:"(?:(?:(?:[\x20\x09]*\x0d\x0a)?[\x20\x09]+)?"#,
    r"(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x7f\x21\x23-\x5b\x5d-\x7e<U>]",
    r"|\\[\x01-\x09\x0b\x0c\x0d-\x7f<U>]))*",
    r#"(?:(?:[\x20\x09]*\x0d\x0a)?[\x20\x09]+)?")"#,
    r")@",
    r"(?:(?:[a-z0-9<U>]|[a-z0-9<U>][a-z0-9\-._\~<U>]*[a-z0-9<U>])\.)+",
    r"(?:[a-z<U>]|[a-z<U>][a-z0-9\-._\~<U>]*[a-z<U>])$",
);

const URL_SOURCE: &str = concat!(
    r"(?i)^(?:https?|ftp)://",
    r"(?:(?:[a-z0-9\-._\~<U>]|%[0-9a-f]{2}|[!$\&'()*+,;=]|:)*@)?",
    r"(?:",
    r"(?:(?:[0-9]|[1-9][0-9]|1[0-9][0-9]|2[0-4][0-9]|25[0-5])\.){3}",
    r"(?:[0-9]|[1-9][0-9]|1[0-9][0-9]|2[0-4][0-9]|25[0-5])",
    r"|",
    r"(?:(?:[a-z0-9<U>]|[a-z0-9<U>][a-z0-9\-._\~<U>]*[a-z0-9<U>])\.)+",
    r"(?:[a-z<U>]|[a-z<U>][a-z0-9\-._\~<U>]*[a-z<U>])\.?",
    r")",
    r"(?::[0-9]*)?",
    r"(?:/(?:<P>+(?:/<P>*)*)?)?",
    r"(?:\?(?:<P>|[\x{E000}-\x{F8FF}]|/|\?)*)?",
    r"(?:#(?:<P>|/|\?)*)?$",
);

/// One url path character: unreserved, percent-encoded, sub-delim, `:` or `@`.
const URL_PCHAR: &str = r"(?:[a-z0-9\-._\~<U>]|%[0-9a-f]{2}|[!$\&'()*+,;=:@])";

fn pattern_source(source: &str) -> String {
    source.replace("<P>", URL_PCHAR).replace("<U>", UCS)
}

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(NUMBER_SOURCE).unwrap());

/// The patterns available by name to the `pattern` validator before any
/// registration.
pub static BUILTIN_PATTERNS: LazyLock<Vec<(BuiltinPattern, Regex)>> = LazyLock::new(|| {
    vec![
        (BuiltinPattern::Digits, Regex::new(DIGITS_SOURCE).unwrap()),
        (BuiltinPattern::Number, NUMBER_RE.clone()),
        (
            BuiltinPattern::Email,
            Regex::new(&pattern_source(EMAIL_SOURCE)).unwrap(),
        ),
        (
            BuiltinPattern::Url,
            Regex::new(&pattern_source(URL_SOURCE)).unwrap(),
        ),
    ]
});

// ─── Value helpers ──────────────────────────────────────────────────────────

/// False for absent, `null`, blank-after-trim strings and empty arrays.
pub fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// True for JSON numbers and for strings matching the `number` pattern.
pub fn is_number(value: Option<&Value>) -> bool {
    as_number(value).is_some()
}

/// Numeric reading of a value. Grouping commas in numeric strings are ignored,
/// so `"1,000"` reads as `1000`.
pub fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if NUMBER_RE.is_match(s) => s.replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Deep equality with numeric comparison by value (`42 == 42.0`).
pub fn values_deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(fa), Some(fb)) => fa == fb,
            _ => a == b,
        },
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| values_deep_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|bv| values_deep_equal(v, bv)))
        }
        _ => false,
    }
}

/// Message-argument rendering of a value.
pub fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        // 18.0 renders as "18"
        Value::Number(n) if n.is_f64() => n.as_f64().map(|f| f.to_string()).unwrap_or_default(),
        Value::Number(n) => n.to_string(),
        _ => serde_json::to_string(v).unwrap_or_default(),
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ─── Invocation ─────────────────────────────────────────────────────────────

/// Everything a validator sees for one check of one leaf.
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    /// The value under test; `None` when the attribute is absent.
    pub value: Option<&'a Value>,
    pub attr: &'a str,
    pub param: &'a Param,
    pub record: &'a dyn HasValidationSpec,
    /// Flattened, read-only snapshot taken at the start of the pass.
    pub computed: &'a Map<String, Value>,
    /// Concrete indices of the leaf, outermost first. Empty for scalar paths.
    pub indices: &'a [PathIndex],
    /// Replacement template for the validator's default message.
    pub msg_key: Option<&'a str>,
    pub formatters: &'a Formatters,
}

impl<'a> Invocation<'a> {
    /// Formats a template with the active message formatter.
    pub fn format(&self, template: &str, args: &[String]) -> String {
        self.formatters.format(template, args)
    }

    /// Labels an attribute with the active label formatter.
    pub fn format_label(&self, attr: &str) -> String {
        self.formatters.format_label(attr, self.record)
    }

    /// The template for `key`, honouring `msg_key`.
    pub fn template(&self, key: &str) -> String {
        self.msg_key
            .map(str::to_string)
            .or_else(|| config::message(key))
            .or_else(|| config::message("inlinePattern"))
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
    }

    /// A failure carrying the formatted `key` message: the attribute label
    /// followed by `args`.
    pub fn fail(&self, key: &str, args: &[String]) -> Outcome {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(self.format_label(self.attr));
        all.extend_from_slice(args);
        Outcome::Fail(self.format(&self.template(key), &all))
    }

    /// Runs another built-in validator on the same value with `param`.
    pub fn call(&self, kind: ValidatorKind, param: &Param) -> Result<Outcome, ValidatorFault> {
        let inv = Invocation {
            value: self.value,
            attr: self.attr,
            param,
            record: self.record,
            computed: self.computed,
            indices: self.indices,
            msg_key: self.msg_key,
            formatters: self.formatters,
        };
        run(kind, &inv)
    }

    fn number_param(&self, kind: ValidatorKind) -> Result<f64, ValidatorFault> {
        self.param
            .as_value()
            .and_then(Value::as_f64)
            .ok_or_else(|| ValidatorFault::new(format!("{} expects a number", kind)))
    }

    fn pair_param(&self, kind: ValidatorKind) -> Result<(f64, f64), ValidatorFault> {
        match self.param.as_value().and_then(Value::as_array).map(Vec::as_slice) {
            Some([lo, hi]) => match (lo.as_f64(), hi.as_f64()) {
                (Some(lo), Some(hi)) => Ok((lo, hi)),
                _ => Err(ValidatorFault::new(format!("{} expects two numbers", kind))),
            },
            _ => Err(ValidatorFault::new(format!("{} expects two numbers", kind))),
        }
    }

    fn param_string(&self) -> String {
        self.param.as_value().map(value_to_string).unwrap_or_default()
    }
}

// ─── Dispatch ───────────────────────────────────────────────────────────────

impl Validator {
    pub fn run(&self, inv: &Invocation<'_>) -> Result<Outcome, ValidatorFault> {
        match self {
            Validator::Builtin(kind) => run(*kind, inv),
            Validator::Custom { func, .. } => func(inv),
        }
    }
}

/// Runs one built-in validator.
pub fn run(kind: ValidatorKind, inv: &Invocation<'_>) -> Result<Outcome, ValidatorFault> {
    match kind {
        ValidatorKind::Required => required(inv),
        ValidatorKind::Acceptance => Ok(acceptance(inv)),
        ValidatorKind::Min => {
            let min = inv.number_param(kind)?;
            Ok(check_number(inv, kind, |n| n >= min))
        }
        ValidatorKind::Max => {
            let max = inv.number_param(kind)?;
            Ok(check_number(inv, kind, |n| n <= max))
        }
        ValidatorKind::Range => {
            let (lo, hi) = inv.pair_param(kind)?;
            match as_number(inv.value) {
                Some(n) if n >= lo && n <= hi => Ok(Outcome::Pass),
                _ => Ok(inv.fail(kind.as_str(), &[lo.to_string(), hi.to_string()])),
            }
        }
        ValidatorKind::Length => {
            let len = inv.number_param(kind)?;
            Ok(check_length(inv, kind, |n| n == len))
        }
        ValidatorKind::MinLength => {
            let len = inv.number_param(kind)?;
            Ok(check_length(inv, kind, |n| n >= len))
        }
        ValidatorKind::MaxLength => {
            let len = inv.number_param(kind)?;
            Ok(check_length(inv, kind, |n| n <= len))
        }
        ValidatorKind::RangeLength => {
            let (lo, hi) = inv.pair_param(kind)?;
            match inv.value {
                Some(Value::String(s)) if (lo..=hi).contains(&(s.chars().count() as f64)) => {
                    Ok(Outcome::Pass)
                }
                _ => Ok(inv.fail(kind.as_str(), &[lo.to_string(), hi.to_string()])),
            }
        }
        ValidatorKind::OneOf => one_of(inv),
        ValidatorKind::EqualTo => equal_to(inv),
        ValidatorKind::Pattern => pattern(inv),
        ValidatorKind::Fn => call_fn(inv),
        ValidatorKind::InlineFn => match inv.param {
            Param::Function(f) => f(inv),
            _ => Err(ValidatorFault::new("inlineFn expects a function")),
        },
    }
}

fn required(inv: &Invocation<'_>) -> Result<Outcome, ValidatorFault> {
    let is_required = match inv.param {
        Param::Value(v) => is_truthy(v),
        Param::Predicate(p) => p(inv),
        Param::Function(_) => {
            return Err(ValidatorFault::new("required expects a boolean or a predicate"));
        }
    };
    Ok(match (is_required, has_value(inv.value)) {
        (false, false) => Outcome::Escape,
        (true, false) => inv.fail("required", &[]),
        _ => Outcome::Pass,
    })
}

fn acceptance(inv: &Invocation<'_>) -> Outcome {
    match inv.value {
        Some(Value::Bool(true)) => Outcome::Pass,
        Some(Value::String(s)) if s == "true" => Outcome::Pass,
        _ => inv.fail("acceptance", &[]),
    }
}

fn check_number(inv: &Invocation<'_>, kind: ValidatorKind, ok: impl Fn(f64) -> bool) -> Outcome {
    match as_number(inv.value) {
        Some(n) if ok(n) => Outcome::Pass,
        _ => inv.fail(kind.as_str(), &[inv.param_string()]),
    }
}

fn check_length(inv: &Invocation<'_>, kind: ValidatorKind, ok: impl Fn(f64) -> bool) -> Outcome {
    match inv.value {
        Some(Value::String(s)) if ok(s.chars().count() as f64) => Outcome::Pass,
        _ => inv.fail(kind.as_str(), &[inv.param_string()]),
    }
}

fn one_of(inv: &Invocation<'_>) -> Result<Outcome, ValidatorFault> {
    let values = inv
        .param
        .as_value()
        .and_then(Value::as_array)
        .ok_or_else(|| ValidatorFault::new("oneOf expects a list"))?;
    let found = inv
        .value
        .is_some_and(|v| values.iter().any(|candidate| values_deep_equal(v, candidate)));
    if found {
        return Ok(Outcome::Pass);
    }
    let listed = values.iter().map(value_to_string).collect::<Vec<_>>().join(", ");
    Ok(inv.fail("oneOf", &[listed]))
}

fn equal_to(inv: &Invocation<'_>) -> Result<Outcome, ValidatorFault> {
    let other = inv
        .param
        .as_value()
        .and_then(Value::as_str)
        .ok_or_else(|| ValidatorFault::new("equalTo expects an attribute name"))?;
    let equal = match (inv.value, inv.computed.get(other)) {
        (None, None) => true,
        (Some(a), Some(b)) => values_deep_equal(a, b),
        _ => false,
    };
    if equal {
        return Ok(Outcome::Pass);
    }
    Ok(inv.fail("equalTo", &[inv.format_label(other)]))
}

fn pattern(inv: &Invocation<'_>) -> Result<Outcome, ValidatorFault> {
    let name = inv
        .param
        .as_value()
        .and_then(Value::as_str)
        .ok_or_else(|| ValidatorFault::new("pattern expects a name or a regular expression"))?;
    let re = config::pattern(name).map_err(|e| ValidatorFault::new(e.message))?;
    let matches = has_value(inv.value) && inv.value.is_some_and(|v| re.is_match(&value_to_string(v)));
    if matches {
        return Ok(Outcome::Pass);
    }
    Ok(inv.fail(name, &[name.to_string()]))
}

fn call_fn(inv: &Invocation<'_>) -> Result<Outcome, ValidatorFault> {
    match inv.param {
        Param::Function(f) => f(inv),
        Param::Value(Value::String(name)) => {
            let method = inv
                .record
                .methods()
                .and_then(|methods| methods.method(name))
                .ok_or_else(|| ValidatorFault::new(format!("record has no method '{}'", name)))?;
            method(inv)
        }
        _ => Err(ValidatorFault::new("fn expects a function or a method name")),
    }
}

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::catalog::Invocation;
use crate::enums::ValidatorKind;
use crate::error::ValidatorFault;

// ─── Callables ──────────────────────────────────────────────────────────────

/// A validator implementation: custom kinds, `fn` and `inlineFn` rules, and
/// named record methods all share this shape.
pub type ValidatorFn =
    Arc<dyn Fn(&Invocation<'_>) -> Result<Outcome, ValidatorFault> + Send + Sync>;

/// A boolean parameter computed at validation time (e.g. conditional `required`).
pub type PredicateFn = Arc<dyn Fn(&Invocation<'_>) -> bool + Send + Sync>;

// ─── Outcome ────────────────────────────────────────────────────────────────

/// What a single validator reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The value satisfies the rule.
    Pass,
    /// The value violates the rule; carries the formatted message.
    Fail(String),
    /// Short-circuit the whole chain to valid (e.g. `required: false` on an
    /// empty value).
    Escape,
}

/// Folded result of a whole validator chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainOutcome {
    Valid,
    Escaped,
    Invalid(String),
}

impl ChainOutcome {
    pub fn is_valid(&self) -> bool {
        !matches!(self, ChainOutcome::Invalid(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ChainOutcome::Invalid(m) => Some(m),
            _ => None,
        }
    }
}

// ─── Param ──────────────────────────────────────────────────────────────────

/// The parameter a rule passes to its validator.
#[derive(Clone)]
pub enum Param {
    Value(Value),
    Function(ValidatorFn),
    Predicate(PredicateFn),
}

impl Param {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Param::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Wraps a closure as a validator-function parameter.
    pub fn function<F>(f: F) -> Param
    where
        F: Fn(&Invocation<'_>) -> Result<Outcome, ValidatorFault> + Send + Sync + 'static,
    {
        Param::Function(Arc::new(f))
    }

    /// Wraps a closure as a predicate parameter.
    pub fn predicate<F>(f: F) -> Param
    where
        F: Fn(&Invocation<'_>) -> bool + Send + Sync + 'static,
    {
        Param::Predicate(Arc::new(f))
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Param::Function(_) => f.write_str("Function(..)"),
            Param::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Param::Value(v)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Value(Value::Bool(v))
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Value(Value::from(v))
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Value(Value::from(v))
    }
}

impl From<u64> for Param {
    fn from(v: u64) -> Self {
        Param::Value(Value::from(v))
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Value(Value::from(v))
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Value(Value::String(v.to_string()))
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Value(Value::String(v))
    }
}

// ─── RuleObject ─────────────────────────────────────────────────────────────

/// One declared rule object, e.g. `{required: true, minLength: 3, msg: "..."}`.
///
/// Validator keys keep their declaration order; `msg` and `msg_key` apply to
/// every check in the object.
#[derive(Clone, Debug, Default)]
pub struct RuleObject {
    pub checks: Vec<(String, Param)>,
    pub msg: Option<String>,
    pub msg_key: Option<String>,
}

impl RuleObject {
    pub fn new() -> Self {
        RuleObject::default()
    }

    /// Adds a check by validator key (built-in or registered custom kind).
    pub fn check(mut self, key: impl Into<String>, param: impl Into<Param>) -> Self {
        self.checks.push((key.into(), param.into()));
        self
    }

    fn kind(self, kind: ValidatorKind, param: impl Into<Param>) -> Self {
        self.check(kind.as_str(), param)
    }

    pub fn required(self, required: bool) -> Self {
        self.kind(ValidatorKind::Required, required)
    }

    pub fn required_if<F>(self, f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> bool + Send + Sync + 'static,
    {
        self.kind(ValidatorKind::Required, Param::predicate(f))
    }

    pub fn acceptance(self) -> Self {
        self.kind(ValidatorKind::Acceptance, true)
    }

    pub fn min(self, min: impl Into<Param>) -> Self {
        self.kind(ValidatorKind::Min, min)
    }

    pub fn max(self, max: impl Into<Param>) -> Self {
        self.kind(ValidatorKind::Max, max)
    }

    pub fn range(self, lo: f64, hi: f64) -> Self {
        self.kind(ValidatorKind::Range, Value::from(vec![lo, hi]))
    }

    pub fn length(self, len: u64) -> Self {
        self.kind(ValidatorKind::Length, len)
    }

    pub fn min_length(self, len: u64) -> Self {
        self.kind(ValidatorKind::MinLength, len)
    }

    pub fn max_length(self, len: u64) -> Self {
        self.kind(ValidatorKind::MaxLength, len)
    }

    pub fn range_length(self, lo: u64, hi: u64) -> Self {
        self.kind(ValidatorKind::RangeLength, Value::from(vec![lo, hi]))
    }

    pub fn one_of<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.kind(ValidatorKind::OneOf, Value::Array(values))
    }

    pub fn equal_to(self, attr: &str) -> Self {
        self.kind(ValidatorKind::EqualTo, attr)
    }

    /// Named pattern (`digits`, `number`, `email`, `url`, or registered) or a
    /// regular expression source.
    pub fn pattern(self, pattern: &str) -> Self {
        self.kind(ValidatorKind::Pattern, pattern)
    }

    /// Runs a named method looked up on the record.
    pub fn method(self, name: &str) -> Self {
        self.kind(ValidatorKind::Fn, name)
    }

    pub fn func<F>(self, f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Outcome, ValidatorFault> + Send + Sync + 'static,
    {
        self.kind(ValidatorKind::Fn, Param::function(f))
    }

    pub fn inline_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Outcome, ValidatorFault> + Send + Sync + 'static,
    {
        self.kind(ValidatorKind::InlineFn, Param::function(f))
    }

    pub fn msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// Replaces the validator's default message template.
    pub fn msg_key(mut self, template: impl Into<String>) -> Self {
        self.msg_key = Some(template.into());
        self
    }

    fn from_map(map: &Map<String, Value>) -> Result<RuleObject, String> {
        let mut rule = RuleObject::new();
        for (key, value) in map {
            match key.as_str() {
                "msg" => {
                    let msg = value
                        .as_str()
                        .ok_or_else(|| format!("msg must be a string, got {}", value))?;
                    rule.msg = Some(msg.to_string());
                }
                "msgKey" => {
                    let template = value
                        .as_str()
                        .ok_or_else(|| format!("msgKey must be a string, got {}", value))?;
                    rule.msg_key = Some(template.to_string());
                }
                _ => rule.checks.push((key.clone(), Param::Value(value.clone()))),
            }
        }
        Ok(rule)
    }
}

// ─── RuleDecl ───────────────────────────────────────────────────────────────

/// Everything a record may declare for one attribute path.
#[derive(Clone)]
pub enum RuleDecl {
    Object(RuleObject),
    Sequence(Vec<RuleObject>),
    /// Bare string: shorthand for `{fn: "<method name>"}`.
    Method(String),
    /// Bare function: shorthand for `{fn: <function>}`.
    Function(ValidatorFn),
}

impl RuleDecl {
    pub fn function<F>(f: F) -> RuleDecl
    where
        F: Fn(&Invocation<'_>) -> Result<Outcome, ValidatorFault> + Send + Sync + 'static,
    {
        RuleDecl::Function(Arc::new(f))
    }

    fn from_value(value: &Value) -> Result<RuleDecl, String> {
        match value {
            Value::String(name) => Ok(RuleDecl::Method(name.clone())),
            Value::Object(map) => RuleObject::from_map(map).map(RuleDecl::Object),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(map) => {
                        RuleObject::from_map(map).map_err(|e| format!("[{}]: {}", i, e))
                    }
                    other => Err(format!("[{}]: rule must be an object, got {}", i, other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(RuleDecl::Sequence),
            other => Err(format!(
                "rule must be an object, a list of objects, or a method name, got {}",
                other
            )),
        }
    }
}

impl fmt::Debug for RuleDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleDecl::Object(rule) => f.debug_tuple("Object").field(rule).finish(),
            RuleDecl::Sequence(rules) => f.debug_tuple("Sequence").field(rules).finish(),
            RuleDecl::Method(name) => f.debug_tuple("Method").field(name).finish(),
            RuleDecl::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<RuleObject> for RuleDecl {
    fn from(rule: RuleObject) -> Self {
        RuleDecl::Object(rule)
    }
}

impl From<Vec<RuleObject>> for RuleDecl {
    fn from(rules: Vec<RuleObject>) -> Self {
        RuleDecl::Sequence(rules)
    }
}

impl From<&str> for RuleDecl {
    fn from(name: &str) -> Self {
        RuleDecl::Method(name.to_string())
    }
}

// ─── RuleSet ────────────────────────────────────────────────────────────────

/// A record's declared rules, keyed by attribute path in declaration order.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    entries: Vec<(String, RuleDecl)>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet::default()
    }

    /// Declares (or replaces) the rules for `attr`.
    pub fn rule(mut self, attr: impl Into<String>, decl: impl Into<RuleDecl>) -> Self {
        self.insert(attr, decl);
        self
    }

    pub fn insert(&mut self, attr: impl Into<String>, decl: impl Into<RuleDecl>) {
        let attr = attr.into();
        let decl = decl.into();
        match self.entries.iter_mut().find(|(a, _)| *a == attr) {
            Some(entry) => entry.1 = decl,
            None => self.entries.push((attr, decl)),
        }
    }

    pub fn get(&self, attr: &str) -> Option<&RuleDecl> {
        self.entries.iter().find(|(a, _)| a == attr).map(|(_, d)| d)
    }

    pub fn contains(&self, attr: &str) -> bool {
        self.get(attr).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(a, _)| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map: Map<String, Value> = Map::deserialize(deserializer)?;
        let mut rules = RuleSet::new();
        for (attr, value) in &map {
            let decl = RuleDecl::from_value(value)
                .map_err(|e| serde::de::Error::custom(format!("{}: {}", attr, e)))?;
            rules.insert(attr.clone(), decl);
        }
        Ok(rules)
    }
}

// ─── Rule ───────────────────────────────────────────────────────────────────

/// Which implementation a compiled rule dispatches to.
#[derive(Clone)]
pub enum Validator {
    Builtin(ValidatorKind),
    Custom { name: String, func: ValidatorFn },
}

impl Validator {
    pub fn name(&self) -> &str {
        match self {
            Validator::Builtin(kind) => kind.as_str(),
            Validator::Custom { name, .. } => name,
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Builtin(kind) => f.debug_tuple("Builtin").field(kind).finish(),
            Validator::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

/// One entry of a compiled validator chain.
#[derive(Clone, Debug)]
pub struct Rule {
    pub validator: Validator,
    pub param: Param,
    pub msg: Option<String>,
    pub msg_key: Option<String>,
}

// ─── Path indices and expansion ─────────────────────────────────────────────

/// The content of one concrete bracket segment.
///
/// Non-numeric content is kept as `NaN` rather than rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathIndex {
    Index(i64),
    NaN,
}

/// The concrete attribute instances an open-array path currently addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubAttributes {
    Leaf { attr: String, index: Vec<usize> },
    Node(Vec<SubAttributes>),
}

impl SubAttributes {
    /// All leaves in document order.
    pub fn leaves(&self) -> Vec<(&str, &[usize])> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<(&'a str, &'a [usize])>) {
        match self {
            SubAttributes::Leaf { attr, index } => out.push((attr, index)),
            SubAttributes::Node(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

// ─── FieldError ─────────────────────────────────────────────────────────────

/// Validation outcome for one attribute.
///
/// Open-array attributes report `Elements`, shaped like their expansion.
/// Serializes as `""`, the message, or a nested array respectively.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FieldError {
    #[default]
    None,
    Message(String),
    Elements(Vec<FieldError>),
}

impl FieldError {
    /// True if this error, or any element beneath it, carries a message.
    pub fn is_error(&self) -> bool {
        match self {
            FieldError::None => false,
            FieldError::Message(m) => !m.is_empty(),
            FieldError::Elements(items) => items.iter().any(FieldError::is_error),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            FieldError::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn elements(&self) -> Option<&[FieldError]> {
        match self {
            FieldError::Elements(items) => Some(items),
            _ => None,
        }
    }
}

impl From<ChainOutcome> for FieldError {
    fn from(outcome: ChainOutcome) -> Self {
        match outcome {
            ChainOutcome::Invalid(m) => FieldError::Message(m),
            ChainOutcome::Valid | ChainOutcome::Escaped => FieldError::None,
        }
    }
}

impl Serialize for FieldError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldError::None => serializer.serialize_str(""),
            FieldError::Message(m) => serializer.serialize_str(m),
            FieldError::Elements(items) => items.serialize(serializer),
        }
    }
}

/// Invalid attributes keyed by attribute path.
pub type InvalidAttrs = BTreeMap<String, FieldError>;

/// Result of validating a set of attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub invalid_attrs: InvalidAttrs,
}

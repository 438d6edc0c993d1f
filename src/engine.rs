//! Validation orchestration.
//!
//! [`Engine`] runs full passes (`validate`), pure queries (`pre_validate*`)
//! and validity checks (`is_valid`) against any [`HasValidationSpec`] record.
//! Settings come either from the process-wide store or from an [`Options`]
//! value fixed at construction.

use std::rc::Rc;

use serde_json::{Map, Value};

use crate::catalog::Invocation;
use crate::compile::compile;
use crate::config::{self, Options};
use crate::enums::Validity;
use crate::error::ConfigError;
use crate::expand::expand;
use crate::format::Formatters;
use crate::notify::{Scheduler, ValidationEvent};
use crate::path::{extract_indices, flatten, is_nested_attr, resolve_attr_path, set_attr_path, strip_indices};
use crate::record::HasValidationSpec;
use crate::types::{
    ChainOutcome, FieldError, InvalidAttrs, Outcome, PathIndex, Rule, SubAttributes, ValidationResult,
};

/// Per-call overrides for [`Engine::validate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Overrides the configured `force_update` for this call.
    pub force_update: Option<bool>,
}

/// What [`Engine::is_valid`] should check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidityQuery<'q> {
    /// The stored result of the last full pass, or the configured attributes
    /// when the options name any.
    Cached,
    Attr(&'q str),
    Attrs(&'q [&'q str]),
    /// Run a full pass first.
    Force,
}

// ─── Chain fold ─────────────────────────────────────────────────────────────

/// Runs every rule of `chain` against one value and folds the outcomes.
///
/// An escape from any rule makes the whole chain valid. Otherwise the first
/// failure wins, replaced by the rule's `msg` when one is declared. Every rule
/// runs even after the outcome is settled.
pub fn invoke(
    chain: &[Rule],
    record: &dyn HasValidationSpec,
    value: Option<&Value>,
    attr: &str,
    computed: &Map<String, Value>,
    indices: &[PathIndex],
    formatters: &Formatters,
) -> ChainOutcome {
    chain.iter().fold(ChainOutcome::Valid, |memo, rule| {
        let inv = Invocation {
            value,
            attr,
            param: &rule.param,
            record,
            computed,
            indices,
            msg_key: rule.msg_key.as_deref(),
            formatters,
        };
        let outcome = rule.validator.run(&inv).unwrap_or_else(|fault| {
            tracing::warn!(attr, validator = rule.validator.name(), %fault, "validator fault");
            Outcome::Fail(fault.message)
        });
        match (memo, outcome) {
            (ChainOutcome::Escaped, _) | (_, Outcome::Escape) => ChainOutcome::Escaped,
            (ChainOutcome::Valid, Outcome::Fail(message)) if !message.is_empty() => {
                let message = match &rule.msg {
                    Some(msg) if !msg.is_empty() => msg.clone(),
                    _ => message,
                };
                ChainOutcome::Invalid(message)
            }
            (memo, _) => memo,
        }
    })
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Validates records and schedules their notifications.
#[derive(Clone)]
pub struct Engine {
    options: Option<Options>,
    scheduler: Rc<dyn Scheduler>,
}

impl Engine {
    /// An engine reading the process-wide defaults on every call.
    pub fn new(scheduler: impl Scheduler + 'static) -> Self {
        Engine {
            options: None,
            scheduler: Rc::new(scheduler),
        }
    }

    /// An engine with fixed settings, independent of [`config::configure`].
    pub fn with_options(scheduler: impl Scheduler + 'static, options: Options) -> Self {
        Engine {
            options: Some(options),
            scheduler: Rc::new(scheduler),
        }
    }

    /// The settings in effect for the next call.
    pub fn options(&self) -> Options {
        self.options.clone().unwrap_or_else(config::options)
    }

    fn formatters(&self) -> Result<Formatters, ConfigError> {
        Formatters::resolve(&self.options())
    }

    // ─── Attribute validation ───────────────────────────────────────────────

    /// Validates a path, expanding open brackets against `data`.
    ///
    /// Concrete indices are stripped to find the rule, so `items[2]` is
    /// checked against the rule declared for `items[]`. Open-array paths report [`FieldError::Elements`] shaped like their
    /// expansion. `value` is used for every leaf when given; otherwise nested
    /// leaves read their value from `data`.
    pub fn validate_attribute(
        &self,
        record: &dyn HasValidationSpec,
        attr: &str,
        value: Option<&Value>,
        data: &Map<String, Value>,
        computed: &Map<String, Value>,
    ) -> Result<FieldError, ConfigError> {
        let formatters = self.formatters()?;
        validate_with_open_array(record, attr, value, data, computed, &formatters)
    }

    /// Validates `values` (path, optional value) with `data` as the record's
    /// attributes.
    pub fn validate_attrs<'v, I>(
        &self,
        record: &dyn HasValidationSpec,
        data: &Map<String, Value>,
        values: I,
    ) -> Result<ValidationResult, ConfigError>
    where
        I: IntoIterator<Item = (&'v str, Option<&'v Value>)>,
    {
        let formatters = self.formatters()?;
        let computed = flatten(data);
        let (result, _) = validate_model(record, data, &computed, values, &formatters)?;
        Ok(result)
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    /// Checks one attribute without touching the record.
    ///
    /// Without `value` the record's current value is used. A concrete element
    /// path such as `items[2]` is checked against the rules declared for
    /// `items[]`. Returns `None` when valid.
    pub fn pre_validate(
        &self,
        record: &dyn HasValidationSpec,
        attr: &str,
        value: Option<&Value>,
    ) -> Result<Option<FieldError>, ConfigError> {
        let formatters = self.formatters()?;
        let value = value.or_else(|| record.get(attr));
        let error = validate_attr(record, attr, value, &formatters)?;
        Ok(error.is_error().then_some(error))
    }

    /// Checks several attributes at their current values.
    pub fn pre_validate_attrs(
        &self,
        record: &dyn HasValidationSpec,
        attrs: &[&str],
    ) -> Result<Option<InvalidAttrs>, ConfigError> {
        let mut invalid = InvalidAttrs::new();
        for attr in attrs {
            if let Some(error) = self.pre_validate(record, attr, None)? {
                invalid.insert(attr.to_string(), error);
            }
        }
        Ok((!invalid.is_empty()).then_some(invalid))
    }

    /// Checks proposed values keyed by attribute path.
    pub fn pre_validate_values(
        &self,
        record: &dyn HasValidationSpec,
        values: &Map<String, Value>,
    ) -> Result<Option<InvalidAttrs>, ConfigError> {
        let mut invalid = InvalidAttrs::new();
        for (attr, value) in values {
            if let Some(error) = self.pre_validate(record, attr, Some(value))? {
                invalid.insert(attr.clone(), error);
            }
        }
        Ok((!invalid.is_empty()).then_some(invalid))
    }

    /// Answers whether the record, or some of its attributes, are valid.
    ///
    /// Attribute checks that fail trigger `invalid` on the record's events
    /// immediately.
    pub fn is_valid(&self, record: &dyn HasValidationSpec, query: ValidityQuery<'_>) -> Result<bool, ConfigError> {
        let configured = self.options().attributes;
        let attrs: Option<Vec<&str>> = match query {
            ValidityQuery::Attr(attr) => Some(vec![attr]),
            ValidityQuery::Attrs(attrs) => Some(attrs.to_vec()),
            ValidityQuery::Cached => configured.as_ref().map(|list| list.iter().map(String::as_str).collect()),
            ValidityQuery::Force => None,
        };

        let invalid = match &attrs {
            Some(attrs) => {
                let formatters = self.formatters()?;
                let mut invalid = InvalidAttrs::new();
                for attr in attrs {
                    let error = validate_attr(record, attr, record.get(attr), &formatters)?;
                    if error.is_error() {
                        invalid.insert(attr.to_string(), error);
                    }
                }
                (!invalid.is_empty()).then_some(invalid)
            }
            None if query == ValidityQuery::Force => self.validate(record, None, SetOptions::default())?,
            None => None,
        };

        if let Some(invalid_attrs) = &invalid {
            if let Some(events) = record.events() {
                events.trigger(&ValidationEvent::Invalid {
                    record_id: record.id().to_string(),
                    invalid_attrs: invalid_attrs.clone(),
                });
            }
        }

        if attrs.is_some() {
            return Ok(invalid.is_none());
        }
        if record.validation().is_empty() {
            return Ok(true);
        }
        Ok(record.validity().get().unwrap_or(false))
    }

    // ─── Full pass ──────────────────────────────────────────────────────────

    /// Validates the record as if `candidate` had been applied to it.
    ///
    /// Stores the aggregate validity on the record and schedules the
    /// `validated` notifications. Returns the invalid attributes when the
    /// change should be rejected: some changed attribute is invalid and
    /// force-update is off. Without a candidate every attribute counts as
    /// changed.
    pub fn validate(
        &self,
        record: &dyn HasValidationSpec,
        candidate: Option<&Map<String, Value>>,
        set_options: SetOptions,
    ) -> Result<Option<InvalidAttrs>, ConfigError> {
        let options = self.options();
        let force_update = set_options.force_update.unwrap_or(options.force_update);
        let formatters = Formatters::resolve(&options)?;

        let validated: Vec<String> = match &options.attributes {
            Some(attrs) => attrs.clone(),
            None => record.validation().keys().map(str::to_string).collect(),
        };

        let mut data = record.attributes().clone();
        if let Some(candidate) = candidate {
            for (path, value) in candidate {
                if !set_attr_path(path, &mut data, value.clone()) {
                    data.insert(path.clone(), value.clone());
                }
            }
        }
        let mut flattened = flatten(&data);
        if let Some(candidate) = candidate {
            flattened.extend(candidate.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let changed: Vec<String> = match candidate {
            Some(candidate) => flatten(candidate).keys().cloned().collect(),
            // declared attributes missing from the data count as changed too
            None => flattened.keys().chain(validated.iter()).cloned().collect(),
        };

        let values = validated.iter().map(|attr| (attr.as_str(), flattened.get(attr)));
        let (result, per_attr) = validate_model(record, &data, &flattened, values, &formatters)?;
        record.validity().set(result.is_valid);

        tracing::debug!(
            record = record.id(),
            is_valid = result.is_valid,
            invalid = ?result.invalid_attrs.keys().collect::<Vec<_>>(),
            "validation pass"
        );

        self.schedule_notifications(record, &options, &result, per_attr);

        let touched = result
            .invalid_attrs
            .keys()
            .any(|invalid| changed.iter().any(|c| touches(c, invalid)));
        if !force_update && touched {
            return Ok(Some(result.invalid_attrs));
        }
        Ok(None)
    }

    fn schedule_notifications(
        &self,
        record: &dyn HasValidationSpec,
        options: &Options,
        result: &ValidationResult,
        per_attr: Vec<(String, FieldError)>,
    ) {
        let record_id = record.id().to_string();
        let events = record.events().cloned();
        let valid = options.valid.clone();
        let invalid = options.invalid.clone();
        let selector = options.selector.clone();
        let is_valid = result.is_valid;
        let invalid_attrs = result.invalid_attrs.clone();

        tracing::trace!(record = %record_id, "scheduling validated notifications");
        self.scheduler.defer(Box::new(move || {
            for (attr, error) in &per_attr {
                if error.is_error() {
                    invalid(attr.as_str(), error, &selector);
                } else {
                    valid(attr.as_str(), &selector);
                }
            }
            let Some(events) = events else { return };
            events.trigger(&ValidationEvent::Validated {
                record_id: record_id.clone(),
                is_valid,
                invalid_attrs: invalid_attrs.clone(),
            });
            events.trigger(&ValidationEvent::ValidatedAs {
                record_id,
                validity: Validity::from_bool(is_valid),
                invalid_attrs,
            });
        }));
    }
}

/// A changed key touches an invalid key when they are equal or the invalid
/// key addresses elements of the changed one (`tags` touches `tags[]`).
fn touches(changed: &str, invalid: &str) -> bool {
    invalid == changed || invalid.strip_prefix(changed).is_some_and(|rest| rest.starts_with('['))
}

// ─── Internals ──────────────────────────────────────────────────────────────

fn validate_model<'v, I>(
    record: &dyn HasValidationSpec,
    data: &Map<String, Value>,
    computed: &Map<String, Value>,
    values: I,
    formatters: &Formatters,
) -> Result<(ValidationResult, Vec<(String, FieldError)>), ConfigError>
where
    I: IntoIterator<Item = (&'v str, Option<&'v Value>)>,
{
    let mut result = ValidationResult {
        is_valid: true,
        invalid_attrs: InvalidAttrs::new(),
    };
    let mut per_attr = Vec::new();
    for (attr, value) in values {
        let error = validate_with_open_array(record, attr, value, data, computed, formatters)?;
        if error.is_error() {
            result.is_valid = false;
            result.invalid_attrs.insert(attr.to_string(), error.clone());
        }
        per_attr.push((attr.to_string(), error));
    }
    Ok((result, per_attr))
}

fn validate_with_open_array(
    record: &dyn HasValidationSpec,
    attr: &str,
    value: Option<&Value>,
    data: &Map<String, Value>,
    computed: &Map<String, Value>,
    formatters: &Formatters,
) -> Result<FieldError, ConfigError> {
    let chain = if record.validation().contains(attr) {
        compile(record, attr)?
    } else {
        compile(record, &strip_indices(attr))?
    };
    let expansion = expand(attr, data);
    Ok(validate_expansion(&chain, record, &expansion, value, data, computed, formatters))
}

fn validate_expansion(
    chain: &[Rule],
    record: &dyn HasValidationSpec,
    expansion: &SubAttributes,
    value: Option<&Value>,
    data: &Map<String, Value>,
    computed: &Map<String, Value>,
    formatters: &Formatters,
) -> FieldError {
    match expansion {
        SubAttributes::Node(children) => FieldError::Elements(
            children
                .iter()
                .map(|child| validate_expansion(chain, record, child, value, data, computed, formatters))
                .collect(),
        ),
        SubAttributes::Leaf { attr, .. } => {
            let value = match value {
                Some(v) => Some(v),
                None if is_nested_attr(attr) => resolve_attr_path(attr, data),
                None => None,
            };
            let indices = extract_indices(attr);
            invoke(chain, record, value, attr, computed, &indices, formatters).into()
        }
    }
}

/// The query form: declared paths validate like a full pass; concrete element
/// paths fall back to the rules of their stripped form.
fn validate_attr(
    record: &dyn HasValidationSpec,
    attr: &str,
    value: Option<&Value>,
    formatters: &Formatters,
) -> Result<FieldError, ConfigError> {
    let data = record.attributes();
    let computed = flatten(data);
    if record.validation().contains(attr) {
        return validate_with_open_array(record, attr, value, data, &computed, formatters);
    }
    let indices = extract_indices(attr);
    let stripped = strip_indices(attr);
    let chain = compile(record, &stripped)?;
    Ok(invoke(&chain, record, value, &stripped, &computed, &indices, formatters).into())
}

//! Process-wide configuration and registries.
//!
//! The defaults here are read by every [`crate::engine::Engine`] built with
//! [`Engine::new`](crate::engine::Engine::new). They are meant to be set once
//! at startup: [`configure`] is global, visible to every later validation,
//! and never reset automatically. Engines built with
//! [`Engine::with_options`](crate::engine::Engine::with_options) carry their
//! own [`Options`] and ignore the global defaults.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use regex::Regex;

use crate::catalog::{BUILTIN_PATTERNS, DEFAULT_MESSAGES};
use crate::enums::ValidatorKind;
use crate::error::{ConfigError, ConfigErrorKind};
use crate::format;
use crate::record::HasValidationSpec;
use crate::types::{FieldError, ValidatorFn};

/// Turns an attribute name into a human label.
pub type LabelFormatterFn = Arc<dyn Fn(&str, &dyn HasValidationSpec) -> String + Send + Sync>;

/// Fills a message template with its arguments (label first).
pub type MessageFormatterFn = Arc<dyn Fn(&str, &[String]) -> String + Send + Sync>;

/// Called with `(attr, selector)` for every attribute that passed a full pass.
pub type ValidCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Called with `(attr, error, selector)` for every attribute that failed.
pub type InvalidCallback = Arc<dyn Fn(&str, &FieldError, &str) + Send + Sync>;

// ─── Options ────────────────────────────────────────────────────────────────

/// Resolved engine settings.
#[derive(Clone)]
pub struct Options {
    /// How UI collaborators locate fields (`name`, `id`, ...). Passed through
    /// to the callbacks untouched.
    pub selector: String,
    pub label_formatter: String,
    pub message_formatter: String,
    /// When set, `validate` never asks the caller to reject a mutation.
    pub force_update: bool,
    pub valid: ValidCallback,
    pub invalid: InvalidCallback,
    /// Restricts which attributes are validated; `None` means every attribute
    /// with a declared rule.
    pub attributes: Option<Vec<String>>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            selector: "name".to_string(),
            label_formatter: "sentenceCase".to_string(),
            message_formatter: "none".to_string(),
            force_update: false,
            valid: Arc::new(|_: &str, _: &str| {}),
            invalid: Arc::new(|_: &str, _: &FieldError, _: &str| {}),
            attributes: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("selector", &self.selector)
            .field("label_formatter", &self.label_formatter)
            .field("message_formatter", &self.message_formatter)
            .field("force_update", &self.force_update)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl Options {
    /// Overlays every field set in `update`.
    pub fn merge(&mut self, update: Configure) {
        if let Some(selector) = update.selector {
            self.selector = selector;
        }
        if let Some(name) = update.label_formatter {
            self.label_formatter = name;
        }
        if let Some(name) = update.message_formatter {
            self.message_formatter = name;
        }
        if let Some(force) = update.force_update {
            self.force_update = force;
        }
        if let Some(cb) = update.valid {
            self.valid = cb;
        }
        if let Some(cb) = update.invalid {
            self.invalid = cb;
        }
        if let Some(attrs) = update.attributes {
            self.attributes = attrs;
        }
    }
}

/// A partial update to [`Options`]; unset fields keep their current value.
#[derive(Clone, Default)]
pub struct Configure {
    pub selector: Option<String>,
    pub label_formatter: Option<String>,
    pub message_formatter: Option<String>,
    pub force_update: Option<bool>,
    pub valid: Option<ValidCallback>,
    pub invalid: Option<InvalidCallback>,
    pub attributes: Option<Option<Vec<String>>>,
}

// ─── Global store ───────────────────────────────────────────────────────────

static OPTIONS: LazyLock<RwLock<Options>> = LazyLock::new(|| RwLock::new(Options::default()));

static LABEL_FORMATTERS: LazyLock<RwLock<HashMap<String, LabelFormatterFn>>> =
    LazyLock::new(|| {
        let mut m: HashMap<String, LabelFormatterFn> = HashMap::new();
        m.insert(
            "none".to_string(),
            Arc::new(|attr: &str, _: &dyn HasValidationSpec| attr.to_string()),
        );
        m.insert(
            "sentenceCase".to_string(),
            Arc::new(|attr: &str, _: &dyn HasValidationSpec| format::sentence_case(attr)),
        );
        m.insert("label".to_string(), Arc::new(format::record_label));
        RwLock::new(m)
    });

static MESSAGE_FORMATTERS: LazyLock<RwLock<HashMap<String, MessageFormatterFn>>> =
    LazyLock::new(|| {
        let mut m: HashMap<String, MessageFormatterFn> = HashMap::new();
        m.insert("none".to_string(), Arc::new(format::format_ordinal));
        RwLock::new(m)
    });

static MESSAGES: LazyLock<RwLock<HashMap<String, String>>> = LazyLock::new(|| {
    RwLock::new(
        DEFAULT_MESSAGES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
});

static NAMED_PATTERNS: LazyLock<RwLock<HashMap<String, Regex>>> = LazyLock::new(|| {
    RwLock::new(
        BUILTIN_PATTERNS
            .iter()
            .map(|(name, re)| (name.as_str().to_string(), re.clone()))
            .collect(),
    )
});

static LITERAL_PATTERNS: LazyLock<RwLock<HashMap<String, Regex>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

static VALIDATORS: LazyLock<RwLock<HashMap<String, ValidatorFn>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Merges `update` into the process-wide defaults.
pub fn configure(update: Configure) {
    let mut options = write(&OPTIONS);
    options.merge(update);
    tracing::debug!(options = ?*options, "validation defaults reconfigured");
}

/// A snapshot of the current process-wide defaults.
pub fn options() -> Options {
    read(&OPTIONS).clone()
}

// ─── Formatters ─────────────────────────────────────────────────────────────

pub fn register_label_formatter<F>(name: &str, f: F)
where
    F: Fn(&str, &dyn HasValidationSpec) -> String + Send + Sync + 'static,
{
    write(&LABEL_FORMATTERS).insert(name.to_string(), Arc::new(f));
}

pub fn register_message_formatter<F>(name: &str, f: F)
where
    F: Fn(&str, &[String]) -> String + Send + Sync + 'static,
{
    write(&MESSAGE_FORMATTERS).insert(name.to_string(), Arc::new(f));
}

pub fn label_formatter(name: &str) -> Result<LabelFormatterFn, ConfigError> {
    read(&LABEL_FORMATTERS).get(name).cloned().ok_or_else(|| {
        ConfigError::new(
            ConfigErrorKind::UnknownLabelFormatter,
            format!("unknown label formatter: '{}'", name),
        )
    })
}

pub fn message_formatter(name: &str) -> Result<MessageFormatterFn, ConfigError> {
    read(&MESSAGE_FORMATTERS).get(name).cloned().ok_or_else(|| {
        ConfigError::new(
            ConfigErrorKind::UnknownMessageFormatter,
            format!("unknown message formatter: '{}'", name),
        )
    })
}

// ─── Messages ───────────────────────────────────────────────────────────────

/// Overrides the default message template for a validator or pattern name.
pub fn set_message(key: &str, template: &str) {
    write(&MESSAGES).insert(key.to_string(), template.to_string());
}

pub fn message(key: &str) -> Option<String> {
    read(&MESSAGES).get(key).cloned()
}

// ─── Patterns ───────────────────────────────────────────────────────────────

/// Registers a named pattern for the `pattern` validator, optionally with its
/// own default message.
pub fn register_pattern(name: &str, source: &str, message: Option<&str>) -> Result<(), ConfigError> {
    let re = Regex::new(source).map_err(|e| {
        ConfigError::new(
            ConfigErrorKind::InvalidPattern,
            format!("invalid pattern '{}': {}", name, e),
        )
    })?;
    write(&NAMED_PATTERNS).insert(name.to_string(), re);
    if let Some(template) = message {
        set_message(name, template);
    }
    Ok(())
}

/// Resolves a named pattern, or compiles (and caches) `name_or_source` as a
/// regular expression.
pub fn pattern(name_or_source: &str) -> Result<Regex, ConfigError> {
    if let Some(re) = read(&NAMED_PATTERNS).get(name_or_source) {
        return Ok(re.clone());
    }
    if let Some(re) = read(&LITERAL_PATTERNS).get(name_or_source) {
        return Ok(re.clone());
    }
    let re = Regex::new(name_or_source).map_err(|e| {
        ConfigError::new(
            ConfigErrorKind::InvalidPattern,
            format!("invalid pattern '{}': {}", name_or_source, e),
        )
    })?;
    write(&LITERAL_PATTERNS).insert(name_or_source.to_string(), re.clone());
    Ok(re)
}

// ─── Custom validators ──────────────────────────────────────────────────────

/// Registers a custom validator kind usable as a rule-object key.
///
/// Built-in kind names cannot be replaced.
pub fn register_validator<F>(name: &str, f: F) -> Result<(), ConfigError>
where
    F: Fn(&crate::catalog::Invocation<'_>) -> Result<crate::types::Outcome, crate::error::ValidatorFault>
        + Send
        + Sync
        + 'static,
{
    if ValidatorKind::from_key(name).is_some() || name == "msg" || name == "msgKey" {
        return Err(ConfigError::new(
            ConfigErrorKind::UnknownValidator,
            format!("'{}' is reserved and cannot be registered", name),
        ));
    }
    write(&VALIDATORS).insert(name.to_string(), Arc::new(f));
    tracing::debug!(name, "registered custom validator");
    Ok(())
}

pub fn custom_validator(name: &str) -> Option<ValidatorFn> {
    read(&VALIDATORS).get(name).cloned()
}

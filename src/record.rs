//! What the engine needs from a record, and a ready-made record type.

use std::borrow::Cow;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::catalog::Invocation;
use crate::engine::{Engine, SetOptions};
use crate::error::{ConfigError, ValidatorFault};
use crate::notify::EventBus;
use crate::path::{resolve_attr_path, set_attr_path};
use crate::types::{InvalidAttrs, Outcome, RuleSet, ValidatorFn};

/// Resolves the method names used by `fn` rules and bare-string declarations.
pub trait NamedMethodLookup {
    fn method(&self, name: &str) -> Option<ValidatorFn>;
}

impl NamedMethodLookup for HashMap<String, ValidatorFn> {
    fn method(&self, name: &str) -> Option<ValidatorFn> {
        self.get(name).cloned()
    }
}

/// The capability a record exposes to the validation engine.
pub trait HasValidationSpec {
    /// Identifies the record in notifications.
    fn id(&self) -> &str;

    /// Current attribute values.
    fn attributes(&self) -> &Map<String, Value>;

    /// Declared rules. May be computed on each call.
    fn validation(&self) -> Cow<'_, RuleSet>;

    /// Human labels keyed by attribute path, used by the `label` formatter.
    fn labels(&self) -> Option<&HashMap<String, String>> {
        None
    }

    fn methods(&self) -> Option<&dyn NamedMethodLookup> {
        None
    }

    /// Where the aggregate result of the last full pass is stored.
    fn validity(&self) -> &ValidityState;

    fn events(&self) -> Option<&EventBus> {
        None
    }

    /// Reads an attribute by path.
    fn get(&self, path: &str) -> Option<&Value> {
        resolve_attr_path(path, self.attributes())
    }
}

/// Cached validity: unset until the first full pass.
#[derive(Debug, Default)]
pub struct ValidityState(Cell<Option<bool>>);

impl ValidityState {
    pub fn get(&self) -> Option<bool> {
        self.0.get()
    }

    pub(crate) fn set(&self, is_valid: bool) {
        self.0.set(Some(is_valid));
    }
}

// ─── Model ──────────────────────────────────────────────────────────────────

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A plain record: attributes, rules, labels and named methods.
#[derive(Debug)]
pub struct Model {
    id: String,
    attributes: Map<String, Value>,
    rules: RuleSet,
    labels: HashMap<String, String>,
    methods: MethodTable,
    validity: ValidityState,
    events: EventBus,
}

#[derive(Default)]
struct MethodTable(HashMap<String, ValidatorFn>);

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

impl Model {
    pub fn new(rules: RuleSet) -> Self {
        Model {
            id: format!("model-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            attributes: Map::new(),
            rules,
            labels: HashMap::new(),
            methods: MethodTable::default(),
            validity: ValidityState::default(),
            events: EventBus::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Adds a method that `fn` rules and bare-string declarations can name.
    pub fn with_method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Outcome, ValidatorFault> + Send + Sync + 'static,
    {
        self.methods.0.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn rules_mut(&mut self) -> &mut RuleSet {
        &mut self.rules
    }

    /// Writes a value without validating it.
    pub fn put(&mut self, path: &str, value: Value) -> bool {
        set_attr_path(path, &mut self.attributes, value)
    }

    /// Validates `candidate` and applies it only if the engine accepts it.
    ///
    /// Returns the invalid attributes when the change was rejected.
    pub fn set(
        &mut self,
        engine: &Engine,
        candidate: Map<String, Value>,
        options: SetOptions,
    ) -> Result<Option<InvalidAttrs>, ConfigError> {
        if let Some(invalid) = engine.validate(&*self, Some(&candidate), options)? {
            return Ok(Some(invalid));
        }
        for (path, value) in candidate {
            if !self.put(&path, value) {
                tracing::debug!(record = %self.id, path = %path, "skipped unaddressable attribute");
            }
        }
        Ok(None)
    }
}

impl HasValidationSpec for Model {
    fn id(&self) -> &str {
        &self.id
    }

    fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    fn validation(&self) -> Cow<'_, RuleSet> {
        Cow::Borrowed(&self.rules)
    }

    fn labels(&self) -> Option<&HashMap<String, String>> {
        Some(&self.labels)
    }

    fn methods(&self) -> Option<&dyn NamedMethodLookup> {
        Some(&self.methods.0)
    }

    fn validity(&self) -> &ValidityState {
        &self.validity
    }

    fn events(&self) -> Option<&EventBus> {
        Some(&self.events)
    }
}

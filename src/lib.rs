//! Declarative validation for nested, array-bearing records.
//!
//! Records declare rules per attribute path. Paths use `.` for nesting, `[n]`
//! for one element and `[]` for every element of a sequence:
//!
//! ```text
//! RuleSet ─ compile ─→ [Rule] ─┐
//! attributes ─ expand("tags[]") ─→ tags[0], tags[1], ... ─ invoke ─→ FieldError
//! ```
//!
//! An [`Engine`] runs full passes ([`Engine::validate`]), side-effect-free
//! queries ([`Engine::pre_validate`]) and validity checks
//! ([`Engine::is_valid`]). Full passes schedule their notifications on a
//! [`Scheduler`]; with a [`TaskQueue`] the host drains them explicitly.
//!
//! # Quick Start
//!
//! ```rust
//! use nested_validation::{Engine, HasValidationSpec, Model, RuleObject, RuleSet, SetOptions, TaskQueue};
//! use serde_json::json;
//!
//! let rules = RuleSet::new()
//!     .rule("age", RuleObject::new().min(18))
//!     .rule("tags[]", RuleObject::new().required(true));
//! let mut model = Model::new(rules);
//!
//! let queue = TaskQueue::new();
//! let engine = Engine::new(queue.clone());
//!
//! let candidate = json!({"age": 10, "tags": ["a", ""]});
//! let rejected = model
//!     .set(&engine, candidate.as_object().unwrap().clone(), SetOptions::default())
//!     .unwrap()
//!     .expect("age is too low");
//! assert_eq!(rejected["age"].message(), Some("Age must be greater than or equal to 18"));
//! assert_eq!(model.validity().get(), Some(false));
//!
//! // notifications run once the current unit of work is done
//! assert_eq!(queue.run_pending(), 1);
//! ```

pub mod catalog;
pub mod compile;
pub mod config;
pub mod engine;
pub mod enums;
pub mod error;
pub mod expand;
pub mod format;
pub mod notify;
pub mod parse;
pub mod path;
pub mod record;
pub mod types;

pub use error::*;
pub use types::*;

pub use catalog::Invocation;
pub use config::{Configure, Options, configure};
pub use engine::{Engine, SetOptions, ValidityQuery};
pub use enums::{BuiltinPattern, ValidatorKind, Validity};
pub use notify::{EventBus, Scheduler, TaskQueue, ValidationEvent};
pub use parse::parse_rules;
pub use record::{HasValidationSpec, Model, NamedMethodLookup, ValidityState};

use serde_json::{Map, Value};

/// Validates `attributes` against every rule in `rules` once, without a
/// record, notifications or stored state.
///
/// Uses the process-wide label and message formatters.
///
/// ```rust
/// use nested_validation::{RuleObject, RuleSet};
/// use serde_json::json;
///
/// let rules = RuleSet::new().rule("email", RuleObject::new().pattern("email"));
/// let attrs = json!({"email": "not-an-email"});
/// let result = nested_validation::check(rules, attrs.as_object().unwrap().clone()).unwrap();
/// assert!(!result.is_valid);
/// assert_eq!(result.invalid_attrs["email"].message(), Some("Email must be a valid email"));
/// ```
pub fn check(rules: RuleSet, attributes: Map<String, Value>) -> Result<ValidationResult, ConfigError> {
    let model = Model::new(rules).with_attributes(attributes);
    let engine = Engine::new(TaskQueue::new());
    let declared: Vec<String> = model.validation().keys().map(str::to_string).collect();
    let flattened = path::flatten(model.attributes());
    engine.validate_attrs(
        &model,
        model.attributes(),
        declared.iter().map(|attr| (attr.as_str(), flattened.get(attr))),
    )
}

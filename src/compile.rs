//! Rule compilation.
//!
//! Turns the declaration for one attribute path into the flat, ordered chain
//! of [`Rule`]s the engine folds over. Shape problems are reported here, so a
//! chain that compiles only ever fails with validation messages.

use serde_json::Value;

use crate::config;
use crate::enums::ValidatorKind;
use crate::error::{ConfigError, ConfigErrorKind};
use crate::record::HasValidationSpec;
use crate::types::{Param, Rule, RuleDecl, RuleObject, Validator};

/// Compiles the chain declared for exactly `attr`. An undeclared path yields
/// an empty chain.
pub fn compile(record: &dyn HasValidationSpec, attr: &str) -> Result<Vec<Rule>, ConfigError> {
    let rules = record.validation();
    let Some(decl) = rules.get(attr) else {
        return Ok(Vec::new());
    };
    let chain = compile_decl(record, decl).map_err(|e| e.at(attr))?;
    tracing::debug!(
        attr,
        validators = ?chain.iter().map(|r| r.validator.name()).collect::<Vec<_>>(),
        "compiled rule chain"
    );
    Ok(chain)
}

/// Compiles one declaration. Rule objects expand to one entry per validator
/// key, in key order, each sharing the object's `msg` and `msg_key`.
pub fn compile_decl(record: &dyn HasValidationSpec, decl: &RuleDecl) -> Result<Vec<Rule>, ConfigError> {
    match decl {
        RuleDecl::Object(object) => compile_object(record, object),
        RuleDecl::Sequence(objects) => {
            let mut chain = Vec::new();
            for object in objects {
                chain.extend(compile_object(record, object)?);
            }
            Ok(chain)
        }
        RuleDecl::Method(name) => Ok(vec![Rule {
            validator: Validator::Builtin(ValidatorKind::Fn),
            param: resolve_method(record, name)?,
            msg: None,
            msg_key: None,
        }]),
        RuleDecl::Function(f) => Ok(vec![Rule {
            validator: Validator::Builtin(ValidatorKind::Fn),
            param: Param::Function(f.clone()),
            msg: None,
            msg_key: None,
        }]),
    }
}

fn compile_object(record: &dyn HasValidationSpec, object: &RuleObject) -> Result<Vec<Rule>, ConfigError> {
    object
        .checks
        .iter()
        .map(|(key, param)| {
            let (validator, param) = match ValidatorKind::from_key(key) {
                Some(kind) => (Validator::Builtin(kind), check_param(record, kind, param)?),
                None => {
                    let func = config::custom_validator(key).ok_or_else(|| {
                        ConfigError::new(
                            ConfigErrorKind::UnknownValidator,
                            format!("unknown validator '{}'", key),
                        )
                    })?;
                    let validator = Validator::Custom {
                        name: key.clone(),
                        func,
                    };
                    (validator, param.clone())
                }
            };
            Ok(Rule {
                validator,
                param,
                msg: object.msg.clone(),
                msg_key: object.msg_key.clone(),
            })
        })
        .collect()
}

fn invalid(kind: ValidatorKind, expected: &str, param: &Param) -> ConfigError {
    ConfigError::new(
        ConfigErrorKind::InvalidParameter,
        format!("{} expects {}, got {:?}", kind, expected, param),
    )
}

fn is_number_pair(v: &Value) -> bool {
    matches!(v.as_array().map(Vec::as_slice), Some([lo, hi]) if lo.is_number() && hi.is_number())
}

/// Checks a built-in parameter's shape and resolves method names.
fn check_param(
    record: &dyn HasValidationSpec,
    kind: ValidatorKind,
    param: &Param,
) -> Result<Param, ConfigError> {
    let value = param.as_value();
    let ok = match kind {
        ValidatorKind::Required => {
            matches!(param, Param::Predicate(_)) || value.is_some_and(Value::is_boolean)
        }
        ValidatorKind::Acceptance => true,
        ValidatorKind::Min
        | ValidatorKind::Max
        | ValidatorKind::Length
        | ValidatorKind::MinLength
        | ValidatorKind::MaxLength => value.is_some_and(Value::is_number),
        ValidatorKind::Range | ValidatorKind::RangeLength => value.is_some_and(is_number_pair),
        ValidatorKind::OneOf => value.is_some_and(Value::is_array),
        ValidatorKind::EqualTo => value.is_some_and(Value::is_string),
        ValidatorKind::Pattern => match value.and_then(Value::as_str) {
            Some(source) => {
                config::pattern(source)?;
                true
            }
            None => false,
        },
        ValidatorKind::Fn => match param {
            Param::Function(_) => true,
            Param::Value(Value::String(name)) => return resolve_method(record, name),
            _ => false,
        },
        ValidatorKind::InlineFn => matches!(param, Param::Function(_)),
    };
    if !ok {
        let expected = match kind {
            ValidatorKind::Required => "a boolean or a predicate",
            ValidatorKind::Range | ValidatorKind::RangeLength => "a pair of numbers",
            ValidatorKind::OneOf => "a list",
            ValidatorKind::EqualTo => "an attribute name",
            ValidatorKind::Pattern => "a pattern name or a regular expression",
            ValidatorKind::Fn => "a function or a method name",
            ValidatorKind::InlineFn => "a function",
            _ => "a number",
        };
        return Err(invalid(kind, expected, param));
    }
    Ok(param.clone())
}

fn resolve_method(record: &dyn HasValidationSpec, name: &str) -> Result<Param, ConfigError> {
    record
        .methods()
        .and_then(|methods| methods.method(name))
        .map(Param::Function)
        .ok_or_else(|| {
            ConfigError::new(
                ConfigErrorKind::UnknownMethod,
                format!("record has no method '{}'", name),
            )
        })
}

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use nested_validation::{
    ConfigErrorKind, Engine, FieldError, HasValidationSpec, Model, Options, Outcome, PathIndex,
    RuleDecl, RuleObject, RuleSet, SetOptions, TaskQueue, ValidationEvent, ValidatorFault,
    ValidityQuery,
};
use serde_json::{Map, Value, json};

fn obj(v: Value) -> Map<String, Value> {
    v.as_object().cloned().expect("test fixture must be an object")
}

fn engine() -> Engine {
    Engine::with_options(TaskQueue::new(), Options::default())
}

fn engine_with(options: Options) -> (Engine, TaskQueue) {
    let queue = TaskQueue::new();
    (Engine::with_options(queue.clone(), options), queue)
}

fn msg(s: &str) -> FieldError {
    FieldError::Message(s.to_string())
}

// ─── Concrete element paths ─────────────────────────────────────────────────

#[test]
fn element_path_uses_open_array_rule() {
    let model = Model::new(RuleSet::new().rule("tags[]", RuleObject::new().max_length(3)));
    let engine = engine();

    let long = engine.pre_validate(&model, "tags[1]", Some(&json!("toolong"))).unwrap();
    assert_eq!(long, Some(msg("Tags must be at most 3 characters")));

    let short = engine.pre_validate(&model, "tags[1]", Some(&json!("ok"))).unwrap();
    assert_eq!(short, None);
}

#[test]
fn validate_attribute_strips_element_indices() {
    let model = Model::new(RuleSet::new().rule("items[]", RuleObject::new().required(true)))
        .with_attributes(obj(json!({"items": ["a", ""]})));
    let engine = engine();
    let data = model.attributes().clone();

    let whole = engine
        .validate_attribute(&model, "items[]", None, &data, &Map::new())
        .unwrap();
    assert_eq!(whole, FieldError::Elements(vec![FieldError::None, msg("Items is required")]));

    let single = engine
        .validate_attribute(&model, "items[1]", Some(&json!("")), &data, &Map::new())
        .unwrap();
    assert_eq!(single, msg("Items is required"));

    // without a value the element is read from the data
    let read = engine
        .validate_attribute(&model, "items[1]", None, &data, &Map::new())
        .unwrap();
    assert_eq!(read, msg("Items is required"));
    let read = engine
        .validate_attribute(&model, "items[0]", None, &data, &Map::new())
        .unwrap();
    assert_eq!(read, FieldError::None);
}

#[test]
fn oversized_candidate_index_does_not_grow_arrays() {
    let model = Model::new(RuleSet::new().rule("tags[]", RuleObject::new().max_length(3)))
        .with_attributes(obj(json!({"tags": ["a"]})));
    let engine = engine();

    for key in ["tags[18446744073709551615]", "tags[1000000000]"] {
        let mut candidate = Map::new();
        candidate.insert(key.to_string(), json!("x"));
        let rejected = engine
            .validate(&model, Some(&candidate), SetOptions::default())
            .unwrap();
        assert_eq!(rejected, None, "{key}");
    }
    assert_eq!(model.attributes()["tags"], json!(["a"]));
}

#[test]
fn element_path_passes_indices_to_validators() {
    let seen: Arc<Mutex<Vec<Vec<PathIndex>>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let rules = RuleSet::new().rule(
        "rows[].cells[]",
        RuleObject::new().inline_fn(move |inv| {
            sink.lock().unwrap().push(inv.indices.to_vec());
            Ok(Outcome::Pass)
        }),
    );
    let model = Model::new(rules);

    engine()
        .pre_validate(&model, "rows[2].cells[5]", Some(&json!(1)))
        .unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![vec![PathIndex::Index(2), PathIndex::Index(5)]]
    );
}

#[test]
fn non_numeric_index_is_passed_through_as_nan() {
    let seen: Arc<Mutex<Vec<Vec<PathIndex>>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let rules = RuleSet::new().rule(
        "items[]",
        RuleObject::new().inline_fn(move |inv| {
            sink.lock().unwrap().push(inv.indices.to_vec());
            Ok(Outcome::Pass)
        }),
    );
    let model = Model::new(rules);

    engine()
        .pre_validate(&model, "items[abc]", Some(&json!("x")))
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![vec![PathIndex::NaN]]);
}

#[test]
fn expansion_indices_reach_validators() {
    let seen: Arc<Mutex<Vec<(String, Vec<PathIndex>)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let rules = RuleSet::new().rule(
        "grid[][]",
        RuleObject::new().inline_fn(move |inv| {
            sink.lock()
                .unwrap()
                .push((inv.attr.to_string(), inv.indices.to_vec()));
            Ok(Outcome::Pass)
        }),
    );
    let model = Model::new(rules).with_attributes(obj(json!({"grid": [[1, 2], [3]]})));

    engine().validate(&model, None, SetOptions::default()).unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ("grid[0][0]".to_string(), vec![PathIndex::Index(0), PathIndex::Index(0)]),
            ("grid[0][1]".to_string(), vec![PathIndex::Index(0), PathIndex::Index(1)]),
            ("grid[1][0]".to_string(), vec![PathIndex::Index(1), PathIndex::Index(0)]),
        ]
    );
}

// ─── Open-array shapes ──────────────────────────────────────────────────────

#[test]
fn nested_open_arrays_keep_their_shape() {
    let model = Model::new(RuleSet::new().rule("grid[][]", RuleObject::new().pattern("digits")))
        .with_attributes(obj(json!({"grid": [[1, "x"], ["y"]]})));

    let invalid = engine()
        .validate(&model, None, SetOptions::default())
        .unwrap()
        .expect("grid has non-digit cells");
    let digits = "Grid must only contain digits";
    assert_eq!(
        invalid["grid[][]"],
        FieldError::Elements(vec![
            FieldError::Elements(vec![FieldError::None, msg(digits)]),
            FieldError::Elements(vec![msg(digits)]),
        ])
    );
}

#[test]
fn open_array_on_missing_or_scalar_value_is_valid() {
    let rules = RuleSet::new().rule("tags[]", RuleObject::new().required(true));
    for attrs in [json!({}), json!({"tags": "not a list"}), json!({"tags": []})] {
        let model = Model::new(rules.clone()).with_attributes(obj(attrs.clone()));
        let engine = engine();
        let error = engine
            .validate_attribute(&model, "tags[]", None, model.attributes(), &Map::new())
            .unwrap();
        assert_eq!(error, FieldError::Elements(vec![]), "attrs {attrs}");
        assert!(engine.is_valid(&model, ValidityQuery::Attr("tags[]")).unwrap());
    }
}

#[test]
fn open_array_nested_in_objects() {
    let rules = RuleSet::new().rule("owners[].name", RuleObject::new().required(true));
    let model = Model::new(rules)
        .with_labels([("owners.name", "Owner name")])
        .with_attributes(obj(json!({"owners": [{"name": "a"}, {"name": " "}]})));
    let options = Options {
        label_formatter: "label".to_string(),
        ..Options::default()
    };
    let (engine, _) = engine_with(options);

    let invalid = engine.validate(&model, None, SetOptions::default()).unwrap().unwrap();
    assert_eq!(
        invalid["owners[].name"],
        FieldError::Elements(vec![FieldError::None, msg("Owner name is required")])
    );
}

// ─── Chain fold ─────────────────────────────────────────────────────────────

#[test]
fn first_failure_wins() {
    let rules = RuleSet::new().rule(
        "code",
        vec![RuleObject::new().min_length(5), RuleObject::new().pattern("digits")],
    );
    let model = Model::new(rules);
    let error = engine().pre_validate(&model, "code", Some(&json!("ab"))).unwrap();
    assert_eq!(error, Some(msg("Code must be at least 5 characters")));
}

#[test]
fn msg_overrides_every_check_in_its_object() {
    let rules = RuleSet::new().rule(
        "code",
        RuleObject::new().required(true).min_length(5).msg("Bad code"),
    );
    let model = Model::new(rules);
    let engine = engine();
    assert_eq!(
        engine.pre_validate(&model, "code", Some(&json!(""))).unwrap(),
        Some(msg("Bad code"))
    );
    assert_eq!(
        engine.pre_validate(&model, "code", Some(&json!("abc"))).unwrap(),
        Some(msg("Bad code"))
    );
}

#[test]
fn msg_key_replaces_template() {
    let rules = RuleSet::new().rule(
        "count",
        RuleObject::new().min(3).msg_key("{0} too small, min {1}"),
    );
    let model = Model::new(rules);
    let error = engine().pre_validate(&model, "count", Some(&json!(1))).unwrap();
    assert_eq!(error, Some(msg("Count too small, min 3")));
}

#[test]
fn every_rule_runs_after_escape() {
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let rules = RuleSet::new().rule(
        "note",
        vec![
            RuleObject::new().required(false),
            RuleObject::new().inline_fn(move |_| {
                *counter.lock().unwrap() += 1;
                Ok(Outcome::Fail("never reported".to_string()))
            }),
        ],
    );
    let model = Model::new(rules);
    let error = engine().pre_validate(&model, "note", Some(&json!(""))).unwrap();
    assert_eq!(error, None);
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn validator_fault_becomes_message() {
    let rules = RuleSet::new().rule(
        "field",
        RuleObject::new().inline_fn(|_| Err(ValidatorFault::new("lookup service unavailable"))),
    );
    let model = Model::new(rules);
    let error = engine().pre_validate(&model, "field", Some(&json!(1))).unwrap();
    assert_eq!(error, Some(msg("lookup service unavailable")));
}

// ─── Labels ─────────────────────────────────────────────────────────────────

#[test]
fn label_formatters() {
    let rules = RuleSet::new()
        .rule("email", RuleObject::new().required(true))
        .rule("first_name", RuleObject::new().required(true));
    let model = Model::new(rules).with_labels([("email", "E-mail address")]);

    let cases = [
        ("none", "email is required", "first_name is required"),
        ("sentenceCase", "Email is required", "First name is required"),
        ("label", "E-mail address is required", "First name is required"),
    ];
    for (formatter, email, first_name) in cases {
        let options = Options {
            label_formatter: formatter.to_string(),
            ..Options::default()
        };
        let (engine, _) = engine_with(options);
        let invalid = engine
            .pre_validate_values(&model, &obj(json!({"email": "", "first_name": ""})))
            .unwrap()
            .unwrap();
        assert_eq!(invalid["email"], msg(email), "formatter {formatter}");
        assert_eq!(invalid["first_name"], msg(first_name), "formatter {formatter}");
    }
}

// ─── Methods and predicates ─────────────────────────────────────────────────

#[test]
fn named_methods_resolve_on_the_record() {
    let rules = RuleSet::new()
        .rule("name", "checkName")
        .rule("alias", RuleObject::new().method("checkName").msg("Alias taken"));
    let model = Model::new(rules).with_method("checkName", |inv| {
        Ok(match inv.value.and_then(Value::as_str) {
            Some("admin") => Outcome::Fail(format!("{} is reserved", inv.attr)),
            _ => Outcome::Pass,
        })
    });
    let engine = engine();

    assert_eq!(
        engine.pre_validate(&model, "name", Some(&json!("admin"))).unwrap(),
        Some(msg("name is reserved"))
    );
    assert_eq!(
        engine.pre_validate(&model, "alias", Some(&json!("admin"))).unwrap(),
        Some(msg("Alias taken"))
    );
    assert_eq!(engine.pre_validate(&model, "name", Some(&json!("bob"))).unwrap(), None);
}

#[test]
fn function_declarations_see_the_computed_snapshot() {
    let rules = RuleSet::new().rule(
        "end",
        RuleDecl::function(|inv| {
            let start = inv.computed.get("start").and_then(Value::as_i64);
            let end = inv.value.and_then(Value::as_i64);
            Ok(match (start, end) {
                (Some(s), Some(e)) if e < s => Outcome::Fail("End must follow start".to_string()),
                _ => Outcome::Pass,
            })
        }),
    );
    let model = Model::new(rules).with_attributes(obj(json!({"start": 5, "end": 9})));
    let engine = engine();

    let rejected = engine
        .validate(&model, Some(&obj(json!({"end": 2}))), SetOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(rejected["end"], msg("End must follow start"));

    let accepted = engine
        .validate(&model, Some(&obj(json!({"start": 1, "end": 2}))), SetOptions::default())
        .unwrap();
    assert_eq!(accepted, None);
}

#[test]
fn conditional_required() {
    let rules = RuleSet::new().rule(
        "zip",
        RuleObject::new().required_if(|inv| inv.computed.get("country") == Some(&json!("US"))),
    );
    let model = Model::new(rules);
    let engine = engine();

    let us = engine
        .validate(&model, Some(&obj(json!({"country": "US", "zip": ""}))), SetOptions::default())
        .unwrap();
    assert_eq!(us.unwrap()["zip"], msg("Zip is required"));

    let other = engine
        .validate(&model, Some(&obj(json!({"country": "FR", "zip": ""}))), SetOptions::default())
        .unwrap();
    assert_eq!(other, None);
}

// ─── Configuration errors ───────────────────────────────────────────────────

#[test]
fn unknown_validator_fails_fast() {
    let model = Model::new(RuleSet::new().rule("x", RuleObject::new().check("noSuchValidator", true)));
    let err = engine().validate(&model, None, SetOptions::default()).unwrap_err();
    assert_eq!(err.kind, ConfigErrorKind::UnknownValidator);
    assert_eq!(err.path.as_deref(), Some("x"));
}

#[test]
fn malformed_parameters_fail_fast() {
    let cases = [
        RuleObject::new().min("eighteen"),
        RuleObject::new().check("range", 5),
        RuleObject::new().check("oneOf", "red"),
        RuleObject::new().check("required", "yes"),
        RuleObject::new().check("inlineFn", true),
    ];
    for rule in cases {
        let model = Model::new(RuleSet::new().rule("x", rule.clone()));
        let err = engine().pre_validate(&model, "x", Some(&json!(1))).unwrap_err();
        assert_eq!(err.kind, ConfigErrorKind::InvalidParameter, "rule {rule:?}");
    }
}

#[test]
fn invalid_regex_fails_fast() {
    let model = Model::new(RuleSet::new().rule("x", RuleObject::new().pattern("([unclosed")));
    let err = engine().pre_validate(&model, "x", Some(&json!("a"))).unwrap_err();
    assert_eq!(err.kind, ConfigErrorKind::InvalidPattern);
}

#[test]
fn unknown_method_fails_fast() {
    let model = Model::new(RuleSet::new().rule("x", "missingMethod"));
    let err = engine().pre_validate(&model, "x", Some(&json!(1))).unwrap_err();
    assert_eq!(err.kind, ConfigErrorKind::UnknownMethod);
}

#[test]
fn unknown_formatters_fail_fast() {
    let model = Model::new(RuleSet::new().rule("x", RuleObject::new().required(true)));

    let (label, _) = engine_with(Options {
        label_formatter: "shouting".to_string(),
        ..Options::default()
    });
    let err = label.validate(&model, None, SetOptions::default()).unwrap_err();
    assert_eq!(err.kind, ConfigErrorKind::UnknownLabelFormatter);

    let (message, _) = engine_with(Options {
        message_formatter: "icu".to_string(),
        ..Options::default()
    });
    let err = message.pre_validate(&model, "x", None).unwrap_err();
    assert_eq!(err.kind, ConfigErrorKind::UnknownMessageFormatter);
}

// ─── is_valid ───────────────────────────────────────────────────────────────

#[test]
fn cached_validity() {
    let engine = engine();

    let unruled = Model::new(RuleSet::new());
    assert!(engine.is_valid(&unruled, ValidityQuery::Cached).unwrap());

    let model = Model::new(RuleSet::new().rule("age", RuleObject::new().min(18)))
        .with_attributes(obj(json!({"age": 30})));
    assert!(
        !engine.is_valid(&model, ValidityQuery::Cached).unwrap(),
        "no pass has run yet"
    );
    assert!(engine.is_valid(&model, ValidityQuery::Force).unwrap());
    assert!(engine.is_valid(&model, ValidityQuery::Cached).unwrap());
}

#[test]
fn attribute_checks_trigger_invalid_immediately() {
    let rules = RuleSet::new()
        .rule("name", RuleObject::new().required(true))
        .rule("age", RuleObject::new().min(18));
    let model = Model::new(rules).with_attributes(obj(json!({"name": "", "age": 40})));
    let engine = engine();

    let events: Rc<RefCell<Vec<Vec<String>>>> = Rc::default();
    let sink = Rc::clone(&events);
    model.events().unwrap().subscribe("invalid", move |event| {
        if let ValidationEvent::Invalid { invalid_attrs, .. } = event {
            sink.borrow_mut().push(invalid_attrs.keys().cloned().collect());
        }
    });

    assert!(engine.is_valid(&model, ValidityQuery::Attr("age")).unwrap());
    assert!(events.borrow().is_empty());

    assert!(!engine.is_valid(&model, ValidityQuery::Attrs(&["name", "age"])).unwrap());
    assert_eq!(*events.borrow(), vec![vec!["name".to_string()]]);
}

#[test]
fn full_pass_counts_absent_declared_attributes_as_changed() {
    let model = Model::new(RuleSet::new().rule("email", RuleObject::new().required(true)));
    let engine = engine();

    let invalid = engine
        .validate(&model, None, SetOptions::default())
        .unwrap()
        .expect("missing email rejects the pass");
    assert_eq!(invalid["email"], msg("Email is required"));
    assert_eq!(model.validity().get(), Some(false));

    let events: Rc<RefCell<Vec<Vec<String>>>> = Rc::default();
    let sink = Rc::clone(&events);
    model.events().unwrap().subscribe("invalid", move |event| {
        if let ValidationEvent::Invalid { invalid_attrs, .. } = event {
            sink.borrow_mut().push(invalid_attrs.keys().cloned().collect());
        }
    });
    assert!(!engine.is_valid(&model, ValidityQuery::Force).unwrap());
    assert_eq!(*events.borrow(), vec![vec!["email".to_string()]]);
}

#[test]
fn configured_attributes_restrict_passes() {
    let rules = RuleSet::new()
        .rule("name", RuleObject::new().required(true))
        .rule("age", RuleObject::new().min(18));
    let model = Model::new(rules).with_attributes(obj(json!({"name": "", "age": 40})));
    let (engine, _) = engine_with(Options {
        attributes: Some(vec!["age".to_string()]),
        ..Options::default()
    });

    assert_eq!(engine.validate(&model, None, SetOptions::default()).unwrap(), None);
    assert_eq!(model.validity().get(), Some(true));
    assert!(engine.is_valid(&model, ValidityQuery::Cached).unwrap());
}

// ─── Queries ────────────────────────────────────────────────────────────────

#[test]
fn pre_validate_uses_current_value_when_none_given() {
    let model = Model::new(RuleSet::new().rule("name", RuleObject::new().required(true)))
        .with_attributes(obj(json!({"name": ""})));
    let engine = engine();
    assert_eq!(
        engine.pre_validate(&model, "name", None).unwrap(),
        Some(msg("Name is required"))
    );
    assert_eq!(
        engine.pre_validate_attrs(&model, &["name"]).unwrap().unwrap()["name"],
        msg("Name is required")
    );
    assert_eq!(engine.pre_validate(&model, "name", Some(&json!("x"))).unwrap(), None);
}

#[test]
fn pre_validate_does_not_touch_the_record() {
    let (engine, queue) = engine_with(Options::default());
    let model = Model::new(RuleSet::new().rule("name", RuleObject::new().required(true)));
    engine.pre_validate(&model, "name", Some(&json!(""))).unwrap();
    assert_eq!(model.validity().get(), None);
    assert!(queue.is_empty());
}

#[test]
fn validate_attrs_reports_aggregate() {
    let rules = RuleSet::new()
        .rule("name", RuleObject::new().required(true))
        .rule("age", RuleObject::new().min(18));
    let model = Model::new(rules);
    let data = obj(json!({"name": "Ann", "age": 7}));
    let result = engine()
        .validate_attrs(
            &model,
            &data,
            [("name", data.get("name")), ("age", data.get("age"))],
        )
        .unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.invalid_attrs.len(), 1);
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"isValid": false, "invalidAttrs": {"age": "Age must be greater than or equal to 18"}})
    );
}

// ─── Callbacks ──────────────────────────────────────────────────────────────

#[test]
fn valid_and_invalid_callbacks_run_with_notifications() {
    let log: Arc<Mutex<Vec<String>>> = Arc::default();
    let valid_log = Arc::clone(&log);
    let invalid_log = Arc::clone(&log);
    let options = Options {
        selector: "data-field".to_string(),
        valid: Arc::new(move |attr: &str, selector: &str| {
            valid_log.lock().unwrap().push(format!("valid {attr} {selector}"));
        }),
        invalid: Arc::new(move |attr: &str, error: &FieldError, selector: &str| {
            let message = error.message().unwrap_or_default();
            invalid_log
                .lock()
                .unwrap()
                .push(format!("invalid {attr} {selector} {message}"));
        }),
        ..Options::default()
    };
    let (engine, queue) = engine_with(options);
    let rules = RuleSet::new()
        .rule("name", RuleObject::new().required(true))
        .rule("age", RuleObject::new().min(18));
    let model = Model::new(rules);

    engine
        .validate(&model, Some(&obj(json!({"name": "", "age": 30}))), SetOptions::default())
        .unwrap();
    assert!(log.lock().unwrap().is_empty());

    queue.run_pending();
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "invalid name data-field Name is required".to_string(),
            "valid age data-field".to_string(),
        ]
    );
}

#[test]
fn rule_sets_with_functions_are_debuggable() {
    let rules = RuleSet::new()
        .rule("code", RuleDecl::function(|_| Ok(Outcome::Pass)))
        .rule("name", "checkName");
    let model = Model::new(rules.clone());
    let printed = format!("{:?}", rules);
    assert!(printed.contains("Function(..)"), "{printed}");
    assert!(printed.contains("Method(\"checkName\")"), "{printed}");
    assert!(format!("{:?}", model).contains("Function(..)"));
}

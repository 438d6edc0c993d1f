use nested_validation::expand::expand;
use nested_validation::{
    Engine, FieldError, Model, Options, RuleObject, RuleSet, SubAttributes, TaskQueue,
};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn attrs(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

/// Strategy for a grid of short strings: rows of varying length.
fn arb_grid() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(prop::collection::vec("[a-z]{0,4}", 0..4), 0..5)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // one leaf per element, addressed by its index
    #[test]
    fn single_open_bracket(items in prop::collection::vec(any::<i32>(), 0..8)) {
        let data = attrs(json!({ "items": items }));
        let expansion = expand("items[]", &data);
        let leaves = expansion.leaves();
        prop_assert_eq!(leaves.len(), items.len());
        for (i, (attr, index)) in leaves.iter().enumerate() {
            let expected = format!("items[{}]", i);
            prop_assert_eq!(attr.to_string(), expected);
            prop_assert_eq!(index.to_vec(), vec![i]);
        }
    }

    // nested open brackets expand to one node per row
    #[test]
    fn nested_open_brackets(grid in arb_grid()) {
        let data = attrs(json!({ "grid": grid }));
        let expansion = expand("grid[][]", &data);
        let SubAttributes::Node(rows) = &expansion else {
            return Err(TestCaseError::fail("expected a node"));
        };
        prop_assert_eq!(rows.len(), grid.len());
        for (r, row) in rows.iter().enumerate() {
            let SubAttributes::Node(cells) = row else {
                return Err(TestCaseError::fail("expected a row node"));
            };
            prop_assert_eq!(cells.len(), grid[r].len());
        }
        let total: usize = grid.iter().map(Vec::len).sum();
        prop_assert_eq!(expansion.leaves().len(), total);
    }

    // the same snapshot always expands the same way
    #[test]
    fn expansion_is_idempotent(grid in arb_grid()) {
        let data = attrs(json!({ "grid": grid }));
        prop_assert_eq!(expand("grid[][]", &data), expand("grid[][]", &data));
    }

    // validating the open path equals validating each element on its own
    #[test]
    fn open_path_matches_element_paths(items in prop::collection::vec("[a-z]{0,5}", 0..6)) {
        let model = Model::new(RuleSet::new().rule("items[]", RuleObject::new().min_length(3)))
            .with_attributes(attrs(json!({ "items": items })));
        let engine = Engine::with_options(TaskQueue::new(), Options::default());
        let data = attrs(json!({ "items": items }));

        let whole = engine
            .validate_attribute(&model, "items[]", None, &data, &Map::new())
            .unwrap();
        let FieldError::Elements(elements) = whole else {
            return Err(TestCaseError::fail("expected elements"));
        };
        prop_assert_eq!(elements.len(), items.len());

        for (i, item) in items.iter().enumerate() {
            let element = format!("items[{}]", i);
            let value = json!(item);
            let single = engine
                .validate_attribute(&model, &element, Some(&value), &data, &Map::new())
                .unwrap();
            prop_assert_eq!(&elements[i], &single);
            let queried = engine
                .pre_validate(&model, &element, Some(&value))
                .unwrap()
                .unwrap_or_default();
            prop_assert_eq!(&elements[i], &queried);
        }
    }
}

#[test]
fn scalar_path_is_a_single_leaf() {
    let data = attrs(json!({"name": "x"}));
    assert_eq!(
        expand("name", &data),
        SubAttributes::Leaf {
            attr: "name".to_string(),
            index: vec![],
        }
    );
}

#[test]
fn open_bracket_under_object_path() {
    let data = attrs(json!({"owner": {"phones": ["1", "2"]}}));
    let leaves: Vec<String> = expand("owner.phones[]", &data)
        .leaves()
        .into_iter()
        .map(|(attr, _)| attr.to_string())
        .collect();
    assert_eq!(leaves, vec!["owner.phones[0]", "owner.phones[1]"]);
}

#[test]
fn missing_or_non_sequence_expands_to_nothing() {
    for data in [json!({}), json!({"items": 3}), json!({"items": {"a": 1}}), json!({"items": null})] {
        assert_eq!(expand("items[]", &attrs(data)), SubAttributes::Node(vec![]));
    }
}

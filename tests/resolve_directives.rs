// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Directive expansion: assign, context, merge, for, if/else

mod common;

use common::{resolve_json, resolve_with, sample_resource};
use rstest::rstest;
use serde_json::{Value, json};

fn counter() -> Value {
    json!({"resourceType": "Resource", "sourceValue": 100, "key": "value"})
}

mod assign {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_binding() {
        let result = resolve_json(
            counter(),
            json!({"{% assign %}": {"var": 100}, "value": "{{ %var }}"}),
        )
        .unwrap();
        assert_eq!(result, json!({"value": 100}));
    }

    #[test]
    fn test_sequential_bindings() {
        let result = resolve_json(
            json!({}),
            json!({
                "{% assign %}": [{"varA": 100}, {"varB": "{{ %varA + 100 }}"}],
                "valueA": "{{ %varA }}",
                "valueB": "{{ %varB }}"
            }),
        )
        .unwrap();
        assert_eq!(result, json!({"valueA": 100, "valueB": 200}));
    }

    #[test]
    fn test_empty_binding_stays_empty() {
        let result = resolve_json(
            counter(),
            json!({
                "{% assign %}": [{"varA": "{{ {} }}"}, {"varB": "{{ %varA }}"}],
                "valueA": "{{ %varB }}"
            }),
        )
        .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn test_nested_assign_is_isolated() {
        let result = resolve_json(
            counter(),
            json!({
                "{% assign %}": {"varC": 100},
                "nested": {"{% assign %}": {"varC": 200}, "valueC": "{{ %varC }}"},
                "valueC": "{{ %varC }}"
            }),
        )
        .unwrap();
        assert_eq!(result, json!({"valueC": 100, "nested": {"valueC": 200}}));
    }

    #[test]
    fn test_bindings_do_not_leak_to_siblings() {
        let err = resolve_json(
            counter(),
            json!({
                "a": {"{% assign %}": {"x": 1}, "v": "{{ %x }}"},
                "b": "{{ %x }}"
            }),
        )
        .unwrap_err();
        assert_eq!(err.error_path(), "b");
    }

    #[test]
    fn test_full_example() {
        let result = resolve_json(
            counter(),
            json!({
                "{% assign %}": [
                    {"varA": {
                        "{% assign %}": [{"varX": "{{ Resource.sourceValue.first() }}"}],
                        "x": "{{ %varX }}"
                    }},
                    {"varB": "{{ %varA.x + 1 }}"},
                    {"varC": 0}
                ],
                "nested": {
                    "{% assign %}": {"varC": "{{ %varA.x + %varB }}"},
                    "valueA": "{{ %varA }}",
                    "valueB": "{{ %varB }}",
                    "valueC": "{{ %varC }}"
                },
                "valueA": "{{ %varA }}",
                "valueB": "{{ %varB }}",
                "valueC": "{{ %varC }}"
            }),
        )
        .unwrap();
        assert_eq!(
            result,
            json!({
                "valueA": {"x": 100},
                "valueB": 101,
                "valueC": 0,
                "nested": {"valueA": {"x": 100}, "valueB": 101, "valueC": 201}
            })
        );
    }

    #[test]
    fn test_binding_visible_to_block_on_same_node() {
        let result = resolve_json(
            json!({}),
            json!({
                "{% assign %}": {"localList": [{"key": "a"}, {"key": "b"}]},
                "listArr": [{"{% for item in %localList %}": {"key": "{{ %item.key }}"}}]
            }),
        )
        .unwrap();
        assert_eq!(result, json!({"listArr": [{"key": "a"}, {"key": "b"}]}));
    }

    #[rstest]
    #[case(json!({"varA": 100, "varB": 200}), "Assign block must accept only one key per object")]
    #[case(json!([{"varA": 100, "varB": 200}]), "Assign block must accept only one key per object")]
    #[case(json!([{"varA": 100}, 1]), "Assign block must accept only one key per object")]
    #[case(json!(1), "Assign block must accept array or object")]
    #[case(json!("{{ 1 }}"), "Assign block must accept array or object")]
    fn test_invalid_shapes(#[case] assign: Value, #[case] message: &str) {
        let err = resolve_json(
            counter(),
            json!({"node": {"{% assign %}": assign, "value": "{{ %var }}"}}),
        )
        .unwrap_err();
        assert_eq!(err.error_message(), message);
        assert_eq!(err.error_path(), "node");
    }
}

mod context_block {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rebinds_resource_per_answer() {
        let resource = json!({
            "foo": "bar",
            "list": [{"key": "a"}, {"key": "b"}, {"key": "c"}]
        });
        let result = resolve_with(
            resource.clone(),
            json!({"list": {"{{ list }}": {"key": "{{ key }}", "foo": "{{ %root.foo }}"}}}),
            json!({"root": resource}),
            None,
            false,
        )
        .unwrap();
        assert_eq!(
            result,
            json!({"list": [
                {"key": "a", "foo": "bar"},
                {"key": "b", "foo": "bar"},
                {"key": "c", "foo": "bar"}
            ]})
        );
    }

    #[test]
    fn test_implicit_context_still_points_at_root() {
        let result = resolve_json(
            sample_resource(),
            json!({"names": {"{{ name }}": {"family": "{{ family }}", "patient": "{{ %context.id }}"}}}),
        )
        .unwrap();
        assert_eq!(
            result,
            json!({"names": [
                {"family": "Smith", "patient": "pt-1"},
                {"family": "Doe", "patient": "pt-1"}
            ]})
        );
    }

    #[test]
    fn test_no_answers_omits_key() {
        let result = resolve_json(
            sample_resource(),
            json!({"id": "{{ id }}", "names": {"{{ missing }}": {"a": 1}}}),
        )
        .unwrap();
        assert_eq!(result, json!({"id": "pt-1"}));
    }

    #[test]
    fn test_must_be_single_key() {
        let err = resolve_json(
            sample_resource(),
            json!({"names": {"{{ name }}": {"a": 1}, "other": 2}}),
        )
        .unwrap_err();
        assert_eq!(err.error_message(), "Context block must be presented as single key");
        assert_eq!(err.error_path(), "names");
    }
}

mod merge {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case(json!({"b": 1, "{% merge %}": {"a": 1}}), json!({"b": 1, "a": 1}))]
    #[case(json!({"{% merge %}": [{"a": 1}, {"b": 2}, {"a": 3}]}), json!({"a": 3, "b": 2}))]
    #[case(json!({"{% merge %}": [{"a": 1}, null, {"b": 2}]}), json!({"a": 1, "b": 2}))]
    #[case(json!({"{% merge %}": [{"a": 1}, "{{ missing }}", {"b": 2}]}), json!({"a": 1, "b": 2}))]
    #[case(json!({"a": 1, "{% merge %}": {"a": "{{ key }}"}}), json!({"a": "value"}))]
    #[case(json!({"a": 1, "{% merge %}": {"{% if key = 'value' %}": {"b": 2}}}), json!({"a": 1, "b": 2}))]
    fn test_merges(#[case] template: Value, #[case] expected: Value) {
        assert_eq!(resolve_json(counter(), template).unwrap(), expected);
    }

    #[test]
    fn test_rejects_non_object() {
        let err = resolve_json(counter(), json!({"x": {"{% merge %}": [1, 2]}})).unwrap_err();
        assert_eq!(err.error_message(), "Merge block must contain object");
        assert_eq!(err.error_path(), "x");
    }

    #[test]
    fn test_cannot_combine_with_if() {
        let err = resolve_json(
            counter(),
            json!({"{% merge %}": {"a": 1}, "{% if true %}": {"b": 2}}),
        )
        .unwrap_err();
        assert_eq!(err.error_message(), "Merge block can not be combined with if/else block");
    }
}

mod for_block {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_example() {
        let resource = json!({
            "foo": "bar",
            "list": [{"key": "a"}, {"key": "b"}, {"key": "c"}]
        });
        let template = json!({
            "listArr": [
                {"{% for index, item in list %}": {
                    "key": "{{ %item.key }}",
                    "foo": "{{ foo }}",
                    "index": "{{ %index }}"
                }},
                {"{% for item in list %}": {"key": "{{ %item.key }}", "foo": "{{ foo }}"}}
            ],
            "listObj": {"{% for item in list %}": {"key": "{{ %item.key }}", "foo": "{{ foo }}"}}
        });
        assert_eq!(
            resolve_json(resource, template).unwrap(),
            json!({
                "listArr": [
                    {"key": "a", "foo": "bar", "index": 0},
                    {"key": "b", "foo": "bar", "index": 1},
                    {"key": "c", "foo": "bar", "index": 2},
                    {"key": "a", "foo": "bar"},
                    {"key": "b", "foo": "bar"},
                    {"key": "c", "foo": "bar"}
                ],
                "listObj": [
                    {"key": "a", "foo": "bar"},
                    {"key": "b", "foo": "bar"},
                    {"key": "c", "foo": "bar"}
                ]
            })
        );
    }

    #[test]
    fn test_empty_source_omits_key() {
        let result = resolve_json(
            sample_resource(),
            json!({"id": "{{ id }}", "items": {"{% for x in missing %}": "{{ %x }}"}}),
        )
        .unwrap();
        assert_eq!(result, json!({"id": "pt-1"}));
    }

    #[test]
    fn test_absent_items_are_dropped() {
        let result = resolve_json(
            sample_resource(),
            json!({"big": {"{% for x in list.key %}": {"{% if %x > 1 %}": "{{ %x }}"}}}),
        )
        .unwrap();
        assert_eq!(result, json!({"big": [2, 3]}));
    }

    #[test]
    fn test_item_keeps_evaluator_type() {
        let result = resolve_json(
            json!({}),
            json!({"years": {"{% for d in (@2020-01-01 | @2021-06-15) %}": "{{ %d.toString() }}"}}),
        )
        .unwrap();
        assert_eq!(result, json!({"years": ["2020-01-01", "2021-06-15"]}));
    }

    #[test]
    fn test_must_be_single_key() {
        let err = resolve_json(
            json!({"list": [1, 2, 3]}),
            json!({"userKey": 1, "{% for key in %list %}": "{{ %key }}"}),
        )
        .unwrap_err();
        assert_eq!(err.error_message(), "For block must be presented as single key");
        assert_eq!(err.error_path(), "");
    }
}

mod if_block {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key_value() -> Value {
        json!({"key": "value"})
    }

    #[rstest]
    #[case(
        json!({
            "{% if key = 'value' %}": {"nested": "{{ 'true' + key }}"},
            "{% else %}": {"nested": "{{ 'false' + key }}"}
        }),
        json!({"nested": "truevalue"})
    )]
    #[case(
        json!({"result": {
            "{% if key != 'value' %}": {"nested": "{{ 'true' + key }}"},
            "{% else %}": {"nested": "{{ 'false' + key }}"}
        }}),
        json!({"result": {"nested": "falsevalue"}})
    )]
    #[case(
        json!({"result": {"{% if key = 'value' %}": {"nested": "{{ 'true' + key }}"}}}),
        json!({"result": {"nested": "truevalue"}})
    )]
    #[case(
        json!({"result": {
            "{% if key != 'value' %}": {"nested": 1},
            "{% else %}": "{{+ {} +}}"
        }}),
        json!({"result": null})
    )]
    #[case(
        json!({"result": {"{% if key = 'value' %}": {"{% if key = 'value' %}": "value"}}}),
        json!({"result": "value"})
    )]
    #[case(
        json!({"result": {
            "{% if key != 'value' %}": null,
            "{% else %}": {"{% if key != 'value' %}": null, "{% else %}": "value"}
        }}),
        json!({"result": "value"})
    )]
    #[case(
        json!({"result": {"myKey": 1, "{% if key = 'value' %}": null}}),
        json!({"result": {"myKey": 1}})
    )]
    #[case(
        json!({"myKey": 1, "{% if key = 'value' %}": {"anotherKey": 2}}),
        json!({"myKey": 1, "anotherKey": 2})
    )]
    #[case(
        json!({"myKey": 1, "{% if key != 'value' %}": {"anotherKey": 2}}),
        json!({"myKey": 1})
    )]
    #[case(
        json!({"result": {
            "myKey": 1,
            "{% if key != 'value' %}": {"anotherKey": 2},
            "{% else %}": {"anotherKey": 3}
        }}),
        json!({"result": {"myKey": 1, "anotherKey": 3}})
    )]
    #[case(
        json!({"{% assign %}": {"flag": true}, "{% if %flag %}": {"a": 1}}),
        json!({"a": 1})
    )]
    #[case(
        json!({"a": 1, "{% if missing %}": {"b": 2}, "{% else %}": {"c": 3}}),
        json!({"a": 1, "c": 3})
    )]
    fn test_branches(#[case] template: Value, #[case] expected: Value) {
        assert_eq!(resolve_json(key_value(), template).unwrap(), expected);
    }

    #[test]
    fn test_false_without_else_omits_node() {
        let result = resolve_json(
            key_value(),
            json!({"result": {"{% if key != 'value' %}": {"nested": 1}}, "kept": true}),
        )
        .unwrap();
        assert_eq!(result, json!({"kept": true}));
    }

    #[rstest]
    #[case(
        json!({"myKey": 1, "{% if key = 'value' %}": [{"key1": true}]}),
        "If/else block must return object for implicit merge into existing node"
    )]
    #[case(
        json!({"myKey": 1, "{% if key != 'value' %}": {}, "{% else %}": [{"key1": true}]}),
        "If/else block must return object for implicit merge into existing node"
    )]
    #[case(
        json!({"myKey": 1, "{% if key != 'value' %}": {}, "{% if key = 'value' %}": {}}),
        "If block must be presented once"
    )]
    #[case(
        json!({"myKey": 1, "{% if key != 'value' %}": {}, "{% else %}": {}, "{% else  %}": {}}),
        "Else block must be presented once"
    )]
    #[case(
        json!({"myKey": 1, "{% else %}": {}}),
        "Else block must be presented only when if block is presented"
    )]
    fn test_invalid_blocks(#[case] node: Value, #[case] message: &str) {
        let err = resolve_json(key_value(), json!({"result": node})).unwrap_err();
        assert_eq!(err.error_message(), message);
        assert_eq!(err.error_path(), "result");
    }

    #[test]
    fn test_condition_error_is_wrapped() {
        let err = resolve_json(key_value(), json!({"r": {"{% if key = %}": 1}})).unwrap_err();
        assert!(
            err.error_message()
                .starts_with("Can not evaluate 'iif(key =, true, false)'"),
            "{}",
            err.error_message()
        );
    }
}

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

//! Strict mode: the resource is only reachable through bindings

mod common;

use common::{resolve_with, sample_resource};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

fn list_resource() -> Value {
    json!({"list": [{"key": 1}, {"key": 2}, {"key": 3}]})
}

#[rstest]
#[case(list_resource(), "{{ list.key }}", "list")]
#[case(json!({"resourceType": "Resource", "key": [1, 2]}), "{{ Resource.key }}", "key")]
#[case(json!({"resourceType": "Resource", "key": [1, 2]}), "{{ UndefinedResource.key }}", "UndefinedResource")]
#[case(sample_resource(), "{{ children() }}", "id")]
#[case(sample_resource(), "prefix {{ name.family }}", "name")]
fn test_direct_access_is_forbidden(
    #[case] resource: Value,
    #[case] expression: &str,
    #[case] property: &str,
) {
    let err =
        resolve_with(resource, json!({"key": expression}), json!({}), None, true).unwrap_err();
    assert_eq!(err.error_path(), "key");
    assert!(
        err.error_message().ends_with(&format!(
            "Forbidden access to resource property {property} in strict mode. Use context instead"
        )),
        "{}",
        err.error_message()
    );
}

#[test]
fn test_same_template_works_without_strict() {
    let result = resolve_with(
        list_resource(),
        json!({"key": "{{ list.key }}"}),
        json!({}),
        None,
        false,
    )
    .unwrap();
    assert_eq!(result, json!({"key": 1}));
}

#[test]
fn test_explicit_context_is_allowed() {
    let result = resolve_with(
        list_resource(),
        json!({"key": "{{ %Resource.list.key }}"}),
        json!({"Resource": list_resource()}),
        None,
        true,
    )
    .unwrap();
    assert_eq!(result, json!({"key": 1}));
}

#[test]
fn test_implicit_context_is_allowed() {
    let result = resolve_with(
        list_resource(),
        json!({"key": "{{ %context.list.key }}"}),
        json!({}),
        None,
        true,
    )
    .unwrap();
    assert_eq!(result, json!({"key": 1}));
}

#[test]
fn test_resource_type_is_readable() {
    let result = resolve_with(
        sample_resource(),
        json!({"type": "{{ resourceType }}", "isPatient": "{{ $this is Patient }}"}),
        json!({}),
        None,
        true,
    )
    .unwrap();
    assert_eq!(result, json!({"type": "Patient", "isPatient": true}));
}

#[test]
fn test_assigned_alias_reaches_data() {
    let result = resolve_with(
        sample_resource(),
        json!({
            "{% assign %}": {"pt": "{{ %context }}"},
            "id": "{{ %pt.id }}",
            "names": {"{% for n in %pt.name %}": "{{ %n.family }}"}
        }),
        json!({}),
        None,
        true,
    )
    .unwrap();
    assert_eq!(result, json!({"id": "pt-1", "names": ["Smith", "Doe"]}));
}

#[test]
fn test_guard_is_shallow() {
    let result = resolve_with(
        sample_resource(),
        json!({"families": {"{{ %context.name }}": "{{ family }}"}}),
        json!({}),
        None,
        true,
    )
    .unwrap();
    assert_eq!(result, json!({"families": ["Smith", "Doe"]}));
}

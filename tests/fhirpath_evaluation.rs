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

//! FHIRPath evaluation through the public engine API

use octofhir_fpml::evaluator::VariableMap;
use octofhir_fpml::model::{Collection, FhirPathValue, ModelDescriptor};
use octofhir_fpml::{EvaluationConfig, EvaluationError, FhirPathEngine};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;

fn patient() -> FhirPathValue {
    FhirPathValue::resource(json!({
        "resourceType": "Patient",
        "id": "example-patient",
        "active": true,
        "birthDate": "1974-12-25",
        "name": [
            {"use": "official", "family": "Doe", "given": ["John", "David"]},
            {"use": "nickname", "given": ["Johnny"]}
        ],
        "telecom": [
            {"system": "phone", "value": "+1-555-0123", "use": "home"},
            {"system": "email", "value": "john@example.com"}
        ],
        "extension": [
            {"url": "http://example.org/weight", "valueQuantity": {"value": 80, "unit": "kg"}}
        ]
    }))
}

fn eval(expression: &str) -> Value {
    let result = FhirPathEngine::new()
        .evaluate(expression, patient())
        .unwrap_or_else(|e| panic!("{expression}: {e}"));
    Value::Array(result.iter().map(FhirPathValue::to_json).collect())
}

#[rstest]
#[case("Patient.name.given", json!(["John", "David", "Johnny"]))]
#[case("name.where(use = 'official').family", json!(["Doe"]))]
#[case("name.given.first()", json!(["John"]))]
#[case("name.given.count()", json!([3]))]
#[case("name.given.skip(1).take(1)", json!(["David"]))]
#[case("telecom.where(system = 'email').value", json!(["john@example.com"]))]
#[case("telecom.select(system)", json!(["phone", "email"]))]
#[case("name.exists(use = 'nickname')", json!([true]))]
#[case("name.all(given.exists())", json!([true]))]
#[case("name.given.join(', ')", json!(["John, David, Johnny"]))]
#[case("id.upper().substring(0, 7)", json!(["EXAMPLE"]))]
#[case("id.replace('-', '_')", json!(["example_patient"]))]
#[case("id.matches('^ex.*t$')", json!([true]))]
#[case("name.given.where($index > 0)", json!(["David", "Johnny"]))]
#[case("(1 | 2 | 2 | 3).distinct().count()", json!([3]))]
#[case("(1 | 2 | 3).aggregate($this + $total, 0)", json!([6]))]
#[case("iif(active, 'yes', 'no')", json!(["yes"]))]
#[case("7 div 2", json!([3]))]
#[case("7 mod 2", json!([1]))]
#[case("1 / 4", json!([0.25]))]
#[case("'a' & {} & 'b'", json!(["ab"]))]
#[case("(2.5).round()", json!([3]))]
#[case("'3'.toInteger() + 1", json!([4]))]
#[case("@2020-01-01 < @2021-01-01", json!([true]))]
#[case("birthDate = '1974-12-25'", json!([true]))]
#[case("name.given contains 'David'", json!([true]))]
#[case("true and {}", json!([]))]
#[case("false and {}", json!([false]))]
#[case("name.where(use = 'temp').exists().not()", json!([true]))]
#[case("%ucum", json!(["http://unitsofmeasure.org"]))]
#[case("$this.id", json!(["example-patient"]))]
fn test_expressions(#[case] expression: &str, #[case] expected: Value) {
    assert_eq!(eval(expression), expected);
}

#[test]
fn test_variables() {
    let mut variables = VariableMap::default();
    variables.insert("limit".to_string(), Collection::single(FhirPathValue::Integer(1)));
    let result = FhirPathEngine::new()
        .evaluate_with_variables("name.given.take(%limit)", patient(), variables)
        .unwrap();
    assert_eq!(result, Collection::single("John".into()));
}

#[test]
fn test_choice_types_need_model() {
    let plain = FhirPathEngine::new();
    assert!(plain.evaluate("extension.value.unit", patient()).unwrap().is_empty());

    let r4 = FhirPathEngine::new().with_model(Some(Arc::new(ModelDescriptor::r4())));
    assert_eq!(
        r4.evaluate("extension.value.unit", patient()).unwrap(),
        Collection::single("kg".into())
    );
}

#[test]
fn test_model_descriptor_from_json() {
    let model = ModelDescriptor::from_json_str(
        r#"{"version": "custom", "choiceTypePaths": {"Observation.value": ["Quantity", "String"]}}"#,
    )
    .unwrap();
    let engine = FhirPathEngine::new().with_model(Some(Arc::new(model)));
    let observation = FhirPathValue::resource(json!({"valueString": "high"}));
    assert_eq!(
        engine.evaluate("value", observation).unwrap(),
        Collection::single("high".into())
    );
}

#[rstest]
#[case("name.", "Parse error")]
#[case("%undefined", "Attempting to access an undefined environment variable: undefined")]
#[case("name.frobnicate()", "Unknown function: frobnicate")]
#[case("name.given.single()", "single")]
fn test_errors(#[case] expression: &str, #[case] fragment: &str) {
    let err = FhirPathEngine::new().evaluate(expression, patient()).unwrap_err();
    assert!(err.to_string().contains(fragment), "{err}");
}

#[test]
fn test_recursion_limit_is_configurable() {
    let engine = FhirPathEngine::new().with_config(EvaluationConfig {
        max_recursion_depth: 2,
    });
    let err = engine.evaluate("1 + (2 + (3 + 4))", patient()).unwrap_err();
    assert_eq!(err, EvaluationError::RecursionLimitExceeded { limit: 2 });
}

#[test]
fn test_engine_is_shareable_across_threads() {
    let engine = Arc::new(FhirPathEngine::new());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                engine
                    .evaluate(&format!("{i} + 1"), FhirPathValue::Empty)
                    .unwrap()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(
            handle.join().unwrap(),
            Collection::single(FhirPathValue::Integer(i as i64 + 1))
        );
    }
}

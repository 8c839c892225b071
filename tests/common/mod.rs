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

//! Shared helpers for template resolution tests

#![allow(dead_code)]

use indexmap::IndexMap;
use octofhir_fpml::mapping::{FpOptions, FpmlValidationError, Node, resolve};
use serde_json::{Value, json};

/// Resource used by most tests
pub fn sample_resource() -> Value {
    json!({
        "resourceType": "Patient",
        "id": "pt-1",
        "active": true,
        "key": "value",
        "list": [{"key": 1}, {"key": 2}, {"key": 3}],
        "name": [
            {"family": "Smith", "given": ["John", "Jacob"]},
            {"family": "Doe", "given": ["Jane"]}
        ]
    })
}

/// Turn a JSON object into initial bindings
pub fn bindings(context: Value) -> IndexMap<String, Node> {
    match Node::from(context) {
        Node::Mapping(entries) => entries,
        _ => IndexMap::new(),
    }
}

/// Resolve without context, model or options
pub fn resolve_json(resource: Value, template: Value) -> Result<Value, FpmlValidationError> {
    resolve_with(resource, template, json!({}), None, false)
}

/// Resolve with every knob exposed
pub fn resolve_with(
    resource: Value,
    template: Value,
    context: Value,
    options: Option<FpOptions>,
    strict: bool,
) -> Result<Value, FpmlValidationError> {
    resolve(
        &Node::from(resource),
        &Node::from(template),
        &bindings(context),
        None,
        options,
        strict,
    )
    .map(Value::from)
}

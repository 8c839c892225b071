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

//! Strict-mode access guard
//!
//! In strict mode the top-level resource handed to the evaluator only
//! exposes its type discriminator. Everything else has to be reached through
//! an explicit binding such as `%context`.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Properties readable through the guard
pub const ALLOWED_PROPERTIES: &[&str] = &["resourceType"];

/// A guarded resource was read beyond [`ALLOWED_PROPERTIES`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Forbidden access to resource property {property} in strict mode. Use context instead")]
pub struct ForbiddenAccess {
    /// The property that was read
    pub property: String,
}

/// Shallow read guard around a top-level resource
///
/// Nested objects returned through the guard are plain values again.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedResource {
    resource: Arc<Value>,
}

impl GuardedResource {
    /// Wrap a resource
    pub fn new(resource: Arc<Value>) -> Self {
        Self { resource }
    }

    /// The unguarded resource, for the host only
    pub fn resource(&self) -> &Arc<Value> {
        &self.resource
    }

    /// The `resourceType` of the wrapped object, if any
    pub fn resource_type(&self) -> Option<&str> {
        self.resource.get("resourceType").and_then(Value::as_str)
    }

    /// Read a property through the guard
    pub fn get(&self, property: &str) -> Result<Option<&Value>, ForbiddenAccess> {
        if !ALLOWED_PROPERTIES.contains(&property) {
            return Err(ForbiddenAccess {
                property: property.to_string(),
            });
        }
        Ok(self.resource.get(property))
    }

    /// All property values in document order
    ///
    /// Fails on the first property outside the allow-list.
    pub fn values(&self) -> Result<Vec<&Value>, ForbiddenAccess> {
        let Some(object) = self.resource.as_object() else {
            return Ok(Vec::new());
        };
        let mut values = Vec::with_capacity(object.len());
        for key in object.keys() {
            if let Some(value) = self.get(key)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// The part of the resource that is visible through the guard
    pub fn visible_json(&self) -> Value {
        let mut visible = serde_json::Map::new();
        for property in ALLOWED_PROPERTIES {
            if let Some(value) = self.resource.get(*property) {
                visible.insert((*property).to_string(), value.clone());
            }
        }
        Value::Object(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient() -> GuardedResource {
        GuardedResource::new(Arc::new(json!({
            "resourceType": "Patient",
            "id": "pt-1",
            "name": [{"family": "Smith"}]
        })))
    }

    #[test]
    fn test_resource_type_is_readable() {
        let guarded = patient();
        assert_eq!(guarded.get("resourceType"), Ok(Some(&json!("Patient"))));
        assert_eq!(guarded.resource_type(), Some("Patient"));
    }

    #[test]
    fn test_other_properties_are_forbidden() {
        let err = patient().get("name").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Forbidden access to resource property name in strict mode. Use context instead"
        );
    }

    #[test]
    fn test_values_fail_on_first_forbidden_key() {
        let err = patient().values().unwrap_err();
        assert_eq!(err.property, "id");
    }

    #[test]
    fn test_visible_json_hides_fields() {
        assert_eq!(patient().visible_json(), json!({"resourceType": "Patient"}));
        let anonymous = GuardedResource::new(Arc::new(json!({"a": 1})));
        assert_eq!(anonymous.visible_json(), json!({}));
        assert_eq!(anonymous.resource().get("a"), Some(&json!(1)));
    }
}

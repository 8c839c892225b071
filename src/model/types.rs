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

//! Type system definitions for FHIRPath

use super::value::FhirPathValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type information for FHIRPath values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeInfo {
    /// Boolean value (true/false)
    Boolean,
    /// Integer numeric value
    Integer,
    /// Decimal numeric value with arbitrary precision
    Decimal,
    /// String value
    String,
    /// Date value (YYYY-MM-DD)
    Date,
    /// DateTime value with timezone information
    DateTime,
    /// Time value (HH:MM:SS)
    Time,
    /// Object typed by its `resourceType`, or any object when the name is empty
    Resource(String),
    /// Any type (used for polymorphic functions)
    Any,
    /// Collection type with element type
    Collection(Box<TypeInfo>),
}

impl TypeInfo {
    /// Resolve a type specifier as written after `is`, `as` or in `ofType()`
    ///
    /// `System.` and `FHIR.` namespaces are accepted. FHIR primitive type
    /// names map onto the system type their JSON form carries, so
    /// `code`, `uri` and `date` all denote strings.
    pub fn from_type_specifier(name: &str) -> Self {
        let bare = name
            .strip_prefix("System.")
            .or_else(|| name.strip_prefix("FHIR."))
            .unwrap_or(name);

        match bare {
            "Boolean" | "boolean" => TypeInfo::Boolean,
            "Integer" | "integer" | "positiveInt" | "unsignedInt" | "integer64" => {
                TypeInfo::Integer
            }
            "Decimal" | "decimal" => TypeInfo::Decimal,
            "String" | "string" | "code" | "id" | "uri" | "url" | "canonical" | "oid" | "uuid"
            | "markdown" | "base64Binary" | "xhtml" | "date" | "dateTime" | "instant"
            | "time" => TypeInfo::String,
            "Date" => TypeInfo::Date,
            "DateTime" => TypeInfo::DateTime,
            "Time" => TypeInfo::Time,
            "Any" => TypeInfo::Any,
            other => TypeInfo::Resource(other.to_string()),
        }
    }

    /// Check whether a single value is an instance of this type
    pub fn accepts(&self, value: &FhirPathValue) -> bool {
        match (self, value) {
            (TypeInfo::Any, _) => true,
            (TypeInfo::Boolean, FhirPathValue::Boolean(_))
            | (TypeInfo::Integer, FhirPathValue::Integer(_))
            | (TypeInfo::Decimal, FhirPathValue::Decimal(_))
            | (TypeInfo::String, FhirPathValue::String(_))
            | (TypeInfo::Date, FhirPathValue::Date(_))
            | (TypeInfo::DateTime, FhirPathValue::DateTime(_))
            | (TypeInfo::Time, FhirPathValue::Time(_)) => true,
            (TypeInfo::Resource(name), FhirPathValue::Resource(_) | FhirPathValue::Guarded(_)) => {
                name.is_empty() || value.type_name() == name
            }
            (TypeInfo::Collection(inner), FhirPathValue::Collection(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            _ => false,
        }
    }

    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeInfo::Integer | TypeInfo::Decimal)
    }

    /// Get the name of this type for display
    pub fn type_name(&self) -> String {
        match self {
            TypeInfo::Boolean => "Boolean".to_string(),
            TypeInfo::Integer => "Integer".to_string(),
            TypeInfo::Decimal => "Decimal".to_string(),
            TypeInfo::String => "String".to_string(),
            TypeInfo::Date => "Date".to_string(),
            TypeInfo::DateTime => "DateTime".to_string(),
            TypeInfo::Time => "Time".to_string(),
            TypeInfo::Resource(name) if name.is_empty() => "Object".to_string(),
            TypeInfo::Resource(name) => name.clone(),
            TypeInfo::Any => "Any".to_string(),
            TypeInfo::Collection(elem) => format!("Collection<{}>", elem.type_name()),
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_specifiers() {
        assert_eq!(TypeInfo::from_type_specifier("System.String"), TypeInfo::String);
        assert_eq!(TypeInfo::from_type_specifier("code"), TypeInfo::String);
        assert_eq!(TypeInfo::from_type_specifier("FHIR.boolean"), TypeInfo::Boolean);
        assert_eq!(
            TypeInfo::from_type_specifier("Patient"),
            TypeInfo::Resource("Patient".to_string())
        );
    }

    #[test]
    fn test_accepts() {
        let patient = FhirPathValue::resource(json!({"resourceType": "Patient"}));
        assert!(TypeInfo::Resource("Patient".to_string()).accepts(&patient));
        assert!(!TypeInfo::Resource("Observation".to_string()).accepts(&patient));
        assert!(TypeInfo::Integer.accepts(&FhirPathValue::Integer(1)));
        assert!(!TypeInfo::Decimal.accepts(&FhirPathValue::Integer(1)));
    }
}

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

//! Data-model descriptors
//!
//! A descriptor tells the evaluator how polymorphic ("choice type") elements
//! are spelled in JSON, so that `Observation.value` finds `valueQuantity`.
//! Without a descriptor navigation is purely structural.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Choice type suffixes shared by every open `value[x]` element in R4
const R4_OPEN_TYPES: &[&str] = &[
    "Base64Binary",
    "Boolean",
    "Canonical",
    "Code",
    "Date",
    "DateTime",
    "Decimal",
    "Id",
    "Instant",
    "Integer",
    "Markdown",
    "Oid",
    "PositiveInt",
    "String",
    "Time",
    "UnsignedInt",
    "Uri",
    "Url",
    "Uuid",
    "Address",
    "Age",
    "Annotation",
    "Attachment",
    "CodeableConcept",
    "Coding",
    "ContactPoint",
    "Count",
    "Distance",
    "Duration",
    "HumanName",
    "Identifier",
    "Money",
    "Period",
    "Quantity",
    "Range",
    "Ratio",
    "Reference",
    "SampledData",
    "Signature",
    "Timing",
    "Meta",
];

/// Description of a data-model flavour
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Version label, for example `r4`
    pub version: String,
    /// Choice element path (`Observation.value`) to its type suffixes
    #[serde(default)]
    pub choice_type_paths: IndexMap<String, Vec<String>>,
}

impl ModelDescriptor {
    /// Create an empty descriptor for the given version label
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            choice_type_paths: IndexMap::new(),
        }
    }

    /// Register a choice element
    pub fn with_choice<S: AsRef<str>>(mut self, path: impl Into<String>, suffixes: &[S]) -> Self {
        self.choice_type_paths.insert(
            path.into(),
            suffixes.iter().map(|s| s.as_ref().to_string()).collect(),
        );
        self
    }

    /// Parse a descriptor from its JSON form
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Built-in subset of the FHIR R4 choice elements
    pub fn r4() -> Self {
        let open = R4_OPEN_TYPES;
        Self::new("r4")
            .with_choice("Extension.value", open)
            .with_choice("QuestionnaireResponse.item.answer.value", &[
                "Boolean",
                "Decimal",
                "Integer",
                "Date",
                "DateTime",
                "Time",
                "String",
                "Uri",
                "Attachment",
                "Coding",
                "Quantity",
                "Reference",
            ])
            .with_choice("Questionnaire.item.enableWhen.answer", &[
                "Boolean",
                "Decimal",
                "Integer",
                "Date",
                "DateTime",
                "Time",
                "String",
                "Coding",
                "Quantity",
                "Reference",
            ])
            .with_choice("Questionnaire.item.answerOption.value", &[
                "Integer",
                "Date",
                "Time",
                "String",
                "Coding",
                "Reference",
            ])
            .with_choice("Questionnaire.item.initial.value", &[
                "Boolean",
                "Decimal",
                "Integer",
                "Date",
                "DateTime",
                "Time",
                "String",
                "Uri",
                "Attachment",
                "Coding",
                "Quantity",
                "Reference",
            ])
            .with_choice("Observation.value", &[
                "Quantity",
                "CodeableConcept",
                "String",
                "Boolean",
                "Integer",
                "Range",
                "Ratio",
                "SampledData",
                "Time",
                "DateTime",
                "Period",
            ])
            .with_choice("Observation.effective", &["DateTime", "Period", "Timing", "Instant"])
            .with_choice("Patient.deceased", &["Boolean", "DateTime"])
            .with_choice("Patient.multipleBirth", &["Boolean", "Integer"])
            .with_choice("Condition.onset", &["DateTime", "Age", "Period", "Range", "String"])
            .with_choice("Condition.abatement", &["DateTime", "Age", "Period", "Range", "String"])
            .with_choice("MedicationRequest.medication", &["CodeableConcept", "Reference"])
            .with_choice("MedicationStatement.medication", &["CodeableConcept", "Reference"])
            .with_choice("Procedure.performed", &["DateTime", "Period", "String", "Age", "Range"])
    }

    /// Candidate JSON keys for a property missing from an object
    ///
    /// Every registered choice path whose last segment equals `property`
    /// contributes its suffixes, in registration order and without duplicates.
    pub fn choice_candidates(&self, property: &str) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        for (path, suffixes) in &self.choice_type_paths {
            let last = path.rsplit('.').next().unwrap_or(path);
            if last != property {
                continue;
            }
            for suffix in suffixes {
                let key = format!("{property}{suffix}");
                if !candidates.contains(&key) {
                    candidates.push(key);
                }
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_candidates() {
        let model = ModelDescriptor::new("test").with_choice("Observation.value", &["Quantity", "String"]);
        assert_eq!(
            model.choice_candidates("value"),
            vec!["valueQuantity".to_string(), "valueString".to_string()]
        );
        assert!(model.choice_candidates("code").is_empty());
    }

    #[test]
    fn test_r4_covers_questionnaire_answers() {
        let model = ModelDescriptor::r4();
        assert!(model.choice_candidates("value").contains(&"valueCoding".to_string()));
        assert!(model.choice_candidates("deceased").contains(&"deceasedBoolean".to_string()));
    }

    #[test]
    fn test_deserialize() {
        let model = ModelDescriptor::from_json_str(
            r#"{"version": "custom", "choiceTypePaths": {"Thing.x": ["String"]}}"#,
        )
        .unwrap();
        assert_eq!(model.version, "custom");
        assert_eq!(model.choice_candidates("x"), vec!["xString".to_string()]);
    }
}

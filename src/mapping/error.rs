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

//! Path-annotated resolution errors

use serde_json::{Value, json};
use thiserror::Error;

use super::path::NodePath;
use crate::evaluator::EvaluationError;

/// Result type for template resolution
pub type FpmlResult<T> = Result<T, FpmlValidationError>;

/// The single error kind template resolution reports
///
/// Directive shape violations, evaluator failures and strict-mode reads all
/// end up here, tagged with the template path they happened at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}. Path '{path}'")]
pub struct FpmlValidationError {
    message: String,
    path: NodePath,
}

impl FpmlValidationError {
    /// Create an error at `path`
    pub fn new(message: impl Into<String>, path: &NodePath) -> Self {
        Self {
            message: message.into(),
            path: path.clone(),
        }
    }

    /// Wrap an evaluator failure for `expression`
    pub fn evaluation(expression: &str, cause: &EvaluationError, path: &NodePath) -> Self {
        Self::new(format!("Can not evaluate '{expression}': {cause}"), path)
    }

    /// The message without the path
    pub fn error_message(&self) -> &str {
        &self.message
    }

    /// The dot-joined path
    pub fn error_path(&self) -> String {
        self.path.to_string()
    }

    /// The structured path
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Render as a FHIR `OperationOutcome`
    pub fn to_operation_outcome(&self) -> Value {
        json!({
            "resourceType": "OperationOutcome",
            "text": {"status": "generated", "div": self.message},
            "issue": [{
                "severity": "fatal",
                "code": "processing",
                "expression": [self.error_path()],
                "diagnostics": self.message,
            }]
        })
    }
}

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

//! Call contract between the resolver and an expression language

use crate::evaluator::{EvaluationError, FhirPathEngine, VariableMap};
use crate::model::{Collection, FhirPathValue};

/// Evaluates one embedded expression
///
/// `variables` is built fresh for every call and owned by the evaluator.
/// The data model and user functions are configured on the implementor.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` with `resource` as its input
    fn evaluate(
        &self,
        resource: &FhirPathValue,
        expression: &str,
        variables: VariableMap,
    ) -> Result<Collection, EvaluationError>;
}

impl ExpressionEvaluator for FhirPathEngine {
    fn evaluate(
        &self,
        resource: &FhirPathValue,
        expression: &str,
        variables: VariableMap,
    ) -> Result<Collection, EvaluationError> {
        self.evaluate_with_variables(expression, resource.clone(), variables)
    }
}

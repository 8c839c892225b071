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

//! Boolean functions

use crate::model::{Collection, FhirPathValue, TypeInfo};
use crate::registry::function::{
    EvaluationContext, FhirPathFunction, FunctionError, FunctionResult, input_singleton,
};
use crate::registry::signature::FunctionSignature;
use std::sync::LazyLock;

/// not() function - boolean negation with singleton evaluation
pub struct NotFunction;

impl FhirPathFunction for NotFunction {
    fn name(&self) -> &str {
        "not"
    }
    fn human_friendly_name(&self) -> &str {
        "Not"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("not", vec![], TypeInfo::Boolean));
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn documentation(&self) -> &str {
        "Returns true if the input is false, false if it is true, and empty when the input is empty. A single non-boolean item counts as true."
    }
    fn evaluate(
        &self,
        _args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        Ok(match input_singleton("not", context)? {
            None => Collection::new(),
            Some(FhirPathValue::Boolean(b)) => Collection::single(FhirPathValue::Boolean(!b)),
            Some(_) => Collection::single(FhirPathValue::Boolean(false)),
        })
    }
}

fn booleans(name: &str, input: &Collection) -> FunctionResult<Vec<bool>> {
    if let Some(other) = input.iter().find(|v| v.as_boolean().is_none()) {
        return Err(FunctionError::evaluation(
            name,
            format!("expected Boolean items, got {}", other.type_name()),
        ));
    }
    Ok(input.iter().filter_map(FhirPathValue::as_boolean).collect())
}

/// allTrue() function
pub struct AllTrueFunction;

impl FhirPathFunction for AllTrueFunction {
    fn name(&self) -> &str {
        "allTrue"
    }
    fn human_friendly_name(&self) -> &str {
        "All True"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("allTrue", vec![], TypeInfo::Boolean));
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        _args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let result = booleans(self.name(), &context.input)?.into_iter().all(|b| b);
        Ok(Collection::single(FhirPathValue::Boolean(result)))
    }
}

/// anyTrue() function
pub struct AnyTrueFunction;

impl FhirPathFunction for AnyTrueFunction {
    fn name(&self) -> &str {
        "anyTrue"
    }
    fn human_friendly_name(&self) -> &str {
        "Any True"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("anyTrue", vec![], TypeInfo::Boolean));
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        _args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let result = booleans(self.name(), &context.input)?.into_iter().any(|b| b);
        Ok(Collection::single(FhirPathValue::Boolean(result)))
    }
}

/// allFalse() function
pub struct AllFalseFunction;

impl FhirPathFunction for AllFalseFunction {
    fn name(&self) -> &str {
        "allFalse"
    }
    fn human_friendly_name(&self) -> &str {
        "All False"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("allFalse", vec![], TypeInfo::Boolean));
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        _args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let result = booleans(self.name(), &context.input)?.into_iter().all(|b| !b);
        Ok(Collection::single(FhirPathValue::Boolean(result)))
    }
}

/// anyFalse() function
pub struct AnyFalseFunction;

impl FhirPathFunction for AnyFalseFunction {
    fn name(&self) -> &str {
        "anyFalse"
    }
    fn human_friendly_name(&self) -> &str {
        "Any False"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("anyFalse", vec![], TypeInfo::Boolean));
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        _args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let result = booleans(self.name(), &context.input)?.into_iter().any(|b| !b);
        Ok(Collection::single(FhirPathValue::Boolean(result)))
    }
}

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

//! Tree navigation, tracing and clock functions

use crate::model::{Collection, FhirPathValue, TypeInfo};
use crate::registry::function::{
    EvaluationContext, FhirPathFunction, FunctionError, FunctionResult, string_arg,
};
use crate::registry::signature::{FunctionSignature, ParameterInfo};
use chrono::Local;
use std::sync::LazyLock;

/// Direct child values of every object in `input`
fn children_of(name: &str, input: &Collection) -> FunctionResult<Collection> {
    let mut children = Collection::new();
    for item in input {
        match item {
            FhirPathValue::Resource(_) => {
                if let Some(object) = item.as_json_object() {
                    for value in object.values() {
                        children.push(FhirPathValue::from_json(value));
                    }
                }
            }
            FhirPathValue::Guarded(guarded) => {
                for value in guarded
                    .values()
                    .map_err(|e| FunctionError::evaluation(name, e.to_string()))?
                {
                    children.push(FhirPathValue::from_json(value));
                }
            }
            _ => {}
        }
    }
    Ok(children)
}

/// children() function - the immediate child values of each input item
pub struct ChildrenFunction;

impl FhirPathFunction for ChildrenFunction {
    fn name(&self) -> &str {
        "children"
    }
    fn human_friendly_name(&self) -> &str {
        "Children"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("children", vec![], TypeInfo::Any));
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
        children_of("children", &context.input)
    }
}

/// descendants() function - children, recursively
pub struct DescendantsFunction;

impl FhirPathFunction for DescendantsFunction {
    fn name(&self) -> &str {
        "descendants"
    }
    fn human_friendly_name(&self) -> &str {
        "Descendants"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("descendants", vec![], TypeInfo::Any));
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
        let mut descendants = Collection::new();
        let mut level = children_of("descendants", &context.input)?;
        while !level.is_empty() {
            let next = children_of("descendants", &level)?;
            descendants.extend(level);
            level = next;
        }
        Ok(descendants)
    }
}

/// trace(name, projection) function - logs the input and passes it through
pub struct TraceFunction;

impl FhirPathFunction for TraceFunction {
    fn name(&self) -> &str {
        "trace"
    }
    fn human_friendly_name(&self) -> &str {
        "Trace"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "trace",
                vec![
                    ParameterInfo::required("name", TypeInfo::String),
                    ParameterInfo::optional("projection", TypeInfo::Any),
                ],
                TypeInfo::Any,
            )
        });
        &SIG
    }
    fn evaluate(
        &self,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let label = string_arg(args, 0).unwrap_or("trace");
        match args.get(1) {
            Some(projection) => log::debug!("{label}: {projection:?}"),
            None => log::debug!("{label}: {:?}", context.input),
        }
        Ok(context.input.clone())
    }
}

/// today() function - the current local date
pub struct TodayFunction;

impl FhirPathFunction for TodayFunction {
    fn name(&self) -> &str {
        "today"
    }
    fn human_friendly_name(&self) -> &str {
        "Today"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("today", vec![], TypeInfo::Date));
        &SIG
    }
    fn evaluate(
        &self,
        _args: &[Collection],
        _context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        Ok(Collection::single(FhirPathValue::Date(
            Local::now().date_naive(),
        )))
    }
}

/// now() function - the current local date and time
pub struct NowFunction;

impl FhirPathFunction for NowFunction {
    fn name(&self) -> &str {
        "now"
    }
    fn human_friendly_name(&self) -> &str {
        "Now"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("now", vec![], TypeInfo::DateTime));
        &SIG
    }
    fn evaluate(
        &self,
        _args: &[Collection],
        _context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        Ok(Collection::single(FhirPathValue::DateTime(
            Local::now().fixed_offset(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::guard::GuardedResource;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_children_and_descendants() {
        let input = Collection::single(FhirPathValue::resource(json!({
            "a": {"b": 1},
            "c": [2, 3]
        })));
        let context = EvaluationContext::new(input);
        assert_eq!(ChildrenFunction.evaluate(&[], &context).unwrap().len(), 3);
        assert_eq!(DescendantsFunction.evaluate(&[], &context).unwrap().len(), 4);
    }

    #[test]
    fn test_children_of_guarded_resource_is_forbidden() {
        let guarded = GuardedResource::new(Arc::new(json!({
            "resourceType": "Patient",
            "id": "p1"
        })));
        let context =
            EvaluationContext::new(Collection::single(FhirPathValue::Guarded(Arc::new(guarded))));
        let err = ChildrenFunction.evaluate(&[], &context).unwrap_err();
        assert!(err.to_string().contains("Forbidden access to resource property id"));
    }

    #[test]
    fn test_trace_passes_input_through() {
        let context = EvaluationContext::new(Collection::single(FhirPathValue::Integer(1)));
        let label = Collection::single("label".into());
        assert_eq!(
            TraceFunction.evaluate(&[label], &context).unwrap(),
            context.input
        );
    }
}

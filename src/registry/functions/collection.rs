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

//! Existence, subsetting and combining functions

use crate::model::{Collection, FhirPathValue, TypeInfo};
use crate::registry::function::{
    EvaluationContext, FhirPathFunction, FunctionError, FunctionResult, integer_arg,
};
use crate::registry::signature::{FunctionSignature, ParameterInfo};
use std::sync::LazyLock;

/// empty() function - true when the input collection is empty
pub struct EmptyFunction;

impl FhirPathFunction for EmptyFunction {
    fn name(&self) -> &str {
        "empty"
    }
    fn human_friendly_name(&self) -> &str {
        "Empty"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("empty", vec![], TypeInfo::Boolean));
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn documentation(&self) -> &str {
        "Returns true if the input collection is empty and false otherwise."
    }
    fn evaluate(
        &self,
        _args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        Ok(Collection::single(FhirPathValue::Boolean(
            context.input.is_empty(),
        )))
    }
}

/// count() function - returns the number of elements in the collection
pub struct CountFunction;

impl FhirPathFunction for CountFunction {
    fn name(&self) -> &str {
        "count"
    }
    fn human_friendly_name(&self) -> &str {
        "Count"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("count", vec![], TypeInfo::Integer));
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn documentation(&self) -> &str {
        "Returns a collection with a single value which is the integer count of the number of items in the input collection. Returns 0 when the input collection is empty."
    }
    fn evaluate(
        &self,
        _args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        Ok(Collection::single(FhirPathValue::Integer(
            context.input.len() as i64,
        )))
    }
}

/// distinct() function - removes duplicate items
pub struct DistinctFunction;

impl FhirPathFunction for DistinctFunction {
    fn name(&self) -> &str {
        "distinct"
    }
    fn human_friendly_name(&self) -> &str {
        "Distinct"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("distinct", vec![], TypeInfo::Any));
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
        Ok(context.input.distinct())
    }
}

/// isDistinct() function - true when no item repeats
pub struct IsDistinctFunction;

impl FhirPathFunction for IsDistinctFunction {
    fn name(&self) -> &str {
        "isDistinct"
    }
    fn human_friendly_name(&self) -> &str {
        "Is Distinct"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("isDistinct", vec![], TypeInfo::Boolean));
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
        let distinct = context.input.distinct().len() == context.input.len();
        Ok(Collection::single(FhirPathValue::Boolean(distinct)))
    }
}

/// first() function - the first item, or empty
pub struct FirstFunction;

impl FhirPathFunction for FirstFunction {
    fn name(&self) -> &str {
        "first"
    }
    fn human_friendly_name(&self) -> &str {
        "First"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("first", vec![], TypeInfo::Any));
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
        Ok(context.input.first().cloned().into_iter().collect())
    }
}

/// last() function - the last item, or empty
pub struct LastFunction;

impl FhirPathFunction for LastFunction {
    fn name(&self) -> &str {
        "last"
    }
    fn human_friendly_name(&self) -> &str {
        "Last"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("last", vec![], TypeInfo::Any));
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
        Ok(context.input.last().cloned().into_iter().collect())
    }
}

/// tail() function - every item but the first
pub struct TailFunction;

impl FhirPathFunction for TailFunction {
    fn name(&self) -> &str {
        "tail"
    }
    fn human_friendly_name(&self) -> &str {
        "Tail"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("tail", vec![], TypeInfo::Any));
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
        Ok(context.input.iter().skip(1).cloned().collect())
    }
}

/// skip(num) function - drops the first `num` items
pub struct SkipFunction;

impl FhirPathFunction for SkipFunction {
    fn name(&self) -> &str {
        "skip"
    }
    fn human_friendly_name(&self) -> &str {
        "Skip"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "skip",
                vec![ParameterInfo::required("num", TypeInfo::Integer)],
                TypeInfo::Any,
            )
        });
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let Some(num) = integer_arg(args, 0) else {
            return Ok(Collection::new());
        };
        let num = usize::try_from(num).unwrap_or(0);
        Ok(context.input.iter().skip(num).cloned().collect())
    }
}

/// take(num) function - keeps the first `num` items
pub struct TakeFunction;

impl FhirPathFunction for TakeFunction {
    fn name(&self) -> &str {
        "take"
    }
    fn human_friendly_name(&self) -> &str {
        "Take"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "take",
                vec![ParameterInfo::required("num", TypeInfo::Integer)],
                TypeInfo::Any,
            )
        });
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let Some(num) = integer_arg(args, 0) else {
            return Ok(Collection::new());
        };
        let num = usize::try_from(num).unwrap_or(0);
        Ok(context.input.iter().take(num).cloned().collect())
    }
}

/// single() function - the only item, an error when there are several
pub struct SingleFunction;

impl FhirPathFunction for SingleFunction {
    fn name(&self) -> &str {
        "single"
    }
    fn human_friendly_name(&self) -> &str {
        "Single"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("single", vec![], TypeInfo::Any));
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
        match context.input.len() {
            0 | 1 => Ok(context.input.clone()),
            n => Err(FunctionError::evaluation(
                "single",
                format!("expected at most one item, got {n}"),
            )),
        }
    }
}

/// union(other) function - merge without duplicates
pub struct UnionFunction;

impl FhirPathFunction for UnionFunction {
    fn name(&self) -> &str {
        "union"
    }
    fn human_friendly_name(&self) -> &str {
        "Union"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "union",
                vec![ParameterInfo::required("other", TypeInfo::Any)],
                TypeInfo::Any,
            )
        });
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let mut merged = context.input.clone();
        if let Some(other) = args.first() {
            merged.extend(other.clone());
        }
        Ok(merged.distinct())
    }
}

/// combine(other) function - merge keeping duplicates
pub struct CombineFunction;

impl FhirPathFunction for CombineFunction {
    fn name(&self) -> &str {
        "combine"
    }
    fn human_friendly_name(&self) -> &str {
        "Combine"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "combine",
                vec![ParameterInfo::required("other", TypeInfo::Any)],
                TypeInfo::Any,
            )
        });
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let mut merged = context.input.clone();
        if let Some(other) = args.first() {
            merged.extend(other.clone());
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Collection {
        values.iter().map(|v| FhirPathValue::Integer(*v)).collect()
    }

    #[test]
    fn test_subsetting() {
        let context = EvaluationContext::new(ints(&[1, 2, 3]));
        assert_eq!(TailFunction.evaluate(&[], &context).unwrap(), ints(&[2, 3]));
        assert_eq!(
            SkipFunction.evaluate(&[ints(&[2])], &context).unwrap(),
            ints(&[3])
        );
        assert_eq!(
            TakeFunction.evaluate(&[ints(&[5])], &context).unwrap(),
            ints(&[1, 2, 3])
        );
        assert_eq!(LastFunction.evaluate(&[], &context).unwrap(), ints(&[3]));
    }

    #[test]
    fn test_single_rejects_many() {
        let context = EvaluationContext::new(ints(&[1, 2]));
        assert!(SingleFunction.evaluate(&[], &context).is_err());
    }

    #[test]
    fn test_union_and_combine() {
        let context = EvaluationContext::new(ints(&[1, 2]));
        assert_eq!(
            UnionFunction.evaluate(&[ints(&[2, 3])], &context).unwrap(),
            ints(&[1, 2, 3])
        );
        assert_eq!(
            CombineFunction.evaluate(&[ints(&[2, 3])], &context).unwrap(),
            ints(&[1, 2, 2, 3])
        );
    }
}

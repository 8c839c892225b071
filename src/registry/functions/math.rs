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

//! Math functions

use crate::model::{Collection, FhirPathValue, TypeInfo};
use crate::registry::function::{
    EvaluationContext, FhirPathFunction, FunctionError, FunctionResult, input_singleton,
    integer_arg,
};
use crate::registry::signature::{FunctionSignature, ParameterInfo};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::LazyLock;

fn numeric_input<'a>(
    name: &str,
    context: &'a EvaluationContext,
) -> FunctionResult<Option<&'a FhirPathValue>> {
    match input_singleton(name, context)? {
        Some(value @ (FhirPathValue::Integer(_) | FhirPathValue::Decimal(_))) => Ok(Some(value)),
        Some(other) => Err(FunctionError::evaluation(
            name,
            format!("expected a number, got {}", other.type_name()),
        )),
        None => Ok(None),
    }
}

fn decimal_to_integer(name: &str, value: Decimal) -> FunctionResult<Collection> {
    value
        .to_i64()
        .map(|i| Collection::single(FhirPathValue::Integer(i)))
        .ok_or_else(|| FunctionError::evaluation(name, "result does not fit an Integer"))
}

/// abs() function
pub struct AbsFunction;

impl FhirPathFunction for AbsFunction {
    fn name(&self) -> &str {
        "abs"
    }
    fn human_friendly_name(&self) -> &str {
        "Absolute Value"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("abs", vec![], TypeInfo::Any));
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
        Ok(match numeric_input("abs", context)? {
            Some(FhirPathValue::Integer(i)) => i
                .checked_abs()
                .map(|i| Collection::single(FhirPathValue::Integer(i)))
                .unwrap_or_default(),
            Some(FhirPathValue::Decimal(d)) => Collection::single(FhirPathValue::Decimal(d.abs())),
            _ => Collection::new(),
        })
    }
}

/// round(precision) function - half away from zero, returns a Decimal
pub struct RoundFunction;

impl FhirPathFunction for RoundFunction {
    fn name(&self) -> &str {
        "round"
    }
    fn human_friendly_name(&self) -> &str {
        "Round"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "round",
                vec![ParameterInfo::optional("precision", TypeInfo::Integer)],
                TypeInfo::Decimal,
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
        let Some(value) = numeric_input("round", context)?.and_then(FhirPathValue::as_decimal)
        else {
            return Ok(Collection::new());
        };
        let precision = integer_arg(args, 0).unwrap_or(0);
        let precision = u32::try_from(precision).map_err(|_| {
            FunctionError::evaluation("round", "precision must be a non-negative integer")
        })?;
        let rounded =
            value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
        Ok(Collection::single(FhirPathValue::Decimal(rounded)))
    }
}

/// floor() function
pub struct FloorFunction;

impl FhirPathFunction for FloorFunction {
    fn name(&self) -> &str {
        "floor"
    }
    fn human_friendly_name(&self) -> &str {
        "Floor"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("floor", vec![], TypeInfo::Integer));
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
        match numeric_input("floor", context)?.and_then(FhirPathValue::as_decimal) {
            Some(value) => decimal_to_integer("floor", value.floor()),
            None => Ok(Collection::new()),
        }
    }
}

/// ceiling() function
pub struct CeilingFunction;

impl FhirPathFunction for CeilingFunction {
    fn name(&self) -> &str {
        "ceiling"
    }
    fn human_friendly_name(&self) -> &str {
        "Ceiling"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("ceiling", vec![], TypeInfo::Integer));
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
        match numeric_input("ceiling", context)?.and_then(FhirPathValue::as_decimal) {
            Some(value) => decimal_to_integer("ceiling", value.ceil()),
            None => Ok(Collection::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn decimal(text: &str) -> Collection {
        Collection::single(FhirPathValue::Decimal(Decimal::from_str(text).unwrap()))
    }

    #[test]
    fn test_round_half_away_from_zero() {
        let context = EvaluationContext::new(decimal("2.5"));
        assert_eq!(RoundFunction.evaluate(&[], &context).unwrap(), decimal("3"));

        let context = EvaluationContext::new(decimal("-1.245"));
        let precision = Collection::single(FhirPathValue::Integer(2));
        assert_eq!(
            RoundFunction.evaluate(&[precision], &context).unwrap(),
            decimal("-1.25")
        );
    }

    #[test]
    fn test_floor_and_ceiling_return_integers() {
        let context = EvaluationContext::new(decimal("-1.5"));
        assert_eq!(
            FloorFunction.evaluate(&[], &context).unwrap(),
            Collection::single(FhirPathValue::Integer(-2))
        );
        assert_eq!(
            CeilingFunction.evaluate(&[], &context).unwrap(),
            Collection::single(FhirPathValue::Integer(-1))
        );
    }

    #[test]
    fn test_abs_rejects_strings() {
        let context = EvaluationContext::new(Collection::single("x".into()));
        assert!(AbsFunction.evaluate(&[], &context).is_err());
    }
}

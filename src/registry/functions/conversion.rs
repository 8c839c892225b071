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

//! Type conversion functions
//!
//! Conversions that cannot be performed yield an empty result rather than an
//! error.

use crate::model::{Collection, FhirPathValue, TypeInfo};
use crate::registry::function::{
    EvaluationContext, FhirPathFunction, FunctionResult, input_singleton,
};
use crate::registry::signature::FunctionSignature;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

/// toString() function
pub struct ToStringFunction;

impl FhirPathFunction for ToStringFunction {
    fn name(&self) -> &str {
        "toString"
    }
    fn human_friendly_name(&self) -> &str {
        "To String"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("toString", vec![], TypeInfo::String));
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
        Ok(input_singleton("toString", context)?
            .and_then(FhirPathValue::to_string_value)
            .map(|s| Collection::single(FhirPathValue::String(s)))
            .unwrap_or_default())
    }
}

/// toInteger() function
pub struct ToIntegerFunction;

impl FhirPathFunction for ToIntegerFunction {
    fn name(&self) -> &str {
        "toInteger"
    }
    fn human_friendly_name(&self) -> &str {
        "To Integer"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("toInteger", vec![], TypeInfo::Integer));
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
        let converted = match input_singleton("toInteger", context)? {
            Some(FhirPathValue::Integer(i)) => Some(*i),
            Some(FhirPathValue::Boolean(b)) => Some(i64::from(*b)),
            Some(FhirPathValue::String(s)) => parse_integer(s),
            _ => None,
        };
        Ok(converted
            .map(|i| Collection::single(FhirPathValue::Integer(i)))
            .unwrap_or_default())
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// toDecimal() function
pub struct ToDecimalFunction;

impl FhirPathFunction for ToDecimalFunction {
    fn name(&self) -> &str {
        "toDecimal"
    }
    fn human_friendly_name(&self) -> &str {
        "To Decimal"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("toDecimal", vec![], TypeInfo::Decimal));
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
        let converted = match input_singleton("toDecimal", context)? {
            Some(FhirPathValue::Integer(i)) => Some(Decimal::from(*i)),
            Some(FhirPathValue::Decimal(d)) => Some(*d),
            Some(FhirPathValue::Boolean(b)) => Some(Decimal::from(u8::from(*b))),
            Some(FhirPathValue::String(s)) => parse_decimal(s),
            _ => None,
        };
        Ok(converted
            .map(|d| Collection::single(FhirPathValue::Decimal(d)))
            .unwrap_or_default())
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, "0"));
    let well_formed = !whole.is_empty()
        && !fraction.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return None;
    }
    Decimal::from_str(text.strip_prefix('+').unwrap_or(text)).ok()
}

/// toBoolean() function
pub struct ToBooleanFunction;

impl FhirPathFunction for ToBooleanFunction {
    fn name(&self) -> &str {
        "toBoolean"
    }
    fn human_friendly_name(&self) -> &str {
        "To Boolean"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("toBoolean", vec![], TypeInfo::Boolean));
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn documentation(&self) -> &str {
        "Converts 'true', 't', 'yes', 'y', '1', '1.0' (case-insensitive), 1 and 1.0 to true and the matching negative forms to false."
    }
    fn evaluate(
        &self,
        _args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let converted = match input_singleton("toBoolean", context)? {
            Some(FhirPathValue::Boolean(b)) => Some(*b),
            Some(FhirPathValue::Integer(1)) => Some(true),
            Some(FhirPathValue::Integer(0)) => Some(false),
            Some(FhirPathValue::Decimal(d)) if *d == Decimal::ONE => Some(true),
            Some(FhirPathValue::Decimal(d)) if d.is_zero() => Some(false),
            Some(FhirPathValue::String(s)) => match s.to_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
                "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        Ok(converted
            .map(|b| Collection::single(FhirPathValue::Boolean(b)))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> EvaluationContext {
        EvaluationContext::new(Collection::single(FhirPathValue::from(value)))
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(
            ToIntegerFunction.evaluate(&[], &text("-42")).unwrap(),
            Collection::single(FhirPathValue::Integer(-42))
        );
        assert!(ToIntegerFunction.evaluate(&[], &text("4.2")).unwrap().is_empty());
    }

    #[test]
    fn test_to_decimal() {
        assert_eq!(
            ToDecimalFunction.evaluate(&[], &text("+1.50")).unwrap(),
            Collection::single(FhirPathValue::Decimal(Decimal::from_str("1.50").unwrap()))
        );
        assert!(ToDecimalFunction.evaluate(&[], &text("1e3")).unwrap().is_empty());
    }

    #[test]
    fn test_to_boolean() {
        assert_eq!(
            ToBooleanFunction.evaluate(&[], &text("Yes")).unwrap(),
            Collection::single(FhirPathValue::Boolean(true))
        );
        assert!(ToBooleanFunction.evaluate(&[], &text("maybe")).unwrap().is_empty());
    }

    #[test]
    fn test_to_string_of_object_is_empty() {
        let context = EvaluationContext::new(Collection::single(FhirPathValue::resource(
            serde_json::json!({"a": 1}),
        )));
        assert!(ToStringFunction.evaluate(&[], &context).unwrap().is_empty());
    }
}

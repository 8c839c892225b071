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

//! String manipulation functions
//!
//! Positions and lengths count Unicode scalar values, not bytes.

use crate::model::{Collection, FhirPathValue, TypeInfo};
use crate::registry::function::{
    EvaluationContext, FhirPathFunction, FunctionError, FunctionResult, input_singleton,
    integer_arg, string_arg,
};
use crate::registry::signature::{FunctionSignature, ParameterInfo};
use regex::Regex;
use std::sync::LazyLock;

/// The input string, `None` for empty input
fn input_string<'a>(name: &str, context: &'a EvaluationContext) -> FunctionResult<Option<&'a str>> {
    match input_singleton(name, context)? {
        None => Ok(None),
        Some(FhirPathValue::String(s)) => Ok(Some(s)),
        Some(other) => Err(FunctionError::evaluation(
            name,
            format!("expected a String input, got {}", other.type_name()),
        )),
    }
}

fn string_result(value: impl Into<String>) -> Collection {
    Collection::single(FhirPathValue::String(value.into()))
}

fn boolean_result(value: bool) -> Collection {
    Collection::single(FhirPathValue::Boolean(value))
}

/// join(separator) function - concatenates the input strings
pub struct JoinFunction;

impl FhirPathFunction for JoinFunction {
    fn name(&self) -> &str {
        "join"
    }
    fn human_friendly_name(&self) -> &str {
        "Join"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "join",
                vec![ParameterInfo::optional("separator", TypeInfo::String)],
                TypeInfo::String,
            )
        });
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn documentation(&self) -> &str {
        "Joins the input strings with the separator, or with nothing when no separator is given."
    }
    fn evaluate(
        &self,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let separator = string_arg(args, 0).unwrap_or("");
        let parts = context
            .input
            .iter()
            .map(|item| {
                item.to_string_value().ok_or_else(|| {
                    FunctionError::evaluation("join", format!("cannot join {}", item.type_name()))
                })
            })
            .collect::<FunctionResult<Vec<_>>>()?;
        Ok(string_result(parts.join(separator)))
    }
}

/// split(separator) function
pub struct SplitFunction;

impl FhirPathFunction for SplitFunction {
    fn name(&self) -> &str {
        "split"
    }
    fn human_friendly_name(&self) -> &str {
        "Split"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "split",
                vec![ParameterInfo::required("separator", TypeInfo::String)],
                TypeInfo::Collection(Box::new(TypeInfo::String)),
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
        let (Some(input), Some(separator)) = (input_string("split", context)?, string_arg(args, 0))
        else {
            return Ok(Collection::new());
        };
        Ok(input
            .split(separator)
            .map(|part| FhirPathValue::String(part.to_string()))
            .collect())
    }
}

/// substring(start, length) function
pub struct SubstringFunction;

impl FhirPathFunction for SubstringFunction {
    fn name(&self) -> &str {
        "substring"
    }
    fn human_friendly_name(&self) -> &str {
        "Substring"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "substring",
                vec![
                    ParameterInfo::required("start", TypeInfo::Integer),
                    ParameterInfo::optional("length", TypeInfo::Integer),
                ],
                TypeInfo::String,
            )
        });
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn documentation(&self) -> &str {
        "Returns the part of the string starting at position start (zero-based). Returns empty when start lies outside the string."
    }
    fn evaluate(
        &self,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        let (Some(input), Some(start)) = (input_string("substring", context)?, integer_arg(args, 0))
        else {
            return Ok(Collection::new());
        };
        let chars: Vec<char> = input.chars().collect();
        let Ok(start) = usize::try_from(start) else {
            return Ok(Collection::new());
        };
        if start >= chars.len() {
            return Ok(Collection::new());
        }
        let end = match integer_arg(args, 1) {
            Some(length) => start.saturating_add(usize::try_from(length).unwrap_or(0)),
            None => chars.len(),
        }
        .min(chars.len());
        Ok(string_result(chars[start..end].iter().collect::<String>()))
    }
}

/// startsWith(prefix) function
pub struct StartsWithFunction;

impl FhirPathFunction for StartsWithFunction {
    fn name(&self) -> &str {
        "startsWith"
    }
    fn human_friendly_name(&self) -> &str {
        "Starts With"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "startsWith",
                vec![ParameterInfo::required("prefix", TypeInfo::String)],
                TypeInfo::Boolean,
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
        match (input_string("startsWith", context)?, string_arg(args, 0)) {
            (Some(input), Some(prefix)) => Ok(boolean_result(input.starts_with(prefix))),
            _ => Ok(Collection::new()),
        }
    }
}

/// endsWith(suffix) function
pub struct EndsWithFunction;

impl FhirPathFunction for EndsWithFunction {
    fn name(&self) -> &str {
        "endsWith"
    }
    fn human_friendly_name(&self) -> &str {
        "Ends With"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "endsWith",
                vec![ParameterInfo::required("suffix", TypeInfo::String)],
                TypeInfo::Boolean,
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
        match (input_string("endsWith", context)?, string_arg(args, 0)) {
            (Some(input), Some(suffix)) => Ok(boolean_result(input.ends_with(suffix))),
            _ => Ok(Collection::new()),
        }
    }
}

/// contains(substring) function, the string form of `contains`
pub struct ContainsFunction;

impl FhirPathFunction for ContainsFunction {
    fn name(&self) -> &str {
        "contains"
    }
    fn human_friendly_name(&self) -> &str {
        "Contains"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "contains",
                vec![ParameterInfo::required("substring", TypeInfo::String)],
                TypeInfo::Boolean,
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
        match (input_string("contains", context)?, string_arg(args, 0)) {
            (Some(input), Some(substring)) => Ok(boolean_result(input.contains(substring))),
            _ => Ok(Collection::new()),
        }
    }
}

/// indexOf(substring) function
pub struct IndexOfFunction;

impl FhirPathFunction for IndexOfFunction {
    fn name(&self) -> &str {
        "indexOf"
    }
    fn human_friendly_name(&self) -> &str {
        "Index Of"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "indexOf",
                vec![ParameterInfo::required("substring", TypeInfo::String)],
                TypeInfo::Integer,
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
        let (Some(input), Some(substring)) = (input_string("indexOf", context)?, string_arg(args, 0))
        else {
            return Ok(Collection::new());
        };
        let index = input
            .find(substring)
            .map(|byte_index| input[..byte_index].chars().count() as i64)
            .unwrap_or(-1);
        Ok(Collection::single(FhirPathValue::Integer(index)))
    }
}

/// upper() function
pub struct UpperFunction;

impl FhirPathFunction for UpperFunction {
    fn name(&self) -> &str {
        "upper"
    }
    fn human_friendly_name(&self) -> &str {
        "Upper"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("upper", vec![], TypeInfo::String));
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
        Ok(input_string("upper", context)?
            .map(|s| string_result(s.to_uppercase()))
            .unwrap_or_default())
    }
}

/// lower() function
pub struct LowerFunction;

impl FhirPathFunction for LowerFunction {
    fn name(&self) -> &str {
        "lower"
    }
    fn human_friendly_name(&self) -> &str {
        "Lower"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("lower", vec![], TypeInfo::String));
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
        Ok(input_string("lower", context)?
            .map(|s| string_result(s.to_lowercase()))
            .unwrap_or_default())
    }
}

/// replace(pattern, substitution) function - literal replacement
pub struct ReplaceFunction;

impl FhirPathFunction for ReplaceFunction {
    fn name(&self) -> &str {
        "replace"
    }
    fn human_friendly_name(&self) -> &str {
        "Replace"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "replace",
                vec![
                    ParameterInfo::required("pattern", TypeInfo::String),
                    ParameterInfo::required("substitution", TypeInfo::String),
                ],
                TypeInfo::String,
            )
        });
        &SIG
    }
    fn is_pure(&self) -> bool {
        true
    }
    fn documentation(&self) -> &str {
        "Replaces every occurrence of pattern with substitution. An empty pattern surrounds every character with the substitution."
    }
    fn evaluate(
        &self,
        args: &[Collection],
        context: &EvaluationContext,
    ) -> FunctionResult<Collection> {
        match (
            input_string("replace", context)?,
            string_arg(args, 0),
            string_arg(args, 1),
        ) {
            (Some(input), Some(pattern), Some(substitution)) => {
                Ok(string_result(input.replace(pattern, substitution)))
            }
            _ => Ok(Collection::new()),
        }
    }
}

/// matches(regex) function - true when the regex matches anywhere in the input
pub struct MatchesFunction;

impl FhirPathFunction for MatchesFunction {
    fn name(&self) -> &str {
        "matches"
    }
    fn human_friendly_name(&self) -> &str {
        "Matches"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> = LazyLock::new(|| {
            FunctionSignature::new(
                "matches",
                vec![ParameterInfo::required("regex", TypeInfo::String)],
                TypeInfo::Boolean,
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
        let (Some(input), Some(pattern)) = (input_string("matches", context)?, string_arg(args, 0))
        else {
            return Ok(Collection::new());
        };
        let regex = Regex::new(pattern)
            .map_err(|e| FunctionError::evaluation("matches", format!("invalid regex: {e}")))?;
        Ok(boolean_result(regex.is_match(input)))
    }
}

/// length() function
pub struct LengthFunction;

impl FhirPathFunction for LengthFunction {
    fn name(&self) -> &str {
        "length"
    }
    fn human_friendly_name(&self) -> &str {
        "Length"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("length", vec![], TypeInfo::Integer));
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
        Ok(input_string("length", context)?
            .map(|s| Collection::single(FhirPathValue::Integer(s.chars().count() as i64)))
            .unwrap_or_default())
    }
}

/// trim() function
pub struct TrimFunction;

impl FhirPathFunction for TrimFunction {
    fn name(&self) -> &str {
        "trim"
    }
    fn human_friendly_name(&self) -> &str {
        "Trim"
    }
    fn signature(&self) -> &FunctionSignature {
        static SIG: LazyLock<FunctionSignature> =
            LazyLock::new(|| FunctionSignature::new("trim", vec![], TypeInfo::String));
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
        Ok(input_string("trim", context)?
            .map(|s| string_result(s.trim()))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Collection {
        Collection::single(FhirPathValue::String(value.to_string()))
    }

    fn int(value: i64) -> Collection {
        Collection::single(FhirPathValue::Integer(value))
    }

    #[test]
    fn test_substring_is_char_based() {
        let context = EvaluationContext::new(text("héllo"));
        assert_eq!(
            SubstringFunction.evaluate(&[int(1), int(3)], &context).unwrap(),
            text("éll")
        );
        assert!(
            SubstringFunction
                .evaluate(&[int(9)], &context)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_join_and_split() {
        let context = EvaluationContext::new(
            vec![FhirPathValue::from("a"), FhirPathValue::from("b")].into(),
        );
        assert_eq!(JoinFunction.evaluate(&[text(", ")], &context).unwrap(), text("a, b"));

        let context = EvaluationContext::new(text("a,b"));
        assert_eq!(SplitFunction.evaluate(&[text(",")], &context).unwrap().len(), 2);
    }

    #[test]
    fn test_index_of_and_matches() {
        let context = EvaluationContext::new(text("héllo"));
        assert_eq!(IndexOfFunction.evaluate(&[text("l")], &context).unwrap(), int(2));
        assert_eq!(
            MatchesFunction.evaluate(&[text("^h.l+o$")], &context).unwrap(),
            boolean_result(true)
        );
        assert!(MatchesFunction.evaluate(&[text("(")], &context).is_err());
    }

    #[test]
    fn test_non_string_input_is_an_error() {
        let context = EvaluationContext::new(int(1));
        assert!(UpperFunction.evaluate(&[], &context).is_err());
    }
}

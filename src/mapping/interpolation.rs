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

//! Expression interpolation inside string leaves

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::FpmlResult;
use super::node::Node;
use crate::model::{Collection, FhirPathValue};

static ARRAY_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\[\s*([\s\S]+?)\s*\]\}$").expect("static regex"));
static SINGLE_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(\+?)\s*([\s\S]+?)\s*\+?\}\}").expect("static regex"));

/// Resolve the expressions embedded in `text`
///
/// A string that is exactly `{[ expr ]}` becomes the whole result as a
/// sequence. Otherwise every `{{ expr }}` is replaced by the first answer of
/// its expression. A single occurrence spanning the whole string keeps the
/// answer's type. The first occurrence without an answer ends the scan: the
/// leaf is absent, or null when written as `{{+ expr +}}`.
pub fn interpolate<F>(text: &str, mut evaluate: F) -> FpmlResult<Node>
where
    F: FnMut(&str) -> FpmlResult<Collection>,
{
    if let Some(expression) = ARRAY_TEMPLATE.captures(text).and_then(|c| c.get(1)) {
        let answers = evaluate(expression.as_str())?;
        return Ok(Node::from_collection(&answers));
    }

    let mut output = String::with_capacity(text.len());
    let mut last = 0;
    for captures in SINGLE_TEMPLATE.captures_iter(text) {
        let (Some(occurrence), Some(expression)) = (captures.get(0), captures.get(2)) else {
            continue;
        };
        let retain_null = captures.get(1).is_some_and(|plus| !plus.is_empty());

        let answers = evaluate(expression.as_str())?;
        let Some(answer) = answers.first() else {
            return Ok(if retain_null { Node::Null } else { Node::Absent });
        };

        if occurrence.start() == 0 && occurrence.end() == text.len() {
            return Ok(Node::from_value(answer));
        }

        output.push_str(&text[last..occurrence.start()]);
        output.push_str(&splice_text(answer));
        last = occurrence.end();
    }

    if last == 0 {
        return Ok(Node::String(text.to_string()));
    }
    output.push_str(&text[last..]);
    Ok(Node::String(output))
}

fn splice_text(answer: &FhirPathValue) -> String {
    answer
        .to_string_value()
        .unwrap_or_else(|| answer.to_json().to_string())
}

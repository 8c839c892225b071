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

//! Directive recognition on mapping nodes
//!
//! Every key of a mapping is classified once. Duplicated or conflicting
//! directive keys are rejected here, before anything is evaluated, so the
//! walker only ever dispatches a single well-formed block.

use once_cell::sync::Lazy;
use regex::Regex;

use super::node::Node;

static ASSIGN_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{%\s*assign\s*%\}$").expect("static regex"));
static MERGE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{%\s*merge\s*%\}$").expect("static regex"));
static ELSE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{%\s*else\s*%\}$").expect("static regex"));
static IF_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{%\s*if\s+(.+?)\s*%\}$").expect("static regex"));
static FOR_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{%\s*for\s+(?:(\w+?)\s*,\s*)?(\w+?)\s+in\s+(.+?)\s*%\}$")
        .expect("static regex")
});
static CONTEXT_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{\s*(.+?)\s*\}\}$").expect("static regex"));

/// What a single mapping key means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind<'a> {
    /// `{% assign %}`
    Assign,
    /// `{{ expr }}` as the whole key
    ContextRebind {
        /// Expression producing the new resources
        expression: &'a str,
    },
    /// `{% merge %}`
    Merge,
    /// `{% for [index,] item in expr %}`
    ForEach {
        /// Optional index variable
        index_var: Option<&'a str>,
        /// Item variable
        item_var: &'a str,
        /// Expression producing the items
        source: &'a str,
    },
    /// `{% if expr %}`
    If {
        /// Condition expression
        condition: &'a str,
    },
    /// `{% else %}`
    Else,
    /// Any other key
    Literal,
}

impl<'a> KeyKind<'a> {
    /// Classify one key
    pub fn classify(key: &'a str) -> Self {
        if ASSIGN_KEY.is_match(key) {
            return KeyKind::Assign;
        }
        if MERGE_KEY.is_match(key) {
            return KeyKind::Merge;
        }
        if ELSE_KEY.is_match(key) {
            return KeyKind::Else;
        }
        if let Some(captures) = FOR_KEY.captures(key) {
            if let (Some(item_var), Some(source)) = (captures.get(2), captures.get(3)) {
                return KeyKind::ForEach {
                    index_var: captures.get(1).map(|m| m.as_str()),
                    item_var: item_var.as_str(),
                    source: source.as_str(),
                };
            }
        }
        if let Some(condition) = IF_KEY.captures(key).and_then(|c| c.get(1)) {
            return KeyKind::If {
                condition: condition.as_str(),
            };
        }
        if let Some(expression) = CONTEXT_KEY.captures(key).and_then(|c| c.get(1)) {
            return KeyKind::ContextRebind {
                expression: expression.as_str(),
            };
        }
        KeyKind::Literal
    }
}

/// The control-flow block of a mapping, if it has one
#[derive(Debug, Clone, PartialEq)]
pub enum Block<'a> {
    /// Resolve `body` once per answer of `expression`, using the answer as
    /// the resource
    ContextRebind {
        /// Expression producing the new resources
        expression: &'a str,
        /// Template resolved per answer
        body: &'a Node,
    },
    /// Layer the resolved `body` over the literal keys
    Merge {
        /// One mapping or a sequence of them
        body: &'a Node,
    },
    /// Resolve `body` once per answer of `source`
    ForEach {
        /// Optional index variable
        index_var: Option<&'a str>,
        /// Item variable
        item_var: &'a str,
        /// Expression producing the items
        source: &'a str,
        /// Template resolved per item
        body: &'a Node,
    },
    /// Pick one of two branches
    Conditional {
        /// Condition expression
        condition: &'a str,
        /// Taken when the condition holds
        then_branch: &'a Node,
        /// Taken otherwise
        else_branch: Option<&'a Node>,
    },
}

/// Result of classifying every key of a mapping
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectiveSet<'a> {
    /// Value of the `{% assign %}` key
    pub assign: Option<&'a Node>,
    /// The single control-flow block
    pub block: Option<Block<'a>>,
    /// Keys that are not directives, in document order
    pub literals: Vec<(&'a str, &'a Node)>,
}

impl<'a> DirectiveSet<'a> {
    /// Classify the keys of `entries`
    ///
    /// On a shape violation the error message is returned for the caller to
    /// attach a path to.
    pub fn classify<I>(entries: I) -> Result<Self, &'static str>
    where
        I: IntoIterator<Item = (&'a String, &'a Node)>,
    {
        let mut set = DirectiveSet::default();
        let mut context: Vec<(&'a str, &'a Node)> = Vec::new();
        let mut merge: Vec<&'a Node> = Vec::new();
        let mut for_each: Vec<(KeyKind<'a>, &'a Node)> = Vec::new();
        let mut conditions: Vec<(&'a str, &'a Node)> = Vec::new();
        let mut else_branches: Vec<&'a Node> = Vec::new();
        let mut keys = 0usize;

        for (key, value) in entries {
            let kind = KeyKind::classify(key);
            if kind != KeyKind::Assign {
                keys += 1;
            }
            match kind {
                KeyKind::Assign => {
                    if set.assign.replace(value).is_some() {
                        return Err("Assign block must be presented once");
                    }
                }
                KeyKind::ContextRebind { expression } => context.push((expression, value)),
                KeyKind::Merge => merge.push(value),
                KeyKind::ForEach { .. } => for_each.push((kind, value)),
                KeyKind::If { condition } => conditions.push((condition, value)),
                KeyKind::Else => else_branches.push(value),
                KeyKind::Literal => set.literals.push((key.as_str(), value)),
            }
        }

        if let Some(&(expression, body)) = context.first() {
            if keys > 1 {
                return Err("Context block must be presented as single key");
            }
            set.block = Some(Block::ContextRebind { expression, body });
            return Ok(set);
        }

        if let Some((kind, body)) = for_each.into_iter().next() {
            if keys > 1 {
                return Err("For block must be presented as single key");
            }
            if let KeyKind::ForEach {
                index_var,
                item_var,
                source,
            } = kind
            {
                set.block = Some(Block::ForEach {
                    index_var,
                    item_var,
                    source,
                    body,
                });
            }
            return Ok(set);
        }

        if conditions.len() > 1 {
            return Err("If block must be presented once");
        }
        if else_branches.len() > 1 {
            return Err("Else block must be presented once");
        }
        if !else_branches.is_empty() && conditions.is_empty() {
            return Err("Else block must be presented only when if block is presented");
        }

        if let Some(&body) = merge.first() {
            if merge.len() > 1 {
                return Err("Merge block must be presented once");
            }
            if !conditions.is_empty() {
                return Err("Merge block can not be combined with if/else block");
            }
            set.block = Some(Block::Merge { body });
            return Ok(set);
        }

        if let Some(&(condition, then_branch)) = conditions.first() {
            set.block = Some(Block::Conditional {
                condition,
                then_branch,
                else_branch: else_branches.first().copied(),
            });
        }
        Ok(set)
    }

    /// Whether the block is the only thing besides an assign
    pub fn is_exclusive(&self) -> bool {
        self.literals.is_empty()
    }
}

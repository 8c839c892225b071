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

//! Evaluator options accepted by [`resolve`](super::resolve)

use crate::registry::{UserFunction, UserInvocationTable};

/// Options forwarded to the expression evaluator
#[derive(Debug, Clone, Default)]
pub struct FpOptions {
    /// Functions callable as `input.name(args)`
    pub user_functions: UserInvocationTable,
}

impl FpOptions {
    /// Options without user functions
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user function
    pub fn with_user_function(mut self, name: impl Into<String>, function: UserFunction) -> Self {
        self.user_functions.insert(name.into(), function);
        self
    }
}

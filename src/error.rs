// Copyright 2024 Saptak Santra
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

//! Error types.
//!
//! The public API follows a fail-fast-on-programmer-error policy: invalid
//! use (zero alignment, re-entrant `run_systems`, out-of-bounds batch
//! access) panics, and stale/never-issued entity handles are silent
//! no-ops. `EcsError` exists only for the narrow internal surface where a
//! structured error is more useful than an immediate panic (chunk layout
//! overflow), and is converted to a panic at the public boundary.

use std::fmt;

#[derive(Debug, Clone)]
pub enum EcsError {
    /// A component's registered size makes it impossible to fit even one
    /// row of the requested signature inside a single table chunk.
    LayoutOverflow { chunk_size: usize, row_size: usize },
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::LayoutOverflow { chunk_size, row_size } => write!(
                f,
                "table row of {row_size} bytes does not fit in a {chunk_size}-byte chunk"
            ),
        }
    }
}

impl std::error::Error for EcsError {}

pub type Result<T> = std::result::Result<T, EcsError>;

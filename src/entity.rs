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

//! Entity handles and their in-world location.

use slotmap::new_key_type;

new_key_type! {
    /// Opaque, stable handle to a live entity.
    ///
    /// Backed by `slotmap`'s generational key: the index is recycled when
    /// an entity is destroyed, but the embedded generation changes, so a
    /// handle issued before destruction never aliases a later entity that
    /// reuses the same slot. This stands in for a manual
    /// `{from_1_index, generation}` pair plus free-list bookkeeping.
    pub struct Entity;
}

/// Where a live entity's row lives: which table, and at what logical
/// position within it. The table translates `position_in_table` into a
/// `(chunk, offset)` pair on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntitySlot {
    pub table: crate::archetype::TableId,
    pub position_in_table: u32,
}

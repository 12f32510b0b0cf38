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

//! Entity templates: a named, reusable signature plus the component
//! bytes every entity created from it starts with.

use crate::archetype::TableId;
use crate::component::ComponentId;

/// Handle to a registered template, scoped to the world it was
/// registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(pub(crate) u32);

impl TemplateId {
    pub const NULL: TemplateId = TemplateId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn index(self) -> usize {
        debug_assert!(!self.is_null());
        (self.0 - 1) as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        TemplateId((index + 1) as u32)
    }
}

/// The table a template's entities live in, plus the initial bytes for
/// every component the template specified a value for (components left
/// unspecified are zero-initialized, same as a freshly grown chunk).
pub(crate) struct Template {
    pub table: TableId,
    pub init: Vec<(ComponentId, Vec<u8>)>,
}

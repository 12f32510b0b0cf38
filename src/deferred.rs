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

//! Deferred mutation queue.
//!
//! `destroy_entity`/`morph_entity` calls made while a system is iterating
//! its own currently-dispatched table cannot run immediately — doing so
//! would invalidate the batch the system is midway through reading. They
//! are queued here instead and drained after each table's chunks finish,
//! in the order they were issued. `Morph`'s new component bytes are
//! copied out of the caller's borrow at enqueue time, since the borrow
//! itself has no guarantee of outliving the drain.

use crate::component::ComponentId;
use crate::entity::Entity;

pub(crate) enum DeferredOp {
    Destroy {
        entity: Entity,
    },
    Morph {
        entity: Entity,
        add: Vec<(ComponentId, Option<Vec<u8>>)>,
        remove: Vec<ComponentId>,
    },
}

#[derive(Default)]
pub(crate) struct DeferredQueue {
    ops: Vec<DeferredOp>,
}

impl DeferredQueue {
    pub fn push_destroy(&mut self, entity: Entity) {
        self.ops.push(DeferredOp::Destroy { entity });
    }

    pub fn push_morph(&mut self, entity: Entity, add: Vec<(ComponentId, Option<Vec<u8>>)>, remove: Vec<ComponentId>) {
        self.ops.push(DeferredOp::Morph { entity, add, remove });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Remove and return every op queued so far, oldest first, leaving
    /// the queue empty for the next table's dispatch.
    pub fn drain(&mut self) -> Vec<DeferredOp> {
        std::mem::take(&mut self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    #[test]
    fn drain_preserves_fifo_order() {
        let mut queue = DeferredQueue::default();
        let e1: Entity = KeyData::from_ffi(1).into();
        let e2: Entity = KeyData::from_ffi(2).into();
        queue.push_destroy(e1);
        queue.push_destroy(e2);

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], DeferredOp::Destroy { entity } if entity == e1));
        assert!(matches!(drained[1], DeferredOp::Destroy { entity } if entity == e2));
        assert!(queue.is_empty());
    }
}

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

//! System descriptors and the per-chunk batch view passed to `update_fn`.

use std::any::Any;
use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::archetype::TableId;
use crate::component::ComponentId;
use crate::entity::Entity;
use crate::world::World;

/// Handle to a registered system. `0` is reserved and never assigned by
/// [`crate::registry::Registry::register_system`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub(crate) u32);

impl SystemId {
    pub const NULL: SystemId = SystemId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn index(self) -> usize {
        debug_assert!(!self.is_null());
        (self.0 - 1) as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        SystemId((index + 1) as u32)
    }
}

/// Runs once per matching chunk while a system's table is dispatched.
pub type SystemUpdateFn = fn(&mut World, Batch<'_>, &mut (dyn Any + Send + Sync));
/// Runs once per call to [`World::run_systems`]/[`World::run_system`],
/// before or after the system's tables are dispatched.
pub type SystemWorldFn = fn(&mut World, &mut (dyn Any + Send + Sync));
/// Runs once per entity entering or leaving a system's matched set.
pub type SystemEntityFn = fn(&mut World, Entity, &mut (dyn Any + Send + Sync));

/// A registered system's component filter, dispatch hooks, and the mask
/// that gates whether [`World::run_systems`] includes it in a given call.
pub struct SystemOptions {
    pub match_components: Vec<ComponentId>,
    pub update_mask: u64,
    pub userdata: Option<Box<dyn Any + Send + Sync>>,
    pub pre_update_fn: Option<SystemWorldFn>,
    pub post_update_fn: Option<SystemWorldFn>,
    pub update_fn: Option<SystemUpdateFn>,
    pub init_per_world_fn: Option<SystemWorldFn>,
    pub cleanup_per_world_fn: Option<SystemWorldFn>,
    pub init_per_entity_fn: Option<SystemEntityFn>,
    pub cleanup_per_entity_fn: Option<SystemEntityFn>,
}

impl SystemOptions {
    pub fn new(match_components: Vec<ComponentId>) -> Self {
        Self {
            match_components,
            update_mask: u64::MAX,
            userdata: None,
            pre_update_fn: None,
            post_update_fn: None,
            update_fn: None,
            init_per_world_fn: None,
            cleanup_per_world_fn: None,
            init_per_entity_fn: None,
            cleanup_per_entity_fn: None,
        }
    }

    pub fn with_update_mask(mut self, mask: u64) -> Self {
        self.update_mask = mask;
        self
    }

    pub fn with_update_fn(mut self, f: SystemUpdateFn) -> Self {
        self.update_fn = Some(f);
        self
    }

    pub fn with_pre_update_fn(mut self, f: SystemWorldFn) -> Self {
        self.pre_update_fn = Some(f);
        self
    }

    pub fn with_post_update_fn(mut self, f: SystemWorldFn) -> Self {
        self.post_update_fn = Some(f);
        self
    }

    pub fn with_init_per_world_fn(mut self, f: SystemWorldFn) -> Self {
        self.init_per_world_fn = Some(f);
        self
    }

    pub fn with_cleanup_per_world_fn(mut self, f: SystemWorldFn) -> Self {
        self.cleanup_per_world_fn = Some(f);
        self
    }

    pub fn with_init_per_entity_fn(mut self, f: SystemEntityFn) -> Self {
        self.init_per_entity_fn = Some(f);
        self
    }

    pub fn with_cleanup_per_entity_fn(mut self, f: SystemEntityFn) -> Self {
        self.cleanup_per_entity_fn = Some(f);
        self
    }

    pub fn with_userdata(mut self, userdata: Box<dyn Any + Send + Sync>) -> Self {
        self.userdata = Some(userdata);
        self
    }
}

/// Per-(system, table) cache: for each of the system's declared
/// components, which signature slot of this table holds it. Rebuilt
/// whenever the world resyncs against the registry.
pub(crate) struct TableMatch {
    pub table: TableId,
    pub signature_indices: Vec<usize>,
}

/// One chunk's worth of matching rows, handed to a system's `update_fn`.
///
/// Column pointers are raw rather than borrowed: `update_fn` also
/// receives `&mut World`, and a callback is free to create or defer
/// mutations against other tables while this batch is alive. The table
/// this batch reads from is never itself reallocated mid-dispatch
/// (structural changes to it are queued and drained between chunks), so
/// the addresses stay valid for the call's duration; dereferencing beyond
/// `len` or after the call returns is the caller's responsibility, same
/// as out-of-bounds indexing anywhere else in this crate's public API.
pub struct Batch<'a> {
    len: usize,
    entities: *const Entity,
    columns: SmallVec<[*mut u8; 8]>,
    sizes: SmallVec<[usize; 8]>,
    _marker: PhantomData<&'a mut ()>,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(
        entities: *const Entity,
        len: usize,
        columns: SmallVec<[*mut u8; 8]>,
        sizes: SmallVec<[usize; 8]>,
    ) -> Self {
        Self { len, entities, columns, sizes, _marker: PhantomData }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn entity(&self, row: usize) -> Entity {
        assert!(row < self.len, "batch row {row} out of bounds (len {})", self.len);
        unsafe { *self.entities.add(row) }
    }

    /// Base pointer of the `match_index`-th matched component's column
    /// for this chunk, in the order the system declared its components.
    /// The caller indexes by row and casts to the registered type.
    pub fn column(&self, match_index: usize) -> *mut u8 {
        self.columns[match_index]
    }

    pub fn component_size(&self, match_index: usize) -> usize {
        self.sizes[match_index]
    }
}

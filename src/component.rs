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

//! Component registration types.
//!
//! A component is a plain byte layout (size + alignment) known to the
//! registry, not a Rust type the registry tracks generically — callers
//! describe the layout once via [`ComponentOptions`] and thereafter refer
//! to it only by its [`ComponentId`] handle. [`ComponentInit`] is how a
//! caller hands the runtime a component's initial bytes when creating or
//! morphing an entity, borrowed from the caller's stack for the duration
//! of the call.

use std::any::Any;
use std::mem::size_of;

use crate::entity::Entity;
use crate::world::World;

/// Handle to a registered component. `0` is reserved and never assigned
/// by [`crate::registry::Registry::register_component`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    pub const NULL: ComponentId = ComponentId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn index(self) -> usize {
        debug_assert!(!self.is_null());
        (self.0 - 1) as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        ComponentId((index + 1) as u32)
    }
}

/// Called when a component is added to an entity's row (on creation, or
/// when a morph introduces it), and again when it is removed (on
/// destruction, or when a morph drops it). `data` is the component's raw
/// bytes within the table's column; `init_fn` may write into it, and
/// `cleanup_fn` observes it one last time before the row is reused.
pub type ComponentFn = fn(&mut World, Entity, &mut [u8], &mut (dyn Any + Send + Sync));

/// A registered component's layout and lifecycle hooks.
pub struct ComponentOptions {
    pub size: usize,
    pub alignment: usize,
    pub init_fn: Option<ComponentFn>,
    pub cleanup_fn: Option<ComponentFn>,
    pub userdata: Option<Box<dyn Any + Send + Sync>>,
}

impl ComponentOptions {
    pub fn new(size: usize, alignment: usize) -> Self {
        Self {
            size,
            alignment,
            init_fn: None,
            cleanup_fn: None,
            userdata: None,
        }
    }

    /// Layout derived from `T`'s own size and alignment; the common case
    /// for components that are ordinary Rust structs.
    pub fn of<T>() -> Self {
        Self::new(size_of::<T>(), std::mem::align_of::<T>())
    }

    pub fn with_init_fn(mut self, f: ComponentFn) -> Self {
        self.init_fn = Some(f);
        self
    }

    pub fn with_cleanup_fn(mut self, f: ComponentFn) -> Self {
        self.cleanup_fn = Some(f);
        self
    }

    pub fn with_userdata(mut self, userdata: Box<dyn Any + Send + Sync>) -> Self {
        self.userdata = Some(userdata);
        self
    }
}

/// Initial bytes for one component on a newly created or morphed entity.
/// Borrows the caller's value; the runtime copies it into the table
/// column before returning, it never retains the borrow.
#[derive(Clone, Copy)]
pub struct ComponentInit<'a> {
    pub component: ComponentId,
    pub data: Option<&'a [u8]>,
}

impl<'a> ComponentInit<'a> {
    pub fn new(component: ComponentId, data: Option<&'a [u8]>) -> Self {
        Self { component, data }
    }

    /// Borrow `value`'s bytes directly; `value`'s layout must match the
    /// size registered for `component` or the copy in
    /// [`crate::world::World::create_entity`] panics.
    pub fn of<T>(component: ComponentId, value: &'a T) -> Self {
        let bytes = unsafe {
            std::slice::from_raw_parts((value as *const T).cast::<u8>(), size_of::<T>())
        };
        Self::new(component, Some(bytes))
    }

    /// No initial bytes; the column is left as allocated (typically
    /// zeroed) until `init_fn` runs, if one is registered.
    pub fn empty(component: ComponentId) -> Self {
        Self::new(component, None)
    }
}

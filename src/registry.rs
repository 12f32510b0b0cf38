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

//! The versioned catalog of component and system descriptors.
//!
//! A [`Registry`] outlives any number of [`crate::world::World`]s built
//! against it. Registration never touches a world directly; each world
//! instead compares its own last-seen `version` against the registry's
//! current one and resynchronizes lazily, the first time any public
//! `World` method is called after a registration.

use std::any::Any;

use tracing::debug;

use crate::component::{ComponentFn, ComponentId, ComponentOptions};
use crate::system::{SystemId, SystemOptions};

/// Reserved for forward compatibility with a future registry-wide knob;
/// carries no fields today.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryOptions {}

#[derive(Default)]
pub struct Registry {
    components: Vec<ComponentOptions>,
    systems: Vec<SystemOptions>,
    version: u64,
}

impl Registry {
    pub fn new(_options: RegistryOptions) -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Register a component. A null `handle` appends `options` and mints a
    /// fresh handle; a nonzero `handle` overwrites the descriptor already
    /// at that handle in place (callbacks/userdata only — changing size or
    /// alignment on an already-registered handle is undefined, since
    /// existing tables were laid out against the old layout).
    /// `options.alignment` must be a nonzero power of two.
    pub fn register_component(&mut self, handle: ComponentId, options: ComponentOptions) -> ComponentId {
        assert!(options.alignment > 0, "component alignment must be nonzero");
        assert!(
            options.alignment.is_power_of_two(),
            "component alignment must be a power of two, got {}",
            options.alignment
        );
        self.version += 1;
        let handle = if handle.is_null() {
            self.components.push(options);
            ComponentId::from_index(self.components.len() - 1)
        } else {
            self.components[handle.index()] = options;
            handle
        };
        debug!(version = self.version, count = self.components.len(), "registered component");
        handle
    }

    /// Register a system. A null `handle` appends `options` and mints a
    /// fresh handle; a nonzero `handle` overwrites the descriptor already
    /// at that handle in place.
    pub fn register_system(&mut self, handle: SystemId, options: SystemOptions) -> SystemId {
        self.version += 1;
        let handle = if handle.is_null() {
            self.systems.push(options);
            SystemId::from_index(self.systems.len() - 1)
        } else {
            self.systems[handle.index()] = options;
            handle
        };
        debug!(version = self.version, count = self.systems.len(), "registered system");
        handle
    }

    pub fn component(&self, id: ComponentId) -> &ComponentOptions {
        &self.components[id.index()]
    }

    pub fn system(&self, id: SystemId) -> &SystemOptions {
        &self.systems[id.index()]
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &ComponentOptions)> {
        self.components.iter().enumerate().map(|(i, c)| (ComponentId::from_index(i), c))
    }

    pub fn systems(&self) -> impl Iterator<Item = (SystemId, &SystemOptions)> {
        self.systems.iter().enumerate().map(|(i, s)| (SystemId::from_index(i), s))
    }

    /// A raw pointer to a component's userdata, valid as long as the
    /// registry keeps that component's `Box` alive (registration only
    /// ever appends, never replaces or drops an existing entry). Used by
    /// the world to hand a callback `&mut dyn Any` without holding a
    /// borrow of the registry across the call.
    pub(crate) fn component_userdata_ptr(&self, id: ComponentId) -> Option<*mut (dyn Any + Send + Sync)> {
        self.components[id.index()]
            .userdata
            .as_ref()
            .map(|b| b.as_ref() as *const (dyn Any + Send + Sync) as *mut (dyn Any + Send + Sync))
    }

    pub(crate) fn component_fns(&self, id: ComponentId) -> (Option<ComponentFn>, Option<ComponentFn>) {
        let c = &self.components[id.index()];
        (c.init_fn, c.cleanup_fn)
    }

    pub(crate) fn system_userdata_ptr(&self, id: SystemId) -> Option<*mut (dyn Any + Send + Sync)> {
        self.systems[id.index()]
            .userdata
            .as_ref()
            .map(|b| b.as_ref() as *const (dyn Any + Send + Sync) as *mut (dyn Any + Send + Sync))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_assigns_sequential_handles_and_bumps_version() {
        let mut registry = Registry::new(RegistryOptions::default());
        let v0 = registry.version();
        let a = registry.register_component(ComponentId::NULL, ComponentOptions::new(4, 4));
        let b = registry.register_component(ComponentId::NULL, ComponentOptions::new(8, 8));
        assert_ne!(a, b);
        assert!(registry.version() > v0);
        assert_eq!(registry.component_count(), 2);
    }

    #[test]
    fn system_handles_are_independent_of_component_handles() {
        let mut registry = Registry::new(RegistryOptions::default());
        registry.register_component(ComponentId::NULL, ComponentOptions::new(4, 4));
        registry.register_component(ComponentId::NULL, ComponentOptions::new(4, 4));
        let sys = registry.register_system(SystemId::NULL, SystemOptions::new(vec![]));
        assert_eq!(sys.index(), 0);
    }

    #[test]
    #[should_panic(expected = "nonzero")]
    fn zero_alignment_panics() {
        let mut registry = Registry::new(RegistryOptions::default());
        registry.register_component(ComponentId::NULL, ComponentOptions::new(4, 0));
    }

    #[test]
    fn nonzero_handle_overwrites_descriptor_in_place_without_minting_a_new_one() {
        let mut registry = Registry::new(RegistryOptions::default());
        let a = registry.register_component(ComponentId::NULL, ComponentOptions::new(4, 4));
        let v0 = registry.version();

        let b = registry.register_component(a, ComponentOptions::new(4, 4).with_cleanup_fn(|_, _, _, _| {}));
        assert_eq!(a, b);
        assert_eq!(registry.component_count(), 1);
        assert!(registry.version() > v0);
        assert!(registry.component(a).cleanup_fn.is_some());
    }
}

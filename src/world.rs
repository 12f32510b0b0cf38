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

//! The world: entity lifecycle, table storage, and system dispatch.
//!
//! A world attaches to a [`Registry`] and lazily resynchronizes against
//! it — rebuilding table callback caches and per-system matched-table
//! lists — the first time any public method runs after the registry's
//! version has moved. Between resyncs, `create_entity`/`destroy_entity`/
//! `morph_entity`/`run_systems` all operate purely off the world's own
//! cached state.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::archetype::{layout_chunk, Table, TableId};
use crate::bitset::Bitset;
use crate::component::{ComponentFn, ComponentId, ComponentInit};
use crate::deferred::{DeferredOp, DeferredQueue};
use crate::entity::{Entity, EntitySlot};
use crate::registry::Registry;
use crate::system::{Batch, SystemEntityFn, SystemId, SystemOptions, SystemWorldFn, TableMatch};
use crate::template::{Template, TemplateId};

/// Default chunk size, matching the 16 KiB default the layout algorithm
/// was designed around.
pub const DEFAULT_TABLE_CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct WorldOptions {
    pub table_chunk_size: usize,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self { table_chunk_size: DEFAULT_TABLE_CHUNK_SIZE }
    }
}

#[derive(Default)]
struct SystemRuntime {
    matched_tables: Vec<TableMatch>,
    /// Per-(world, system) userdata slot, distinct from the system's own
    /// registry-level userdata. Only valid once this entry exists, i.e.
    /// after the world has synced against the system's registration.
    per_world_userdata: Option<Box<dyn Any>>,
}

/// Borrow a component or system's userdata as `&mut dyn Any`, falling
/// back to a caller-supplied scratch unit value when none was
/// registered. `ptr` must come from a registry lookup made just before
/// the call and not retained past it.
fn userdata_ref<'a>(
    ptr: Option<*mut (dyn Any + Send + Sync)>,
    empty: &'a mut (),
) -> &'a mut (dyn Any + Send + Sync) {
    match ptr {
        Some(p) => unsafe { &mut *p },
        None => empty,
    }
}

pub struct World {
    registry: Rc<RefCell<Registry>>,
    version: u64,
    chunk_size: usize,
    entities: SlotMap<Entity, EntitySlot>,
    tables: Vec<Box<Table>>,
    system_runtime: Vec<SystemRuntime>,
    templates: Vec<Template>,
    deferred: DeferredQueue,
    current_update_table: Option<TableId>,
    is_dispatching: bool,
    update_mask: u64,
    free_chunks: Vec<Box<[u8]>>,
    userdata: Option<Box<dyn Any>>,
    known_system_count: usize,
    table_by_signature: AHashMap<Vec<ComponentId>, TableId>,
}

impl World {
    pub fn new(registry: &Rc<RefCell<Registry>>, options: WorldOptions) -> Self {
        let mut world = Self {
            registry: Rc::clone(registry),
            version: 0,
            chunk_size: options.table_chunk_size,
            entities: SlotMap::with_key(),
            tables: Vec::new(),
            system_runtime: Vec::new(),
            templates: Vec::new(),
            deferred: DeferredQueue::default(),
            current_update_table: None,
            is_dispatching: false,
            update_mask: 0,
            free_chunks: Vec::new(),
            userdata: None,
            known_system_count: 0,
            table_by_signature: AHashMap::default(),
        };
        world.sync();
        world
    }

    /// Resynchronize against the registry if it has registered anything
    /// new since the last call. Every other public method calls this
    /// first, so callers never need to invoke it directly.
    pub fn sync(&mut self) {
        let registry_version = self.registry.borrow().version();
        if self.version == registry_version {
            return;
        }
        debug!(old_version = self.version, new_version = registry_version, "resyncing world");

        {
            let registry = self.registry.borrow();
            for table in &mut self.tables {
                table.rebuild_component_callbacks(&registry);
            }
        }

        let system_count = self.registry.borrow().system_count();
        let mut preserved_userdata: Vec<Option<Box<dyn Any>>> =
            self.system_runtime.drain(..).map(|rt| rt.per_world_userdata).collect();
        preserved_userdata.resize_with(system_count, || None);
        self.system_runtime = preserved_userdata
            .into_iter()
            .map(|per_world_userdata| SystemRuntime { matched_tables: Vec::new(), per_world_userdata })
            .collect();

        for table_index in 0..self.tables.len() {
            let (matching_systems, matches) = {
                let table = &self.tables[table_index];
                self.compute_matches_for_table(table)
            };
            self.tables[table_index].matching_systems = matching_systems;
            for (system, signature_indices) in matches {
                self.system_runtime[system.index()]
                    .matched_tables
                    .push(TableMatch { table: TableId(table_index), signature_indices });
            }
        }

        self.version = registry_version;

        let old_system_count = self.known_system_count;
        self.known_system_count = system_count;
        for i in old_system_count..system_count {
            let system = SystemId::from_index(i);
            let f = self.registry.borrow().system(system).init_per_world_fn;
            if let Some(f) = f {
                self.invoke_system_world_fn(f, system);
            }
        }
    }

    fn compute_matches_for_table(&self, table: &Table) -> (Vec<SystemId>, Vec<(SystemId, Vec<usize>)>) {
        let registry = self.registry.borrow();
        let mut matching_systems = Vec::new();
        let mut matches = Vec::new();
        for (system, options) in registry.systems() {
            let mut match_bitset = Bitset::new();
            for &c in &options.match_components {
                match_bitset.set(c.index());
            }
            if table.bitset.is_superset_of(&match_bitset) {
                matching_systems.push(system);
                let signature_indices = options
                    .match_components
                    .iter()
                    .map(|&c| table.signature_index_of(c).expect("table bitset claims a component its signature lacks"))
                    .collect();
                matches.push((system, signature_indices));
            }
        }
        (matching_systems, matches)
    }

    fn get_or_create_table(&mut self, signature: Vec<ComponentId>) -> TableId {
        if let Some(&table_id) = self.table_by_signature.get(&signature) {
            return table_id;
        }

        let mut bitset = Bitset::new();
        let layout = {
            let registry = self.registry.borrow();
            let components: Vec<(usize, usize)> = signature
                .iter()
                .map(|&c| {
                    let opts = registry.component(c);
                    (opts.size, opts.alignment)
                })
                .collect();
            for &c in &signature {
                bitset.set(c.index());
            }
            layout_chunk(self.chunk_size, &components).unwrap_or_else(|e| panic!("{e}"))
        };

        let mut table = Table::new(signature, bitset, layout);
        {
            let registry = self.registry.borrow();
            table.rebuild_component_callbacks(&registry);
        }
        let (matching_systems, matches) = self.compute_matches_for_table(&table);
        table.matching_systems = matching_systems;

        let signature_key = table.signature.clone();
        self.tables.push(Box::new(table));
        let table_id = TableId(self.tables.len() - 1);
        self.table_by_signature.insert(signature_key, table_id);
        for (system, signature_indices) in matches {
            self.system_runtime[system.index()].matched_tables.push(TableMatch { table: table_id, signature_indices });
        }
        table_id
    }

    fn invoke_component_fn(
        &mut self,
        f: ComponentFn,
        component: ComponentId,
        table_id: TableId,
        position: u32,
        signature_index: usize,
        entity: Entity,
    ) {
        let (ptr, len) = self.tables[table_id.0].row_component_ptr(position, signature_index);
        let data: &mut [u8] = unsafe { std::slice::from_raw_parts_mut(ptr, len) };
        let userdata_ptr = self.registry.borrow().component_userdata_ptr(component);
        let mut empty = ();
        let userdata = userdata_ref(userdata_ptr, &mut empty);
        f(self, entity, data, userdata);
    }

    fn invoke_system_entity_fn(&mut self, f: SystemEntityFn, system: SystemId, entity: Entity) {
        let userdata_ptr = self.registry.borrow().system_userdata_ptr(system);
        let mut empty = ();
        let userdata = userdata_ref(userdata_ptr, &mut empty);
        f(self, entity, userdata);
    }

    fn invoke_system_world_fn(&mut self, f: SystemWorldFn, system: SystemId) {
        let userdata_ptr = self.registry.borrow().system_userdata_ptr(system);
        let mut empty = ();
        let userdata = userdata_ref(userdata_ptr, &mut empty);
        f(self, userdata);
    }

    fn run_component_init_hooks(&mut self, table_id: TableId, position: u32, entity: Entity) {
        let callbacks: SmallVec<[(usize, ComponentFn, ComponentId); 8]> = {
            let table = &self.tables[table_id.0];
            table
                .init_callbacks
                .iter()
                .map(|cb| (cb.signature_index, cb.f, table.signature[cb.signature_index]))
                .collect()
        };
        for (signature_index, f, component) in callbacks {
            self.invoke_component_fn(f, component, table_id, position, signature_index, entity);
        }
    }

    /// Cleanup callbacks fire in the reverse of the order their matching
    /// init callback fired, so this walks the same cached list tail-first.
    fn run_component_cleanup_hooks(&mut self, table_id: TableId, position: u32, entity: Entity) {
        let callbacks: SmallVec<[(usize, ComponentFn, ComponentId); 8]> = {
            let table = &self.tables[table_id.0];
            table
                .cleanup_callbacks
                .iter()
                .rev()
                .map(|cb| (cb.signature_index, cb.f, table.signature[cb.signature_index]))
                .collect()
        };
        for (signature_index, f, component) in callbacks {
            self.invoke_component_fn(f, component, table_id, position, signature_index, entity);
        }
    }

    /// `reverse` picks the init order (registration order, matching the
    /// cached `matching_systems` list as-is) or the cleanup order (its
    /// exact reverse), per the init/cleanup ordering contract.
    fn run_system_entity_hooks(
        &mut self,
        table_id: TableId,
        entity: Entity,
        reverse: bool,
        select: fn(&SystemOptions) -> Option<SystemEntityFn>,
    ) {
        let mut systems: SmallVec<[SystemId; 8]> = self.tables[table_id.0].matching_systems.iter().copied().collect();
        if reverse {
            systems.reverse();
        }
        for system in systems {
            let f = select(self.registry.borrow().system(system));
            if let Some(f) = f {
                self.invoke_system_entity_fn(f, system, entity);
            }
        }
    }

    /// Create an entity whose initial signature is exactly the set of
    /// components named in `components`. Components with `data: None`
    /// start zeroed until an `init_fn` (if registered) runs.
    pub fn create_entity(&mut self, components: &[ComponentInit<'_>]) -> Entity {
        self.sync();
        let mut signature: Vec<ComponentId> = components.iter().map(|c| c.component).collect();
        signature.sort_unstable();
        signature.dedup();
        let table_id = self.get_or_create_table(signature);

        let entity = self.entities.insert(EntitySlot { table: table_id, position_in_table: 0 });
        let position = self.tables[table_id.0].allocate_row(entity, &mut self.free_chunks);
        self.entities[entity].position_in_table = position;

        for init in components {
            if let Some(bytes) = init.data {
                let idx = self.tables[table_id.0]
                    .signature_index_of(init.component)
                    .expect("component not part of the entity's computed signature");
                self.tables[table_id.0].write_row_component(position, idx, bytes);
            }
        }

        self.run_component_init_hooks(table_id, position, entity);
        self.run_system_entity_hooks(table_id, entity, false, |o| o.init_per_entity_fn);

        trace!(table = table_id.0, position, "created entity");
        entity
    }

    /// Create an entity from a registered template. `overrides` substitutes
    /// the initial bytes for any component already covered by the
    /// template's signature, matched by component index; an override for a
    /// component outside the template's table is ignored, since a
    /// template-spawned entity always lands in the template's cached table.
    pub fn create_entity_from_template(&mut self, template: TemplateId, overrides: &[ComponentInit<'_>]) -> Entity {
        self.sync();
        let (table_id, mut init) = {
            let t = &self.templates[template.index()];
            (t.table, t.init.clone())
        };

        for over in overrides {
            let Some(bytes) = over.data else { continue };
            if let Some(entry) = init.iter_mut().find(|(c, _)| *c == over.component) {
                entry.1 = bytes.to_vec();
            } else if self.tables[table_id.0].signature_index_of(over.component).is_some() {
                init.push((over.component, bytes.to_vec()));
            }
        }

        let entity = self.entities.insert(EntitySlot { table: table_id, position_in_table: 0 });
        let position = self.tables[table_id.0].allocate_row(entity, &mut self.free_chunks);
        self.entities[entity].position_in_table = position;

        for (component, bytes) in &init {
            if let Some(idx) = self.tables[table_id.0].signature_index_of(*component) {
                self.tables[table_id.0].write_row_component(position, idx, bytes);
            }
        }

        self.run_component_init_hooks(table_id, position, entity);
        self.run_system_entity_hooks(table_id, entity, false, |o| o.init_per_entity_fn);
        entity
    }

    /// Register a template. A null `handle` appends and mints a fresh
    /// handle; a nonzero `handle` overwrites the template already at that
    /// handle in place, dropping its previously owned init blobs.
    pub fn register_template(&mut self, handle: TemplateId, components: &[ComponentInit<'_>]) -> TemplateId {
        self.sync();
        let mut signature: Vec<ComponentId> = components.iter().map(|c| c.component).collect();
        signature.sort_unstable();
        signature.dedup();
        let table = self.get_or_create_table(signature);
        let init = components.iter().filter_map(|c| c.data.map(|bytes| (c.component, bytes.to_vec()))).collect();
        if handle.is_null() {
            self.templates.push(Template { table, init });
            TemplateId::from_index(self.templates.len() - 1)
        } else {
            self.templates[handle.index()] = Template { table, init };
            handle
        }
    }

    /// Destroy `entity`. A stale or never-issued handle is a silent
    /// no-op. If `entity` lives in the table the current system call is
    /// iterating, the destruction is deferred until that table's chunks
    /// finish.
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.sync();
        let slot = match self.entities.get(entity) {
            Some(&s) => s,
            None => return,
        };
        if self.current_update_table == Some(slot.table) {
            self.deferred.push_destroy(entity);
            return;
        }
        self.destroy_entity_now(entity);
    }

    fn destroy_entity_now(&mut self, entity: Entity) {
        let slot = match self.entities.get(entity) {
            Some(&s) => s,
            None => return,
        };

        self.run_system_entity_hooks(slot.table, entity, true, |o| o.cleanup_per_entity_fn);
        self.run_component_cleanup_hooks(slot.table, slot.position_in_table, entity);

        if let Some(moved) = self.tables[slot.table.0].remove_row(slot.position_in_table, &mut self.free_chunks) {
            self.entities[moved].position_in_table = slot.position_in_table;
        }
        self.entities.remove(entity);
        trace!(table = slot.table.0, "destroyed entity");
    }

    /// Add and/or remove components on a live entity, moving it to the
    /// table for its resulting signature. A no-op (stale handle) or an
    /// idempotent call (the resulting signature equals the current one)
    /// fires no hooks at all. Deferred the same way as `destroy_entity`
    /// when `entity`'s current table is mid-dispatch.
    pub fn morph_entity(&mut self, entity: Entity, add: &[ComponentInit<'_>], remove: &[ComponentId]) {
        self.sync();
        let slot = match self.entities.get(entity) {
            Some(&s) => s,
            None => return,
        };
        if self.current_update_table == Some(slot.table) {
            let owned_add = add.iter().map(|c| (c.component, c.data.map(|b| b.to_vec()))).collect();
            self.deferred.push_morph(entity, owned_add, remove.to_vec());
            return;
        }
        let add_refs: Vec<(ComponentId, Option<&[u8]>)> = add.iter().map(|c| (c.component, c.data)).collect();
        self.morph_entity_now(entity, &add_refs, remove);
    }

    fn morph_entity_now(&mut self, entity: Entity, add: &[(ComponentId, Option<&[u8]>)], remove: &[ComponentId]) {
        let old_slot = match self.entities.get(entity) {
            Some(&s) => s,
            None => return,
        };
        let old_table = old_slot.table;
        let old_signature = self.tables[old_table.0].signature.clone();

        let mut new_signature = old_signature.clone();
        for &(c, _) in add {
            if !new_signature.contains(&c) {
                new_signature.push(c);
            }
        }
        new_signature.retain(|c| !remove.contains(c));
        new_signature.sort_unstable();
        new_signature.dedup();

        if new_signature == old_signature {
            return;
        }

        let new_table_id = self.get_or_create_table(new_signature.clone());

        let old_matching = self.tables[old_table.0].matching_systems.clone();
        let new_matching = self.tables[new_table_id.0].matching_systems.clone();

        for &system in old_matching.iter().rev().filter(|s| !new_matching.contains(s)) {
            let f = self.registry.borrow().system(system).cleanup_per_entity_fn;
            if let Some(f) = f {
                self.invoke_system_entity_fn(f, system, entity);
            }
        }

        for &component in old_signature.iter().rev() {
            if !new_signature.contains(&component) {
                let idx = self.tables[old_table.0].signature_index_of(component).unwrap();
                let cleanup_fn = self.registry.borrow().component_fns(component).1;
                if let Some(f) = cleanup_fn {
                    self.invoke_component_fn(f, component, old_table, old_slot.position_in_table, idx, entity);
                }
            }
        }

        let position = self.tables[new_table_id.0].allocate_row(entity, &mut self.free_chunks);
        for &component in &new_signature {
            if old_signature.contains(&component) && !remove.contains(&component) {
                let old_idx = self.tables[old_table.0].signature_index_of(component).unwrap();
                let bytes = self.tables[old_table.0].read_row_component(old_slot.position_in_table, old_idx).to_vec();
                let new_idx = self.tables[new_table_id.0].signature_index_of(component).unwrap();
                self.tables[new_table_id.0].write_row_component(position, new_idx, &bytes);
            }
        }
        for &(component, data) in add {
            // Already present and retained: the copy loop above already put
            // the live value in place, so a caller-supplied blob is ignored.
            if old_signature.contains(&component) {
                continue;
            }
            if let Some(bytes) = data {
                if let Some(new_idx) = self.tables[new_table_id.0].signature_index_of(component) {
                    self.tables[new_table_id.0].write_row_component(position, new_idx, bytes);
                }
            }
        }

        if let Some(moved) = self.tables[old_table.0].remove_row(old_slot.position_in_table, &mut self.free_chunks) {
            self.entities[moved].position_in_table = old_slot.position_in_table;
        }
        self.entities[entity] = EntitySlot { table: new_table_id, position_in_table: position };

        for &(component, _) in add {
            if old_signature.contains(&component) {
                continue;
            }
            if let Some(idx) = self.tables[new_table_id.0].signature_index_of(component) {
                let init_fn = self.registry.borrow().component_fns(component).0;
                if let Some(f) = init_fn {
                    self.invoke_component_fn(f, component, new_table_id, position, idx, entity);
                }
            }
        }

        for &system in new_matching.iter().filter(|s| !old_matching.contains(s)) {
            let f = self.registry.borrow().system(system).init_per_entity_fn;
            if let Some(f) = f {
                self.invoke_system_entity_fn(f, system, entity);
            }
        }

        trace!(from = old_table.0, to = new_table_id.0, "morphed entity");
    }

    fn morph_entity_now_from_owned(&mut self, entity: Entity, add: Vec<(ComponentId, Option<Vec<u8>>)>, remove: Vec<ComponentId>) {
        let add_refs: Vec<(ComponentId, Option<&[u8]>)> = add.iter().map(|(c, b)| (*c, b.as_deref())).collect();
        self.morph_entity_now(entity, &add_refs, &remove);
    }

    fn drain_deferred(&mut self) {
        for op in self.deferred.drain() {
            match op {
                DeferredOp::Destroy { entity } => self.destroy_entity_now(entity),
                DeferredOp::Morph { entity, add, remove } => self.morph_entity_now_from_owned(entity, add, remove),
            }
        }
    }

    pub fn is_valid_entity(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn get_component_in_entity(&self, entity: Entity, component: ComponentId) -> Option<&[u8]> {
        let slot = self.entities.get(entity)?;
        let table = &self.tables[slot.table.0];
        let idx = table.signature_index_of(component)?;
        Some(table.read_row_component(slot.position_in_table, idx))
    }

    pub fn get_component_in_entity_mut(&mut self, entity: Entity, component: ComponentId) -> Option<&mut [u8]> {
        let slot = *self.entities.get(entity)?;
        let table = &mut self.tables[slot.table.0];
        let idx = table.signature_index_of(component)?;
        Some(table.read_row_component_mut(slot.position_in_table, idx))
    }

    pub fn get_current_update_mask(&self) -> u64 {
        self.update_mask
    }

    pub fn userdata(&self) -> Option<&(dyn Any)> {
        self.userdata.as_deref()
    }

    pub fn userdata_mut(&mut self) -> Option<&mut (dyn Any)> {
        self.userdata.as_deref_mut()
    }

    pub fn set_userdata(&mut self, userdata: Box<dyn Any>) {
        self.userdata = Some(userdata);
    }

    /// Store a userdata value scoped to this world and `system`, separate
    /// from the system's own registry-level userdata. Panics if called
    /// before this world has synced against `system`'s registration. Unlike
    /// the rest of this file's public surface, this deliberately does not
    /// call `sync()` itself first — the fatal assertion on a stale system
    /// index is the documented behavior, not a convenience gap.
    pub fn set_per_world_userdata(&mut self, system: SystemId, userdata: Box<dyn Any>) {
        assert!(
            system.index() < self.system_runtime.len(),
            "set_per_world_userdata called before the owning world has synced"
        );
        self.system_runtime[system.index()].per_world_userdata = Some(userdata);
    }

    /// Read back the value stored by `set_per_world_userdata` for `system`
    /// in this world, or `None` if none was set. Panics if called before
    /// this world has synced against `system`'s registration.
    pub fn get_per_world_userdata(&self, system: SystemId) -> Option<&dyn Any> {
        assert!(
            system.index() < self.system_runtime.len(),
            "get_per_world_userdata called before the owning world has synced"
        );
        self.system_runtime[system.index()].per_world_userdata.as_deref()
    }

    /// Run every registered system whose `update_mask` overlaps
    /// `update_mask`, in registration order. Panics if called while
    /// already inside a `run_systems`/`run_system` call.
    pub fn run_systems(&mut self, update_mask: u64) {
        self.sync();
        assert!(!self.is_dispatching, "run_systems called while systems are already dispatching");
        self.is_dispatching = true;
        self.update_mask = update_mask;

        let system_count = self.registry.borrow().system_count();
        for i in 0..system_count {
            let system = SystemId::from_index(i);
            let mask = self.registry.borrow().system(system).update_mask;
            // A system runs when its own update_mask is a subset of the
            // call's mask: every bit it declared must be present in this
            // call, not merely some bit in common.
            if mask & update_mask == mask {
                self.dispatch_system(system);
            }
        }

        self.is_dispatching = false;
    }

    /// Run exactly one system, ignoring its `update_mask`. Panics if
    /// called while already inside a `run_systems`/`run_system` call.
    pub fn run_system(&mut self, system: SystemId) {
        self.sync();
        assert!(!self.is_dispatching, "run_system called while systems are already dispatching");
        self.is_dispatching = true;
        self.dispatch_system(system);
        self.is_dispatching = false;
    }

    fn dispatch_system(&mut self, system: SystemId) {
        let pre_fn = self.registry.borrow().system(system).pre_update_fn;
        if let Some(f) = pre_fn {
            self.invoke_system_world_fn(f, system);
        }

        let matched_tables: Vec<(TableId, Vec<usize>)> = self.system_runtime[system.index()]
            .matched_tables
            .iter()
            .map(|m| (m.table, m.signature_indices.clone()))
            .collect();

        let update_fn = self.registry.borrow().system(system).update_fn;
        if let Some(f) = update_fn {
            for (table_id, signature_indices) in matched_tables {
                self.current_update_table = Some(table_id);
                let chunk_count = self.tables[table_id.0].chunk_count();
                for chunk_index in 0..chunk_count {
                    let len = self.tables[table_id.0].chunk_len(chunk_index);
                    if len == 0 {
                        continue;
                    }
                    let entities_ptr = self.tables[table_id.0].entities_ptr(chunk_index);
                    let mut columns = SmallVec::new();
                    let mut sizes = SmallVec::new();
                    for &signature_index in &signature_indices {
                        columns.push(self.tables[table_id.0].column_ptr_mut(chunk_index, signature_index));
                        sizes.push(self.tables[table_id.0].component_size(signature_index));
                    }
                    let batch = Batch::new(entities_ptr, len, columns, sizes);

                    let userdata_ptr = self.registry.borrow().system_userdata_ptr(system);
                    let mut empty = ();
                    let userdata = userdata_ref(userdata_ptr, &mut empty);
                    f(self, batch, userdata);
                }
                self.drain_deferred();
                self.current_update_table = None;
            }
        }

        let post_fn = self.registry.borrow().system(system).post_update_fn;
        if let Some(f) = post_fn {
            self.invoke_system_world_fn(f, system);
        }
    }
}

impl Drop for World {
    /// Fires every system's `cleanup_per_world_fn` whose `init_per_world_fn`
    /// ran against this world, in the reverse of registration order,
    /// mirroring `destroy_world`'s contract.
    fn drop(&mut self) {
        for i in (0..self.known_system_count).rev() {
            let system = SystemId::from_index(i);
            let f = self.registry.borrow().system(system).cleanup_per_world_fn;
            if let Some(f) = f {
                self.invoke_system_world_fn(f, system);
            }
        }
    }
}

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

//! Archetype tables: chunked columnar storage for one signature.
//!
//! A table owns a sequence of fixed-size chunks. Each chunk lays its
//! components out structure-of-arrays style: every component gets its
//! own contiguous run of `entities_per_chunk` elements, so a system
//! reading one component across a whole chunk walks a flat array rather
//! than striding through interleaved rows. [`layout_chunk`] computes the
//! per-chunk capacity and each component's column offset once, when the
//! table is created. Rows stay packed: removing one swaps the table's
//! last row into the freed slot, exactly like `Vec::swap_remove`, just
//! column-by-column and potentially across a chunk boundary.

use crate::bitset::Bitset;
use crate::component::{ComponentFn, ComponentId};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::registry::Registry;
use crate::system::SystemId;
use crate::utils::align_to;

/// Index into a [`crate::world::World`]'s table vector. Tables are never
/// removed once created, so this stays valid for the world's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub(crate) usize);

/// Byte layout of one chunk, shared by every chunk in a table.
#[derive(Debug, Clone)]
pub struct ChunkLayout {
    /// Rows that fit in one chunk.
    pub entities_per_chunk: usize,
    /// Per-signature-slot byte offset of that component's column within
    /// a chunk, same order as the table's `signature`.
    pub offsets: Vec<usize>,
    /// Per-signature-slot component size, same order as `signature`.
    pub sizes: Vec<usize>,
    /// Bytes used by the chunk once every column is placed.
    pub bytes_used: usize,
}

/// Cap used for tables whose signature carries no component storage at
/// all (pure tag archetypes) — there is no layout to overflow, so pick a
/// generous, fixed batch size instead of deriving one from row size.
const TAG_ONLY_CHUNK_CAPACITY: usize = 4096;

/// Compute a chunk's column layout for a signature whose `(size,
/// alignment)` pairs are given in canonical (signature) order.
///
/// Because every Rust/C-ABI type's size is already a multiple of its own
/// alignment, a column only needs its *starting* offset aligned — every
/// later element in that column falls on an aligned address for free.
/// Columns are placed in descending-alignment order to avoid wasting
/// space on start-of-column padding; `entities_per_chunk` is the largest
/// capacity for which every column still fits in `chunk_size`, found by
/// starting from the size-only upper bound and backing off until the
/// real, alignment-padded footprint fits.
pub fn layout_chunk(chunk_size: usize, components: &[(usize, usize)]) -> Result<ChunkLayout> {
    let n = components.len();
    if n == 0 {
        return Ok(ChunkLayout {
            entities_per_chunk: TAG_ONLY_CHUNK_CAPACITY,
            offsets: Vec::new(),
            sizes: Vec::new(),
            bytes_used: 0,
        });
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| components[b].1.cmp(&components[a].1));

    let row_size: usize = components.iter().map(|&(size, _)| size).sum();
    let mut capacity = chunk_size / row_size.max(1);

    loop {
        if capacity == 0 {
            return Err(EcsError::LayoutOverflow { chunk_size, row_size });
        }
        let mut offsets = vec![0usize; n];
        let mut cursor = 0usize;
        for &i in &order {
            let (size, alignment) = components[i];
            cursor = align_to(cursor, alignment.max(1));
            offsets[i] = cursor;
            cursor += size * capacity;
        }
        if cursor <= chunk_size {
            let sizes = components.iter().map(|&(size, _)| size).collect();
            return Ok(ChunkLayout { entities_per_chunk: capacity, offsets, sizes, bytes_used: cursor });
        }
        capacity -= 1;
    }
}

struct Chunk {
    entities: Vec<Entity>,
    data: Box<[u8]>,
}

/// A cached component init/cleanup hook, resolved once per sync and
/// carried by the table so dispatch never re-scans the registry.
pub(crate) struct ComponentCallback {
    pub signature_index: usize,
    pub f: ComponentFn,
}

/// Columnar storage for every entity sharing one exact signature.
pub struct Table {
    pub signature: Vec<ComponentId>,
    pub bitset: Bitset,
    layout: ChunkLayout,
    chunks: Vec<Chunk>,
    pub num_entities: usize,
    pub(crate) init_callbacks: Vec<ComponentCallback>,
    pub(crate) cleanup_callbacks: Vec<ComponentCallback>,
    /// Systems whose match set this table's bitset satisfies, cached at
    /// the last sync. Drives per-entity init/cleanup hook dispatch on
    /// create/destroy/morph without re-scanning the registry.
    pub(crate) matching_systems: Vec<SystemId>,
}

impl Table {
    pub fn new(signature: Vec<ComponentId>, bitset: Bitset, layout: ChunkLayout) -> Self {
        Self {
            signature,
            bitset,
            layout,
            chunks: Vec::new(),
            num_entities: 0,
            init_callbacks: Vec::new(),
            cleanup_callbacks: Vec::new(),
            matching_systems: Vec::new(),
        }
    }

    /// Rebuild this table's component init/cleanup callback cache from
    /// the registry's current descriptors. Called once per table during
    /// [`crate::world::World::sync`]; does not touch `matching_systems`,
    /// which the world rebuilds itself since it requires the full system
    /// list.
    pub(crate) fn rebuild_component_callbacks(&mut self, registry: &Registry) {
        self.init_callbacks.clear();
        self.cleanup_callbacks.clear();
        for (i, &component) in self.signature.iter().enumerate() {
            let (init_fn, cleanup_fn) = registry.component_fns(component);
            if let Some(f) = init_fn {
                self.init_callbacks.push(ComponentCallback { signature_index: i, f });
            }
            if let Some(f) = cleanup_fn {
                self.cleanup_callbacks.push(ComponentCallback { signature_index: i, f });
            }
        }
    }

    pub fn chunk_capacity(&self) -> usize {
        self.layout.entities_per_chunk
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_len(&self, chunk_index: usize) -> usize {
        self.chunks[chunk_index].entities.len()
    }

    pub fn signature_index_of(&self, component: ComponentId) -> Option<usize> {
        self.signature.iter().position(|&c| c == component)
    }

    fn ensure_chunk(&mut self, index: usize, free_chunks: &mut Vec<Box<[u8]>>) {
        while self.chunks.len() <= index {
            let needed = self.layout.bytes_used;
            let data = free_chunks
                .pop()
                .filter(|c| c.len() == needed)
                .unwrap_or_else(|| vec![0u8; needed].into_boxed_slice());
            self.chunks.push(Chunk {
                entities: Vec::with_capacity(self.layout.entities_per_chunk),
                data,
            });
        }
    }

    /// Append a new row for `entity`, returning its flat position within
    /// the table (`position / chunk_capacity` is the chunk index).
    pub fn allocate_row(&mut self, entity: Entity, free_chunks: &mut Vec<Box<[u8]>>) -> u32 {
        let position = self.num_entities;
        let chunk_index = position / self.layout.entities_per_chunk;
        self.ensure_chunk(chunk_index, free_chunks);
        self.chunks[chunk_index].entities.push(entity);
        self.num_entities += 1;
        position as u32
    }

    /// Swap-remove the row at `position`. Returns the entity that used
    /// to occupy the table's last row and now lives at `position`, or
    /// `None` if the removed row already was the last one.
    pub fn remove_row(&mut self, position: u32, free_chunks: &mut Vec<Box<[u8]>>) -> Option<Entity> {
        let capacity = self.layout.entities_per_chunk;
        let position = position as usize;
        let last = self.num_entities - 1;
        let (last_chunk, last_row) = (last / capacity, last % capacity);

        let moved = if position != last {
            let (dst_chunk, dst_row) = (position / capacity, position % capacity);
            for signature_index in 0..self.signature.len() {
                let size = self.layout.sizes[signature_index];
                if size == 0 {
                    continue;
                }
                let col_offset = self.layout.offsets[signature_index];
                let src_off = col_offset + last_row * size;
                let dst_off = col_offset + dst_row * size;
                if dst_chunk == last_chunk {
                    self.chunks[dst_chunk].data.copy_within(src_off..src_off + size, dst_off);
                } else {
                    let (lo, hi) = self.chunks.split_at_mut(last_chunk);
                    let src = hi[0].data[src_off..src_off + size].to_vec();
                    lo[dst_chunk].data[dst_off..dst_off + size].copy_from_slice(&src);
                }
            }
            let moved_entity = self.chunks[last_chunk].entities[last_row];
            self.chunks[dst_chunk].entities[dst_row] = moved_entity;
            Some(moved_entity)
        } else {
            None
        };

        self.chunks[last_chunk].entities.pop();
        self.num_entities -= 1;
        if last_chunk == self.chunks.len() - 1 && self.chunks[last_chunk].entities.is_empty() {
            let chunk = self.chunks.pop().unwrap();
            free_chunks.push(chunk.data);
        }
        moved
    }

    pub fn entity_at(&self, chunk_index: usize, row: usize) -> Entity {
        self.chunks[chunk_index].entities[row]
    }

    /// Base pointer of `signature_index`'s column within chunk
    /// `chunk_index`; the row-`r` element sits at `base + r * size`.
    pub fn column_ptr(&self, chunk_index: usize, signature_index: usize) -> *const u8 {
        let offset = self.layout.offsets[signature_index];
        unsafe { self.chunks[chunk_index].data.as_ptr().add(offset) }
    }

    pub fn column_ptr_mut(&mut self, chunk_index: usize, signature_index: usize) -> *mut u8 {
        let offset = self.layout.offsets[signature_index];
        unsafe { self.chunks[chunk_index].data.as_mut_ptr().add(offset) }
    }

    pub fn component_size(&self, signature_index: usize) -> usize {
        self.layout.sizes[signature_index]
    }

    /// Copy `bytes` into the row at `position`'s column for
    /// `signature_index`. `bytes.len()` must equal the registered
    /// component size.
    pub fn write_row_component(&mut self, position: u32, signature_index: usize, bytes: &[u8]) {
        let capacity = self.layout.entities_per_chunk;
        let position = position as usize;
        let (chunk_index, row) = (position / capacity, position % capacity);
        let size = self.layout.sizes[signature_index];
        debug_assert_eq!(bytes.len(), size);
        let offset = self.layout.offsets[signature_index] + row * size;
        self.chunks[chunk_index].data[offset..offset + size].copy_from_slice(bytes);
    }

    pub fn read_row_component(&self, position: u32, signature_index: usize) -> &[u8] {
        let capacity = self.layout.entities_per_chunk;
        let position = position as usize;
        let (chunk_index, row) = (position / capacity, position % capacity);
        let size = self.layout.sizes[signature_index];
        let offset = self.layout.offsets[signature_index] + row * size;
        &self.chunks[chunk_index].data[offset..offset + size]
    }

    pub fn read_row_component_mut(&mut self, position: u32, signature_index: usize) -> &mut [u8] {
        let capacity = self.layout.entities_per_chunk;
        let position = position as usize;
        let (chunk_index, row) = (position / capacity, position % capacity);
        let size = self.layout.sizes[signature_index];
        let offset = self.layout.offsets[signature_index] + row * size;
        &mut self.chunks[chunk_index].data[offset..offset + size]
    }

    pub fn entities_ptr(&self, chunk_index: usize) -> *const Entity {
        self.chunks[chunk_index].entities.as_ptr()
    }

    /// Raw pointer + length for the bytes backing `position`'s
    /// `signature_index` column entry. Used by the world when it must
    /// hand a callback `&mut [u8]` while `&mut World` is also live for
    /// that same call — see `Batch`'s doc comment for why this is sound.
    pub(crate) fn row_component_ptr(&mut self, position: u32, signature_index: usize) -> (*mut u8, usize) {
        let capacity = self.layout.entities_per_chunk;
        let position = position as usize;
        let (chunk_index, row) = (position / capacity, position % capacity);
        let size = self.layout.sizes[signature_index];
        let offset = self.layout.offsets[signature_index] + row * size;
        let ptr = unsafe { self.chunks[chunk_index].data.as_mut_ptr().add(offset) };
        (ptr, size)
    }
}

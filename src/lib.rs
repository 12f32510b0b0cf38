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

//! Archetype-based entity component system runtime.
//!
//! Entities are opaque generational handles; components are plain byte
//! layouts registered once and thereafter referenced by integer handle;
//! systems are callbacks that run once per matching chunk of storage.
//! A [`registry::Registry`] holds every registered component and system
//! descriptor and can be shared by any number of [`world::World`]s, each
//! with its own entities and table storage.

mod bitset;
pub mod archetype;
pub mod component;
mod deferred;
pub mod entity;
pub mod error;
pub mod registry;
pub mod system;
pub mod template;
pub mod world;
mod utils;

pub use component::{ComponentFn, ComponentId, ComponentInit, ComponentOptions};
pub use entity::Entity;
pub use error::{EcsError, Result};
pub use registry::{Registry, RegistryOptions};
pub use system::{Batch, SystemEntityFn, SystemId, SystemOptions, SystemUpdateFn, SystemWorldFn};
pub use template::TemplateId;
pub use world::{World, WorldOptions};

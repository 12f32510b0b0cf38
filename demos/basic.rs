//! Basic usage: register components and a system, then spawn, update, and
//! destroy entities.

use std::cell::RefCell;
use std::rc::Rc;

use archetype_core::{
    Batch, ComponentId, ComponentInit, ComponentOptions, Registry, RegistryOptions, SystemId,
    SystemOptions, World, WorldOptions,
};

struct Position {
    x: f32,
    y: f32,
}

struct Velocity {
    x: f32,
    y: f32,
}

fn integrate(_world: &mut World, batch: Batch<'_>, _userdata: &mut (dyn std::any::Any + Send + Sync)) {
    for row in 0..batch.len() {
        unsafe {
            let pos = &mut *(batch.column(0).add(row * batch.component_size(0)) as *mut Position);
            let vel = &*(batch.column(1).add(row * batch.component_size(1)) as *const Velocity);
            pos.x += vel.x;
            pos.y += vel.y;
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let registry = Rc::new(RefCell::new(Registry::new(RegistryOptions::default())));
    let position: ComponentId;
    let velocity: ComponentId;
    {
        let mut registry = registry.borrow_mut();
        position = registry.register_component(ComponentId::NULL, ComponentOptions::of::<Position>());
        velocity = registry.register_component(ComponentId::NULL, ComponentOptions::of::<Velocity>());
        registry.register_system(SystemId::NULL, SystemOptions::new(vec![position, velocity]).with_update_fn(integrate),
        );
    }

    let mut world = World::new(&registry, WorldOptions::default());

    let p0 = Position { x: 0.0, y: 0.0 };
    let v0 = Velocity { x: 1.0, y: 0.5 };
    let moving = world.create_entity(&[ComponentInit::of(position, &p0), ComponentInit::of(velocity, &v0)]);

    let p1 = Position { x: 5.0, y: 5.0 };
    let still = world.create_entity(&[ComponentInit::of(position, &p1)]);

    world.run_systems(u64::MAX);

    let moved_pos = world.get_component_in_entity(moving, position).unwrap();
    let moved_pos = unsafe { &*(moved_pos.as_ptr() as *const Position) };
    println!("moving entity is now at ({}, {})", moved_pos.x, moved_pos.y);

    world.destroy_entity(still);
    assert!(!world.is_valid_entity(still));
}

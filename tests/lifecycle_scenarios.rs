//! Black-box scenarios against the public `World`/`Registry` API: per-world
//! and per-entity hook ordering, the component accessor, deferred destroy
//! during iteration, and morph across archetypes.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use archetype_core::{
    Batch, ComponentId, ComponentInit, ComponentOptions, Entity, Registry, RegistryOptions,
    SystemId, SystemOptions, World, WorldOptions,
};

fn registry_and_a() -> (Rc<RefCell<Registry>>, ComponentId) {
    let registry = Rc::new(RefCell::new(Registry::new(RegistryOptions::default())));
    let a = registry.borrow_mut().register_component(ComponentId::NULL, ComponentOptions::new(4, 4));
    (registry, a)
}

// Per-world lifecycle hooks fire exactly once, on the right side.
#[test]
fn per_world_hooks_fire_once_on_their_own_side() {
    static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
    static CLEANUP_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn init_only(_world: &mut World, _userdata: &mut (dyn Any + Send + Sync)) {
        INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    }
    fn cleanup_only(_world: &mut World, _userdata: &mut (dyn Any + Send + Sync)) {
        CLEANUP_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let registry = Rc::new(RefCell::new(Registry::new(RegistryOptions::default())));
    registry.borrow_mut().register_component(ComponentId::NULL, ComponentOptions::new(4, 4));
    registry
        .borrow_mut()
        .register_system(SystemId::NULL, SystemOptions::new(vec![]).with_init_per_world_fn(init_only));
    registry
        .borrow_mut()
        .register_system(SystemId::NULL, SystemOptions::new(vec![]).with_cleanup_per_world_fn(cleanup_only));

    // A world fires every system's `init_per_world_fn` as it first syncs
    // against the registry, and every system's `cleanup_per_world_fn` when
    // it is dropped.
    let world = World::new(&registry, WorldOptions::default());
    assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(CLEANUP_CALLS.load(Ordering::SeqCst), 0);

    drop(world);
    assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(CLEANUP_CALLS.load(Ordering::SeqCst), 1);
}

// A system registered after the world already exists still gets its
// per-world init the next time the world syncs, and its cleanup when the
// world is dropped.
#[test]
fn late_registered_system_gets_init_and_cleanup_exactly_once() {
    static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
    static CLEANUP_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn on_init(_world: &mut World, _userdata: &mut (dyn Any + Send + Sync)) {
        INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    }
    fn on_cleanup(_world: &mut World, _userdata: &mut (dyn Any + Send + Sync)) {
        CLEANUP_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let registry = Rc::new(RefCell::new(Registry::new(RegistryOptions::default())));
    let mut world = World::new(&registry, WorldOptions::default());

    registry.borrow_mut().register_system(SystemId::NULL, SystemOptions::new(vec![])
            .with_init_per_world_fn(on_init)
            .with_cleanup_per_world_fn(on_cleanup),
    );
    world.sync();
    assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 1);

    drop(world);
    assert_eq!(CLEANUP_CALLS.load(Ordering::SeqCst), 1);
}

// Per-entity hooks fire for every entity matching the system, on
// create and on destroy, independent of run_systems.
#[test]
fn per_entity_hooks_fire_on_create_and_destroy() {
    thread_local! {
        static SEEN_INIT: RefCell<Vec<Entity>> = RefCell::new(Vec::new());
        static SEEN_CLEANUP: RefCell<Vec<Entity>> = RefCell::new(Vec::new());
    }

    fn on_init(_world: &mut World, entity: Entity, _userdata: &mut (dyn Any + Send + Sync)) {
        SEEN_INIT.with(|v| v.borrow_mut().push(entity));
    }
    fn on_cleanup(_world: &mut World, entity: Entity, _userdata: &mut (dyn Any + Send + Sync)) {
        SEEN_CLEANUP.with(|v| v.borrow_mut().push(entity));
    }

    let (registry, a) = registry_and_a();
    let b = registry.borrow_mut().register_component(ComponentId::NULL, ComponentOptions::new(4, 4));
    let c = registry.borrow_mut().register_component(ComponentId::NULL, ComponentOptions::new(4, 4));
    registry.borrow_mut().register_system(SystemId::NULL, SystemOptions::new(vec![a])
            .with_init_per_entity_fn(on_init)
            .with_cleanup_per_entity_fn(on_cleanup),
    );

    let mut world = World::new(&registry, WorldOptions::default());
    let e1 = world.create_entity(&[ComponentInit::empty(a)]);
    let e2 = world.create_entity(&[ComponentInit::empty(a), ComponentInit::empty(b), ComponentInit::empty(c)]);

    world.destroy_entity(e1);
    world.destroy_entity(e2);

    SEEN_INIT.with(|v| {
        let seen = v.borrow();
        assert!(seen.contains(&e1));
        assert!(seen.contains(&e2));
    });
    SEEN_CLEANUP.with(|v| {
        let seen = v.borrow();
        assert!(seen.contains(&e1));
        assert!(seen.contains(&e2));
    });
}

// The component accessor reads back the right bytes, and goes away with
// the entity.
#[test]
fn component_accessor_reads_value_and_disappears_with_entity() {
    let registry = Rc::new(RefCell::new(Registry::new(RegistryOptions::default())));
    let a = registry.borrow_mut().register_component(ComponentId::NULL, ComponentOptions::of::<f32>());
    let mut world = World::new(&registry, WorldOptions::default());

    let value = 3.14f32;
    let entity = world.create_entity(&[ComponentInit::of(a, &value)]);

    let bytes = world.get_component_in_entity(entity, a).unwrap();
    assert_eq!(f32::from_ne_bytes(bytes.try_into().unwrap()), 3.14);

    world.destroy_entity(entity);
    assert!(world.get_component_in_entity(entity, a).is_none());
    assert!(!world.is_valid_entity(entity));
}

// A system that destroys every entity it iterates empties the table
// without corrupting later rows in the same chunk.
#[test]
fn deferred_destroy_during_iteration_empties_the_table() {
    fn destroy_everyone(world: &mut World, batch: Batch<'_>, _userdata: &mut (dyn Any + Send + Sync)) {
        for row in 0..batch.len() {
            let entity = batch.entity(row);
            world.destroy_entity(entity);
        }
    }

    let (registry, a) = registry_and_a();
    let sys = registry
        .borrow_mut()
        .register_system(SystemId::NULL, SystemOptions::new(vec![a]).with_update_fn(destroy_everyone));
    let mut world = World::new(&registry, WorldOptions::default());

    let mut entities = Vec::new();
    for _ in 0..1000 {
        entities.push(world.create_entity(&[ComponentInit::empty(a)]));
    }

    world.run_system(sys);

    for e in entities {
        assert!(!world.is_valid_entity(e));
    }
}

// Morph moves an entity to a new table, keeps old values, zero-inits
// the new component, and updates system matches.
#[test]
fn morph_preserves_old_values_and_updates_system_matches() {
    let (registry, a) = registry_and_a();
    let b = registry.borrow_mut().register_component(ComponentId::NULL, ComponentOptions::of::<f32>());
    let sys_ab = registry.borrow_mut().register_system(SystemId::NULL, SystemOptions::new(vec![a, b]));
    let mut world = World::new(&registry, WorldOptions::default());

    let value = 7i32;
    let entity = world.create_entity(&[ComponentInit::of(a, &value)]);
    let b_value = 1.5f32;
    world.morph_entity(entity, &[ComponentInit::of(b, &b_value)], &[]);

    let a_bytes = world.get_component_in_entity(entity, a).unwrap();
    assert_eq!(i32::from_ne_bytes(a_bytes.try_into().unwrap()), 7);
    let b_bytes = world.get_component_in_entity(entity, b).unwrap();
    assert_eq!(f32::from_ne_bytes(b_bytes.try_into().unwrap()), 1.5);

    // No panic dispatching sys_ab now that the entity carries both A and B.
    world.run_system(sys_ab);
}

// A morph with no additions or removals is a strict no-op.
#[test]
fn morph_with_no_changes_leaves_state_untouched() {
    let (registry, a) = registry_and_a();
    let mut world = World::new(&registry, WorldOptions::default());
    let value = 42i32;
    let entity = world.create_entity(&[ComponentInit::of(a, &value)]);

    world.morph_entity(entity, &[], &[]);

    let bytes = world.get_component_in_entity(entity, a).unwrap();
    assert_eq!(i32::from_ne_bytes(bytes.try_into().unwrap()), 42);
}

// Adding then removing the same component restores the original
// signature and values.
#[test]
fn morph_add_then_remove_round_trips_to_original_signature() {
    let (registry, a) = registry_and_a();
    let b = registry.borrow_mut().register_component(ComponentId::NULL, ComponentOptions::new(4, 4));
    let mut world = World::new(&registry, WorldOptions::default());

    let value = 11i32;
    let entity = world.create_entity(&[ComponentInit::of(a, &value)]);
    world.morph_entity(entity, &[ComponentInit::empty(b)], &[]);
    world.morph_entity(entity, &[], &[b]);

    assert!(world.get_component_in_entity(entity, b).is_none());
    let bytes = world.get_component_in_entity(entity, a).unwrap();
    assert_eq!(i32::from_ne_bytes(bytes.try_into().unwrap()), 11);
}

// A destroy queued before a morph on the same entity wins;
// the morph finds the handle stale and is skipped.
#[test]
fn destroy_before_morph_in_the_same_drain_wins() {
    fn destroy_then_morph(world: &mut World, batch: Batch<'_>, userdata: &mut (dyn Any + Send + Sync)) {
        let b = *userdata.downcast_ref::<ComponentId>().unwrap();
        for row in 0..batch.len() {
            let entity = batch.entity(row);
            world.destroy_entity(entity);
            world.morph_entity(entity, &[ComponentInit::empty(b)], &[]);
        }
    }

    let (registry, a) = registry_and_a();
    let b = registry.borrow_mut().register_component(ComponentId::NULL, ComponentOptions::new(4, 4));
    let sys = registry.borrow_mut().register_system(SystemId::NULL, SystemOptions::new(vec![a])
            .with_update_fn(destroy_then_morph)
            .with_userdata(Box::new(b)),
    );
    let mut world = World::new(&registry, WorldOptions::default());
    let entity = world.create_entity(&[ComponentInit::empty(a)]);

    world.run_system(sys);

    assert!(!world.is_valid_entity(entity));
}

// A template spawns entities with the registered defaults, and a per-spawn
// override substitutes just the named component's bytes.
#[test]
fn template_spawn_applies_override_without_disturbing_other_components() {
    use archetype_core::TemplateId;

    let (registry, a) = registry_and_a();
    let b = registry.borrow_mut().register_component(ComponentId::NULL, ComponentOptions::of::<i32>());
    let mut world = World::new(&registry, WorldOptions::default());

    let a_default = 0i32;
    let b_default = 10i32;
    let template = world.register_template(
        TemplateId::NULL,
        &[ComponentInit::of(a, &a_default), ComponentInit::of(b, &b_default)],
    );

    let plain = world.create_entity_from_template(template, &[]);
    let overridden_value = 99i32;
    let overridden = world.create_entity_from_template(template, &[ComponentInit::of(a, &overridden_value)]);

    let plain_a = world.get_component_in_entity(plain, a).unwrap();
    assert_eq!(i32::from_ne_bytes(plain_a.try_into().unwrap()), 0);

    let overridden_a = world.get_component_in_entity(overridden, a).unwrap();
    assert_eq!(i32::from_ne_bytes(overridden_a.try_into().unwrap()), 99);
    let overridden_b = world.get_component_in_entity(overridden, b).unwrap();
    assert_eq!(i32::from_ne_bytes(overridden_b.try_into().unwrap()), 10);
}

// Per-world userdata is scoped to the (world, system) pair and unaffected by
// the world's own global userdata slot.
#[test]
fn per_world_userdata_is_scoped_to_its_system() {
    let registry = Rc::new(RefCell::new(Registry::new(RegistryOptions::default())));
    let sys_one = registry.borrow_mut().register_system(SystemId::NULL, SystemOptions::new(vec![]));
    let sys_two = registry.borrow_mut().register_system(SystemId::NULL, SystemOptions::new(vec![]));
    let mut world = World::new(&registry, WorldOptions::default());

    world.set_per_world_userdata(sys_one, Box::new(String::from("for sys_one")));

    assert_eq!(world.get_per_world_userdata(sys_one).unwrap().downcast_ref::<String>().unwrap(), "for sys_one");
    assert!(world.get_per_world_userdata(sys_two).is_none());
}

// Late-registered systems are picked up lazily on the next sync without
// requiring the world to be recreated.
#[test]
fn world_picks_up_late_registered_system_on_next_call() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    fn count_calls(_world: &mut World, _batch: Batch<'_>, _userdata: &mut (dyn Any + Send + Sync)) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let (registry, a) = registry_and_a();
    let mut world = World::new(&registry, WorldOptions::default());
    world.create_entity(&[ComponentInit::empty(a)]);

    let sys = registry
        .borrow_mut()
        .register_system(SystemId::NULL, SystemOptions::new(vec![a]).with_update_fn(count_calls));
    world.run_system(sys);

    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

//! Physics-to-Transform synchronisation through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use moa_engine::prelude::*;

const DT: f64 = 1.0 / 60.0;

fn shared(physics: PhysicsWorld) -> SharedPhysics {
    Rc::new(RefCell::new(physics))
}

fn transform_of<'a>(world: &'a World, id: &str) -> &'a Transform {
    world.entity(id).unwrap().get::<Transform>().unwrap()
}

#[test]
fn sync_is_one_way() {
    let physics = shared(PhysicsWorld::new_zero_gravity());
    let link = physics
        .borrow_mut()
        .add_body(&BodyDesc::rectangle(10.0, 20.0, 4.0, 4.0).with_angle(0.5));

    let mut world = World::new();
    world.add_system(PhysicsSystem::new(Rc::clone(&physics)));
    world.add_entity(
        Entity::new("a")
            .with(Transform::new(999.0, 999.0, 4.0, 4.0))
            .with(link),
    );

    world.run_systems(DT).unwrap();
    let t = transform_of(&world, "a");
    assert!((t.x - 10.0).abs() < 1e-3);
    assert!((t.y - 20.0).abs() < 1e-3);
    assert!((t.angle - 0.5).abs() < 1e-3);

    // Writing the transform does not move the body.
    world
        .entity_mut("a")
        .unwrap()
        .get_mut::<Transform>()
        .unwrap()
        .x = 500.0;
    let pose = physics.borrow().body_pose(link.body).unwrap();
    assert!((pose.x - 10.0).abs() < 1e-3);

    // And the next sync overwrites it again.
    world.run_systems(DT).unwrap();
    assert!((transform_of(&world, "a").x - 10.0).abs() < 1e-3);
}

#[test]
fn size_is_never_touched() {
    let physics = shared(PhysicsWorld::default());
    let link = physics
        .borrow_mut()
        .add_body(&BodyDesc::circle(0.0, 0.0, 8.0));

    let mut world = World::new();
    world.add_system(PhysicsSystem::new(Rc::clone(&physics)));
    world.add_entity(
        Entity::new("ball")
            .with(Transform::new(0.0, 0.0, 16.0, 16.0))
            .with(link),
    );

    for _ in 0..10 {
        physics.borrow_mut().step(DT);
        world.run_systems(DT).unwrap();
    }
    let t = transform_of(&world, "ball");
    assert_eq!((t.width, t.height), (16.0, 16.0));
    assert!(t.y > 0.0, "gravity points down the screen");
}

#[test]
fn entities_missing_either_component_are_skipped() {
    let physics = shared(PhysicsWorld::new_zero_gravity());
    let link = physics
        .borrow_mut()
        .add_body(&BodyDesc::rectangle(5.0, 5.0, 1.0, 1.0));

    let mut world = World::new();
    world.add_system(PhysicsSystem::new(Rc::clone(&physics)));
    world.add_entity(Entity::new("body-only").with(link));
    world.add_entity(Entity::new("transform-only").with(Transform::new(1.0, 2.0, 3.0, 4.0)));

    world.run_systems(DT).unwrap();
    assert!(world.entity("body-only").unwrap().get::<Transform>().is_none());
    assert_eq!(transform_of(&world, "transform-only").x, 1.0);
}

#[test]
fn removed_body_leaves_entity_in_place() {
    let program = program_fn(|ctx| {
        let coin = ctx.physics.add_body(&BodyDesc::circle(200.0, 100.0, 8.0));
        ctx.world.add_entity(
            Entity::new("coin")
                .with(Transform::new(200.0, 100.0, 16.0, 16.0))
                .with(Visual::circle("gold"))
                .with(coin),
        );
        ctx.input.on_key_down(|ctx, _event| {
            let body = ctx
                .world
                .entity("coin")
                .and_then(|e| e.get::<Physics>())
                .map(|p| p.body);
            if let Some(body) = body {
                ctx.physics.remove_body(body);
            }
        });
        Ok(())
    });
    let mut driver = FrameDriver::mount(
        program,
        RuntimeConfig::default(),
        RecordingCanvas::new(800.0, 600.0),
        NullChannel,
    )
    .unwrap();
    driver.run_frames(5).unwrap();
    assert!(driver.key_down(&KeyEvent::new("c", "KeyC")));

    let frozen = *transform_of(driver.world(), "coin");
    driver.run_frames(5).unwrap();
    assert!(driver.is_running());
    assert_eq!(*transform_of(driver.world(), "coin"), frozen);
    assert_eq!(driver.canvas().ops().len(), 1);
}

#[test]
fn non_finite_pose_is_a_fault_naming_the_entity() {
    let physics = shared(PhysicsWorld::new_zero_gravity());
    let link = physics
        .borrow_mut()
        .add_body(&BodyDesc::rectangle(0.0, 0.0, 1.0, 1.0));
    physics.borrow_mut().set_pose(link.body, f64::NAN, 0.0, 0.0);

    let mut world = World::new();
    world.add_system(PhysicsSystem::new(Rc::clone(&physics)));
    world.add_entity(
        Entity::new("broken")
            .with(Transform::default())
            .with(link),
    );

    let err = world.run_systems(DT).unwrap_err();
    match err {
        EcsError::SystemFault { system, entity, .. } => {
            assert_eq!(system, PHYSICS_SYSTEM_NAME);
            assert_eq!(entity, "broken");
        }
        other => panic!("expected a system fault, got {other:?}"),
    }
}

#[test]
fn static_bodies_do_not_move() {
    let physics = shared(PhysicsWorld::default());
    let floor = physics
        .borrow_mut()
        .add_body(&BodyDesc::rectangle(400.0, 580.0, 800.0, 40.0).fixed());
    assert!(floor.is_static);

    for _ in 0..30 {
        physics.borrow_mut().step(DT);
    }
    let pose = physics.borrow().body_pose(floor.body).unwrap();
    assert_eq!((pose.x, pose.y), (400.0, 580.0));
}

#[test]
fn falling_box_comes_to_rest_on_floor() {
    let program = program_fn(|ctx| {
        let floor_y = ctx.canvas_height - 20.0;
        let floor = ctx
            .physics
            .add_body(&BodyDesc::rectangle(400.0, floor_y, 800.0, 40.0).fixed());
        ctx.world.add_entity(
            Entity::new("floor")
                .with(Transform::new(400.0, floor_y, 800.0, 40.0))
                .with(floor),
        );
        let body = ctx
            .physics
            .add_body(&BodyDesc::rectangle(400.0, 100.0, 40.0, 40.0));
        ctx.world.add_entity(
            Entity::new("box")
                .with(Transform::new(400.0, 100.0, 40.0, 40.0))
                .with(body),
        );
        Ok(())
    });
    let mut driver = FrameDriver::mount(
        program,
        RuntimeConfig::default(),
        RecordingCanvas::new(800.0, 600.0),
        NullChannel,
    )
    .unwrap();
    driver.run_frames(240).unwrap();

    // Floor top is at 560; the box's center rests 20 above it.
    let y = transform_of(driver.world(), "box").y;
    assert!((y - 540.0).abs() < 2.0, "box should rest on the floor, got y = {y}");
    assert_eq!(transform_of(driver.world(), "floor").y, 580.0);
}

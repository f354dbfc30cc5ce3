//! Whole-world scenarios exercising stepping, joints and callbacks together.

use rigid2d::{
    Aabb, BodyDef, BodyKey, BodyType, CircleShape, Contact, ContactFilter, ContactImpulse,
    ContactKey, ContactListener, DestructionListener, DistanceJointDef, Filter, Fixture,
    FixtureDef, FixtureKey, FrictionJointDef, GearJointDef, Joint, JointDef, JointKey, JointKind,
    Manifold, MassData, MotorJointDef, MouseJointDef, PhysicsError, PolygonShape,
    PrismaticJointDef, PulleyJointDef, RevoluteJointDef, RopeJointDef, Vec2, WeldJointDef,
    WheelJointDef, World, WorldSettings,
};

use std::{cell::RefCell, rc::Rc};

const DT: f64 = 1.0 / 60.0;

fn run(world: &mut World, steps: usize) {
    for _ in 0..steps {
        world.step(DT, 8, 3).unwrap();
    }
}

/// A wide static box whose top surface is at y = 0.
fn ground(world: &mut World) -> BodyKey {
    let ground = world
        .create_body(&BodyDef::new_static().with_position(Vec2::new(0.0, -0.5)))
        .unwrap();
    let shape = PolygonShape::new_box(20.0, 0.5).unwrap();
    world.create_fixture(ground, &FixtureDef::new(shape)).unwrap();
    ground
}

/// A static body without fixtures to anchor joints to.
fn anchor(world: &mut World) -> BodyKey {
    world.create_body(&BodyDef::new_static()).unwrap()
}

fn dynamic_box(world: &mut World, position: Vec2, half: f64, density: f64) -> BodyKey {
    let body = world
        .create_body(&BodyDef::new_dynamic().with_position(position))
        .unwrap();
    let shape = PolygonShape::new_box(half, half).unwrap();
    world
        .create_fixture(body, &FixtureDef::new(shape).with_density(density))
        .unwrap();
    body
}

fn dynamic_ball(world: &mut World, position: Vec2, radius: f64) -> BodyKey {
    let body = world
        .create_body(&BodyDef::new_dynamic().with_position(position))
        .unwrap();
    let shape = CircleShape::new(radius).unwrap();
    world
        .create_fixture(body, &FixtureDef::new(shape).with_density(1.0))
        .unwrap();
    body
}

fn kinetic_energy(world: &World) -> f64 {
    world
        .bodies()
        .map(|(_, body)| {
            0.5 * body.mass() * body.linear_velocity().mag_sq()
                + 0.5 * body.inertia() * body.angular_velocity().powi(2)
        })
        .sum()
}

//
// contact dynamics
//

#[test]
fn falling_ball_comes_to_rest_on_ground() {
    let mut world = World::default();
    ground(&mut world);
    let ball = dynamic_ball(&mut world, Vec2::new(0.0, 10.0), 1.0);

    run(&mut world, 300);

    let body = world.body(ball).unwrap();
    assert!((body.position().y - 1.0).abs() < 0.02, "y = {}", body.position().y);
    assert!(body.position().x.abs() < 1e-6);
    assert!(body.linear_velocity().mag() < 0.01);
}

#[test]
fn resting_stack_does_not_gain_energy() {
    let mut world = World::default();
    ground(&mut world);
    for i in 0..5 {
        dynamic_box(&mut world, Vec2::new(0.0, 0.5 + i as f64), 0.5, 1.0);
    }

    world.step(DT, 8, 3).unwrap();
    let initial = kinetic_energy(&world);
    for _ in 0..300 {
        world.step(DT, 8, 3).unwrap();
        assert!(kinetic_energy(&world) <= initial + 0.01);
    }
}

#[test]
fn stack_sleeps_and_wakes_as_one_island() {
    let mut world = World::default();
    ground(&mut world);
    let boxes: Vec<BodyKey> = (0..3)
        .map(|i| dynamic_box(&mut world, Vec2::new(0.0, 0.5 + i as f64), 0.5, 1.0))
        .collect();

    let awake_count = |world: &World| {
        boxes
            .iter()
            .filter(|&&key| world.body(key).unwrap().is_awake())
            .count()
    };

    let mut slept = false;
    for _ in 0..600 {
        world.step(DT, 8, 3).unwrap();
        let awake = awake_count(&world);
        assert!(awake == 0 || awake == boxes.len(), "{} boxes awake", awake);
        if awake == 0 {
            slept = true;
            break;
        }
    }
    assert!(slept, "stack never fell asleep");

    let top = boxes[2];
    let center = world.body(top).unwrap().world_center();
    world
        .body_mut(top)
        .unwrap()
        .apply_linear_impulse(Vec2::new(0.5, 0.0), center, true);
    assert_eq!(awake_count(&world), 1);

    world.step(DT, 8, 3).unwrap();
    assert_eq!(awake_count(&world), boxes.len());
}

#[test]
fn persistent_contact_keeps_feature_ids() {
    let mut world = World::new(WorldSettings::default().with_allow_sleep(false));
    ground(&mut world);
    dynamic_box(&mut world, Vec2::new(0.0, 0.5), 0.5, 1.0);

    run(&mut world, 60);
    let ids = |world: &World| {
        let (_, contact) = world.contacts().next().unwrap();
        assert!(contact.is_touching());
        contact
            .manifold()
            .points()
            .iter()
            .map(|p| p.id)
            .collect::<Vec<_>>()
    };
    let before = ids(&world);
    assert_eq!(before.len(), 2);
    world.step(DT, 8, 3).unwrap();
    assert_eq!(ids(&world), before);
}

#[test]
fn identical_worlds_evolve_identically() {
    let build = || {
        let mut world = World::default();
        ground(&mut world);
        for row in 0..4 {
            for col in 0..(4 - row) {
                let x = col as f64 * 1.05 + row as f64 * 0.525 - 1.5;
                let y = 0.5 + row as f64 * 1.0;
                dynamic_box(&mut world, Vec2::new(x, y), 0.5, 1.0);
            }
        }
        world
    };
    let mut a = build();
    let mut b = build();
    run(&mut a, 120);
    run(&mut b, 120);

    for ((_, body_a), (_, body_b)) in a.bodies().zip(b.bodies()) {
        assert_eq!(body_a.position(), body_b.position());
        assert_eq!(body_a.angle(), body_b.angle());
    }
}

#[test]
fn fast_bullet_does_not_tunnel_through_thin_wall() {
    for sub_stepping in [false, true] {
        let settings = WorldSettings::default()
            .with_gravity(Vec2::zero())
            .with_sub_stepping(sub_stepping);
        let mut world = World::new(settings);

        let wall = world
            .create_body(&BodyDef::new_static().with_position(Vec2::new(5.0, 0.0)))
            .unwrap();
        let shape = PolygonShape::new_box(0.05, 2.0).unwrap();
        world.create_fixture(wall, &FixtureDef::new(shape)).unwrap();

        let bullet = world
            .create_body(
                &BodyDef::new_dynamic()
                    .with_bullet(true)
                    .with_linear_velocity(Vec2::new(500.0, 0.0)),
            )
            .unwrap();
        let shape = CircleShape::new(0.1).unwrap();
        world
            .create_fixture(bullet, &FixtureDef::new(shape).with_density(1.0))
            .unwrap();

        for _ in 0..30 {
            world.step(DT, 8, 3).unwrap();
            let x = world.body(bullet).unwrap().position().x;
            assert!(x < 4.95, "bullet reached x = {} (sub-stepping {})", x, sub_stepping);
        }
    }
}

#[test]
fn teleported_body_collides_at_new_location() {
    let mut world = World::default();
    ground(&mut world);
    let ball = dynamic_ball(&mut world, Vec2::new(0.0, 50.0), 0.5);
    run(&mut world, 1);
    assert_eq!(world.contact_count(), 0);

    // the pair is found at the end of the first step and updated in the second
    world.set_transform(ball, Vec2::new(3.0, 0.45), 0.0).unwrap();
    run(&mut world, 2);
    let (_, contact) = world.contacts().next().unwrap();
    assert!(contact.is_touching());
}

//
// joints
//

#[test]
fn revolute_with_equal_limits_behaves_like_weld() {
    let build = |weld: bool| {
        let mut world = World::default();
        let base = anchor(&mut world);
        let arm = world
            .create_body(&BodyDef::new_dynamic().with_position(Vec2::new(1.0, 0.0)))
            .unwrap();
        let shape = PolygonShape::new_box(1.0, 0.1).unwrap();
        world
            .create_fixture(arm, &FixtureDef::new(shape).with_density(1.0))
            .unwrap();
        let def: JointDef = if weld {
            WeldJointDef::init(&world, base, arm, Vec2::zero()).unwrap().into()
        } else {
            RevoluteJointDef::init(&world, base, arm, Vec2::zero())
                .unwrap()
                .with_limits(0.0, 0.0)
                .into()
        };
        world.create_joint(&def).unwrap();
        (world, arm)
    };

    let (mut revolute_world, revolute_arm) = build(false);
    let (mut weld_world, weld_arm) = build(true);
    run(&mut revolute_world, 120);
    run(&mut weld_world, 120);

    let revolute = revolute_world.body(revolute_arm).unwrap();
    let weld = weld_world.body(weld_arm).unwrap();
    assert!(revolute.angle().abs() < 0.03, "angle = {}", revolute.angle());
    assert!(weld.angle().abs() < 0.03, "angle = {}", weld.angle());
    assert!((revolute.position() - weld.position()).mag() < 0.03);
}

#[test]
fn distance_joint_keeps_pendulum_length() {
    let mut world = World::default();
    let base = anchor(&mut world);
    let bob = dynamic_ball(&mut world, Vec2::new(3.0, 0.0), 0.25);
    let def = DistanceJointDef::init(&world, base, bob, Vec2::zero(), Vec2::new(3.0, 0.0)).unwrap();
    world.create_joint(&def.into()).unwrap();

    for _ in 0..180 {
        world.step(DT, 8, 3).unwrap();
        let length = world.body(bob).unwrap().position().mag();
        assert!((length - 3.0).abs() < 0.05, "length = {}", length);
    }
    // it actually swung
    assert!(world.body(bob).unwrap().position().y < -0.5);
}

#[test]
fn prismatic_joint_stops_at_lower_limit() {
    let mut world = World::default();
    let base = anchor(&mut world);
    let slider = dynamic_box(&mut world, Vec2::zero(), 0.5, 1.0);
    let def = PrismaticJointDef::init(&world, base, slider, Vec2::zero(), Vec2::new(0.0, 1.0))
        .unwrap()
        .with_limits(-1.0, 1.0);
    let joint = world.create_joint(&def.into()).unwrap();

    run(&mut world, 120);

    let (base_body, slider_body) = world.body_pair(base, slider).unwrap();
    let JointKind::Prismatic(prismatic) = world.joint(joint).unwrap().kind() else {
        panic!("wrong joint kind");
    };
    let translation = prismatic.joint_translation(base_body, slider_body);
    assert!((translation + 1.0).abs() < 0.02, "translation = {}", translation);
    assert!(slider_body.position().x.abs() < 0.01);
    assert!(slider_body.angle().abs() < 0.01);
}

#[test]
fn pulley_conserves_rope_length() {
    let mut world = World::default();
    let light = dynamic_box(&mut world, Vec2::new(-2.0, 0.0), 0.5, 1.0);
    let heavy = dynamic_box(&mut world, Vec2::new(2.0, 0.0), 0.5, 2.0);
    let def = PulleyJointDef::init(
        &world,
        light,
        heavy,
        Vec2::new(-2.0, 5.0),
        Vec2::new(2.0, 5.0),
        Vec2::new(-2.0, 0.0),
        Vec2::new(2.0, 0.0),
        1.0,
    )
    .unwrap();
    let joint = world.create_joint(&def.into()).unwrap();

    run(&mut world, 60);

    let JointKind::Pulley(pulley) = world.joint(joint).unwrap().kind() else {
        panic!("wrong joint kind");
    };
    let length_a = pulley.current_length_a(world.body(light).unwrap());
    let length_b = pulley.current_length_b(world.body(heavy).unwrap());
    assert!((length_a + length_b - 10.0).abs() < 0.05);
    assert!(world.body(heavy).unwrap().position().y < -0.5);
    assert!(world.body(light).unwrap().position().y > 0.5);
}

#[test]
fn gear_couples_two_revolutes() {
    let mut world = World::new(WorldSettings::default().with_gravity(Vec2::zero()));
    let base = anchor(&mut world);
    let big = dynamic_ball(&mut world, Vec2::zero(), 1.0);
    let small = dynamic_ball(&mut world, Vec2::new(3.0, 0.0), 0.5);

    let driver = RevoluteJointDef::init(&world, base, big, Vec2::zero())
        .unwrap()
        .with_motor(1.0, 1000.0);
    let driver = world.create_joint(&driver.into()).unwrap();
    let follower = RevoluteJointDef::init(&world, base, small, Vec2::new(3.0, 0.0)).unwrap();
    let follower = world.create_joint(&follower.into()).unwrap();
    let gear = GearJointDef::new(driver, follower).with_ratio(2.0);
    world.create_joint(&gear.into()).unwrap();

    run(&mut world, 60);

    let angle_big = world.body(big).unwrap().angle();
    let angle_small = world.body(small).unwrap().angle();
    assert!(angle_big > 0.5, "driver angle = {}", angle_big);
    assert!((angle_big + 2.0 * angle_small).abs() < 0.01);
}

#[test]
fn mouse_joint_drags_body_to_target() {
    let mut world = World::new(WorldSettings::default().with_gravity(Vec2::zero()));
    let base = anchor(&mut world);
    let body = dynamic_box(&mut world, Vec2::zero(), 0.5, 1.0);
    let def = MouseJointDef::new(base, body, Vec2::zero()).with_max_force(1000.0);
    let joint = world.create_joint(&def.into()).unwrap();

    world
        .modify_joint(joint, |kind| {
            if let JointKind::Mouse(mouse) = kind {
                mouse.set_target(Vec2::new(3.0, 2.0));
            }
        })
        .unwrap();
    run(&mut world, 120);

    let position = world.body(body).unwrap().position();
    assert!((position - Vec2::new(3.0, 2.0)).mag() < 0.05, "at {:?}", position);
}

#[test]
fn rope_limits_distance() {
    let mut world = World::default();
    let base = anchor(&mut world);
    let ball = dynamic_ball(&mut world, Vec2::new(1.0, 0.0), 0.25);
    let def = RopeJointDef::new(base, ball)
        .with_local_anchors(Vec2::zero(), Vec2::zero())
        .with_max_length(2.0);
    world.create_joint(&def.into()).unwrap();

    for _ in 0..120 {
        world.step(DT, 8, 3).unwrap();
        let distance = world.body(ball).unwrap().position().mag();
        assert!(distance < 2.05, "distance = {}", distance);
    }
}

#[test]
fn motor_joint_drives_to_offset() {
    let mut world = World::new(WorldSettings::default().with_gravity(Vec2::zero()));
    let base = anchor(&mut world);
    let body = dynamic_box(&mut world, Vec2::zero(), 0.5, 1.0);
    let def = MotorJointDef::init(&world, base, body)
        .unwrap()
        .with_offsets(Vec2::new(1.0, 0.0), 0.0)
        .with_max_force(1000.0)
        .with_max_torque(1000.0);
    world.create_joint(&def.into()).unwrap();

    run(&mut world, 120);

    let position = world.body(body).unwrap().position();
    assert!((position - Vec2::new(1.0, 0.0)).mag() < 0.05, "at {:?}", position);
}

#[test]
fn wheel_suspension_settles_on_its_axis() {
    let mut world = World::default();
    let chassis = anchor(&mut world);
    let wheel = dynamic_ball(&mut world, Vec2::zero(), 0.5);
    let def = WheelJointDef::init(&world, chassis, wheel, Vec2::zero(), Vec2::new(0.0, 1.0))
        .unwrap()
        .with_spring(4.0, 0.7);
    let joint = world.create_joint(&def.into()).unwrap();

    run(&mut world, 180);

    let (chassis_body, wheel_body) = world.body_pair(chassis, wheel).unwrap();
    let JointKind::Wheel(wheel_joint) = world.joint(joint).unwrap().kind() else {
        panic!("wrong joint kind");
    };
    let sag = wheel_joint.joint_translation(chassis_body, wheel_body);
    assert!(sag < 0.0 && sag > -0.05, "sag = {}", sag);
    assert!(wheel_body.position().x.abs() < 0.01);
    assert!(wheel_body.linear_velocity().mag() < 0.01);
}

#[test]
fn friction_joint_brings_body_to_a_stop() {
    let mut world = World::new(WorldSettings::default().with_gravity(Vec2::zero()));
    let base = anchor(&mut world);
    let body = world
        .create_body(&BodyDef::new_dynamic().with_linear_velocity(Vec2::new(5.0, 0.0)))
        .unwrap();
    let shape = PolygonShape::new_box(0.5, 0.5).unwrap();
    world
        .create_fixture(body, &FixtureDef::new(shape).with_density(1.0))
        .unwrap();
    let def = FrictionJointDef::init(&world, base, body, Vec2::zero())
        .unwrap()
        .with_max_force(10.0);
    world.create_joint(&def.into()).unwrap();

    run(&mut world, 60);
    assert!(world.body(body).unwrap().linear_velocity().mag() < 0.01);
    // decelerating at 10 m/s^2 from 5 m/s covers 1.25 m
    assert!((world.body(body).unwrap().position().x - 1.25).abs() < 0.1);
}

//
// callbacks
//

#[derive(Default)]
struct Goodbyes {
    joints: Vec<JointKey>,
    fixtures: Vec<FixtureKey>,
}

struct RecordGoodbyes(Rc<RefCell<Goodbyes>>);

impl DestructionListener for RecordGoodbyes {
    fn say_goodbye_joint(&mut self, key: JointKey, _joint: &Joint) {
        self.0.borrow_mut().joints.push(key);
    }

    fn say_goodbye_fixture(&mut self, key: FixtureKey, _fixture: &Fixture) {
        self.0.borrow_mut().fixtures.push(key);
    }
}

#[test]
fn destroying_body_cascades_through_gear() {
    let mut world = World::default();
    let base = anchor(&mut world);
    let big = dynamic_ball(&mut world, Vec2::zero(), 1.0);
    let small = dynamic_ball(&mut world, Vec2::new(3.0, 0.0), 0.5);
    let j1 = RevoluteJointDef::init(&world, base, big, Vec2::zero()).unwrap();
    let j1 = world.create_joint(&j1.into()).unwrap();
    let j2 = RevoluteJointDef::init(&world, base, small, Vec2::new(3.0, 0.0)).unwrap();
    let j2 = world.create_joint(&j2.into()).unwrap();
    let gear = world
        .create_joint(&GearJointDef::new(j1, j2).into())
        .unwrap();

    let goodbyes = Rc::new(RefCell::new(Goodbyes::default()));
    world.set_destruction_listener(Some(Box::new(RecordGoodbyes(goodbyes.clone()))));

    world.destroy_body(base).unwrap();

    let goodbyes = goodbyes.borrow();
    assert_eq!(goodbyes.joints.len(), 3);
    assert!(goodbyes.joints.contains(&gear));
    assert!(goodbyes.fixtures.is_empty());
    assert_eq!(world.joint_count(), 0);
    assert!(world.body(big).unwrap().joints().is_empty());
    assert!(world.body(small).unwrap().joints().is_empty());
}

#[test]
fn destroying_body_reports_its_fixtures() {
    let mut world = World::default();
    let ball = dynamic_ball(&mut world, Vec2::zero(), 0.5);
    let fixture = world.body(ball).unwrap().fixtures()[0];

    let goodbyes = Rc::new(RefCell::new(Goodbyes::default()));
    world.set_destruction_listener(Some(Box::new(RecordGoodbyes(goodbyes.clone()))));
    world.destroy_body(ball).unwrap();

    assert_eq!(goodbyes.borrow().fixtures, vec![fixture]);
    assert_eq!(world.proxy_count(), 0);
}

#[derive(Default)]
struct EventCounts {
    begin: usize,
    end: usize,
    pre_solve: usize,
    post_solve: usize,
    max_normal_impulse: f64,
}

struct CountEvents(Rc<RefCell<EventCounts>>);

impl ContactListener for CountEvents {
    fn begin_contact(&mut self, _contact: &Contact) {
        self.0.borrow_mut().begin += 1;
    }

    fn end_contact(&mut self, _contact: &Contact) {
        self.0.borrow_mut().end += 1;
    }

    fn pre_solve(&mut self, _contact: &mut Contact, _old_manifold: &Manifold) {
        self.0.borrow_mut().pre_solve += 1;
    }

    fn post_solve(&mut self, _contact: &Contact, impulse: &ContactImpulse) {
        let mut counts = self.0.borrow_mut();
        counts.post_solve += 1;
        for &normal in &impulse.normal_impulses[..impulse.count] {
            counts.max_normal_impulse = counts.max_normal_impulse.max(normal);
        }
    }
}

#[test]
fn contact_listener_sees_whole_lifecycle() {
    let mut world = World::new(WorldSettings::default().with_allow_sleep(false));
    ground(&mut world);
    let ball = dynamic_ball(&mut world, Vec2::new(0.0, 2.0), 0.5);

    let counts = Rc::new(RefCell::new(EventCounts::default()));
    world.set_contact_listener(Some(Box::new(CountEvents(counts.clone()))));

    run(&mut world, 120);
    {
        let counts = counts.borrow();
        assert_eq!(counts.begin, 1);
        assert_eq!(counts.end, 0);
        assert!(counts.pre_solve > 0);
        assert!(counts.post_solve > 0);
        assert!(counts.max_normal_impulse > 0.0);
    }

    world.destroy_body(ball).unwrap();
    assert_eq!(counts.borrow().end, 1);
}

struct DisableAll;

impl ContactListener for DisableAll {
    fn pre_solve(&mut self, contact: &mut Contact, _old_manifold: &Manifold) {
        contact.set_enabled(false);
    }
}

#[test]
fn disabled_contacts_are_not_solved() {
    let mut world = World::default();
    ground(&mut world);
    let ball = dynamic_ball(&mut world, Vec2::new(0.0, 0.5), 0.5);
    world.set_contact_listener(Some(Box::new(DisableAll)));

    run(&mut world, 60);
    assert!(world.body(ball).unwrap().position().y < -1.0);
}

struct RejectAll;

impl ContactFilter for RejectAll {
    fn should_collide(&mut self, _fixture_a: &Fixture, _fixture_b: &Fixture) -> bool {
        false
    }
}

#[test]
fn custom_filter_lets_bodies_pass_through() {
    let mut world = World::default();
    ground(&mut world);
    let ball = dynamic_ball(&mut world, Vec2::new(0.0, 2.0), 0.5);
    world.set_contact_filter(Some(Box::new(RejectAll)));

    run(&mut world, 120);
    assert_eq!(world.contact_count(), 0);
    assert!(world.body(ball).unwrap().position().y < -5.0);
}

#[test]
fn negative_group_never_collides() {
    let mut world = World::new(WorldSettings::default().with_gravity(Vec2::zero()));
    let filter = Filter {
        group_index: -1,
        ..Filter::default()
    };
    for x in [0.0, 0.5] {
        let body = world
            .create_body(&BodyDef::new_dynamic().with_position(Vec2::new(x, 0.0)))
            .unwrap();
        let shape = PolygonShape::new_box(0.5, 0.5).unwrap();
        world
            .create_fixture(
                body,
                &FixtureDef::new(shape).with_density(1.0).with_filter(filter),
            )
            .unwrap();
    }

    run(&mut world, 2);
    assert_eq!(world.contact_count(), 0);
}

#[test]
fn sensor_reports_overlap_without_response() {
    let mut world = World::new(WorldSettings::default().with_allow_sleep(false));
    ground(&mut world);
    let ball = world
        .create_body(&BodyDef::new_dynamic().with_position(Vec2::new(0.0, 2.0)))
        .unwrap();
    let shape = CircleShape::new(0.5).unwrap();
    world
        .create_fixture(
            ball,
            &FixtureDef::new(shape).with_density(1.0).with_sensor(true),
        )
        .unwrap();
    let counts = Rc::new(RefCell::new(EventCounts::default()));
    world.set_contact_listener(Some(Box::new(CountEvents(counts.clone()))));

    run(&mut world, 60);
    let counts = counts.borrow();
    assert!(counts.begin >= 1);
    assert_eq!(counts.post_solve, 0);
    assert!(world.body(ball).unwrap().position().y < -1.0);
}

struct Conveyor(f64);

impl ContactListener for Conveyor {
    fn pre_solve(&mut self, contact: &mut Contact, _old_manifold: &Manifold) {
        contact.set_tangent_speed(self.0);
    }
}

#[test]
fn tangent_speed_drives_box_like_a_conveyor() {
    let mut world = World::new(WorldSettings::default().with_allow_sleep(false));
    ground(&mut world);
    let crate_box = dynamic_box(&mut world, Vec2::new(0.0, 0.5), 0.5, 1.0);
    world.set_contact_listener(Some(Box::new(Conveyor(2.0))));

    // friction of 0.2 accelerates the box at 2 m/s^2 until it matches the belt
    run(&mut world, 180);
    let body = world.body(crate_box).unwrap();
    let v = body.linear_velocity();
    assert!((v.x.abs() - 2.0).abs() < 0.05, "v = {:?}", v);
    assert!(v.y.abs() < 0.01);
    assert!((body.position().y - 0.5).abs() < 0.02);
    assert!(body.angle().abs() < 0.01);
}

//
// runtime changes
//

fn only_fixture(world: &World, body: BodyKey) -> FixtureKey {
    world.body(body).unwrap().fixtures()[0]
}

fn no_collisions() -> Filter {
    Filter {
        mask_bits: 0,
        ..Filter::default()
    }
}

#[test]
fn refiltering_drops_resting_contact() {
    let mut world = World::new(WorldSettings::default().with_allow_sleep(false));
    ground(&mut world);
    let resting = dynamic_box(&mut world, Vec2::new(0.0, 0.5), 0.5, 1.0);
    run(&mut world, 30);
    assert_eq!(world.contact_count(), 1);
    assert!((world.body(resting).unwrap().position().y - 0.5).abs() < 0.02);

    let fixture = only_fixture(&world, resting);
    world.set_filter_data(fixture, no_collisions()).unwrap();
    assert_eq!(world.fixture(fixture).unwrap().filter().mask_bits, 0);

    run(&mut world, 60);
    assert_eq!(world.contact_count(), 0);
    assert!(world.body(resting).unwrap().position().y < -1.0);
}

#[test]
fn refiltering_a_sleeping_body_drops_contact_and_wakes_it() {
    let mut world = World::default();
    ground(&mut world);
    let resting = dynamic_box(&mut world, Vec2::new(0.0, 0.5), 0.5, 1.0);
    for _ in 0..600 {
        world.step(DT, 8, 3).unwrap();
        if !world.body(resting).unwrap().is_awake() {
            break;
        }
    }
    assert!(!world.body(resting).unwrap().is_awake(), "box never fell asleep");

    let fixture = only_fixture(&world, resting);
    world.set_filter_data(fixture, no_collisions()).unwrap();
    assert!(!world.body(resting).unwrap().is_awake());
    world.step(DT, 8, 3).unwrap();
    // the filter is applied even though nothing was awake, and losing
    // the supporting contact wakes the box
    assert_eq!(world.contact_count(), 0);
    assert!(world.body(resting).unwrap().is_awake());

    run(&mut world, 60);
    assert_eq!(world.contact_count(), 0);
    assert!(world.body(resting).unwrap().position().y < -1.0);
}

#[test]
fn changing_body_type_starts_and_stops_motion() {
    let mut world = World::default();
    ground(&mut world);
    let body = world
        .create_body(&BodyDef::new_static().with_position(Vec2::new(0.0, 3.0)))
        .unwrap();
    let shape = PolygonShape::new_box(0.5, 0.5).unwrap();
    world
        .create_fixture(body, &FixtureDef::new(shape).with_density(1.0))
        .unwrap();

    run(&mut world, 30);
    assert_eq!(world.body(body).unwrap().position().y, 3.0);
    assert_eq!(world.body(body).unwrap().mass(), 0.0);

    world.set_body_type(body, BodyType::Dynamic).unwrap();
    assert!((world.body(body).unwrap().mass() - 1.0).abs() < 1e-9);
    run(&mut world, 20);
    let falling = world.body(body).unwrap();
    assert!(falling.position().y < 2.5, "y = {}", falling.position().y);
    assert!(falling.linear_velocity().y < 0.0);

    world.set_body_type(body, BodyType::Static).unwrap();
    let frozen_at = world.body(body).unwrap().position();
    assert_eq!(world.body(body).unwrap().linear_velocity(), Vec2::zero());
    run(&mut world, 30);
    assert_eq!(world.body(body).unwrap().position(), frozen_at);

    // and back again: it falls the rest of the way and lands on the ground
    world.set_body_type(body, BodyType::Dynamic).unwrap();
    run(&mut world, 240);
    let landed = world.body(body).unwrap();
    assert!((landed.position().y - 0.5).abs() < 0.02, "y = {}", landed.position().y);
}

#[test]
fn toggling_sensor_lets_resting_box_fall_through() {
    let mut world = World::new(WorldSettings::default().with_allow_sleep(false));
    ground(&mut world);
    let resting = dynamic_box(&mut world, Vec2::new(0.0, 0.5), 0.5, 1.0);
    run(&mut world, 30);
    let fixture = only_fixture(&world, resting);
    assert!(!world.fixture(fixture).unwrap().is_sensor());

    world.set_sensor(fixture, true).unwrap();
    assert!(world.fixture(fixture).unwrap().is_sensor());
    run(&mut world, 60);
    assert!(world.body(resting).unwrap().position().y < -1.0);

    // turning it back into a solid fixture after it left the ground changes nothing
    world.set_sensor(fixture, false).unwrap();
    run(&mut world, 60);
    assert!(world.body(resting).unwrap().position().y < -5.0);
}

#[test]
fn contact_overrides_reset_to_mixed_values() {
    let mut world = World::default();
    ground(&mut world);
    let body = world
        .create_body(&BodyDef::new_dynamic().with_position(Vec2::new(0.0, 0.5)))
        .unwrap();
    let shape = PolygonShape::new_box(0.5, 0.5).unwrap();
    world
        .create_fixture(
            body,
            &FixtureDef::new(shape)
                .with_density(1.0)
                .with_friction(0.8)
                .with_restitution(0.3),
        )
        .unwrap();
    run(&mut world, 2);

    let key: ContactKey = world.contacts().map(|(key, _)| key).next().unwrap();
    let mixed_friction = (0.2f64 * 0.8).sqrt();
    assert!((world.contact(key).unwrap().friction() - mixed_friction).abs() < 1e-12);
    assert_eq!(world.contact(key).unwrap().restitution(), 0.3);

    let contact = world.contact_mut(key).unwrap();
    contact.set_friction(5.0);
    contact.set_restitution(0.9);
    run(&mut world, 1);
    // overrides persist across steps
    assert_eq!(world.contact(key).unwrap().friction(), 5.0);
    assert_eq!(world.contact(key).unwrap().restitution(), 0.9);

    world.reset_contact_friction(key).unwrap();
    world.reset_contact_restitution(key).unwrap();
    assert!((world.contact(key).unwrap().friction() - mixed_friction).abs() < 1e-12);
    assert_eq!(world.contact(key).unwrap().restitution(), 0.3);

    world.destroy_body(body).unwrap();
    assert_eq!(
        world.reset_contact_friction(key),
        Err(PhysicsError::InvalidHandle("contact"))
    );
}

#[test]
fn mass_override_must_be_consistent_with_center() {
    let mut world = World::new(WorldSettings::default().with_gravity(Vec2::zero()));
    let body = dynamic_box(&mut world, Vec2::zero(), 0.5, 1.0);
    let before = world.body(body).unwrap().mass_data();

    // inertia about the origin of 1 is impossible for a unit mass two meters away
    let inconsistent = MassData {
        mass: 1.0,
        center: Vec2::new(2.0, 0.0),
        inertia: 1.0,
    };
    assert!(matches!(
        world.set_mass_data(body, &inconsistent),
        Err(PhysicsError::InvalidMassData(_))
    ));
    assert_eq!(world.body(body).unwrap().mass_data(), before);

    world
        .set_mass_data(
            body,
            &MassData {
                inertia: 5.0,
                ..inconsistent
            },
        )
        .unwrap();
    let data = world.body(body).unwrap().mass_data();
    assert_eq!(data.mass, 1.0);
    assert!((data.inertia - 5.0).abs() < 1e-12);

    world.body_mut(body).unwrap().apply_torque(1.0, true);
    world.step(DT, 8, 3).unwrap();
    // 1 N m over the central inertia of 1 for one step
    let w = world.body(body).unwrap().angular_velocity();
    assert!(w.is_finite() && (w - DT).abs() < 1e-9, "w = {}", w);
}

#[test]
fn joint_setters_sanitize_their_input() {
    let mut world = World::default();
    let base = anchor(&mut world);
    let body = dynamic_box(&mut world, Vec2::zero(), 0.5, 1.0);

    let revolute = world
        .create_joint(&RevoluteJointDef::init(&world, base, body, Vec2::zero()).unwrap().into())
        .unwrap();
    let prismatic = world
        .create_joint(
            &PrismaticJointDef::init(&world, base, body, Vec2::zero(), Vec2::unit_x())
                .unwrap()
                .into(),
        )
        .unwrap();
    let motor = world
        .create_joint(&MotorJointDef::init(&world, base, body).unwrap().into())
        .unwrap();
    let friction = world
        .create_joint(&FrictionJointDef::init(&world, base, body, Vec2::zero()).unwrap().into())
        .unwrap();

    let limits = world
        .modify_joint(revolute, |kind| match kind {
            JointKind::Revolute(joint) => {
                joint.set_limits(0.5, -0.5);
                (joint.lower_limit(), joint.upper_limit())
            }
            _ => panic!("wrong joint kind"),
        })
        .unwrap();
    assert_eq!(limits, (-0.5, 0.5));

    let limits = world
        .modify_joint(prismatic, |kind| match kind {
            JointKind::Prismatic(joint) => {
                joint.set_limits(2.0, -1.0);
                (joint.lower_limit(), joint.upper_limit())
            }
            _ => panic!("wrong joint kind"),
        })
        .unwrap();
    assert_eq!(limits, (-1.0, 2.0));

    let factor = world
        .modify_joint(motor, |kind| match kind {
            JointKind::Motor(joint) => {
                joint.set_correction_factor(1.5);
                joint.correction_factor()
            }
            _ => panic!("wrong joint kind"),
        })
        .unwrap();
    assert_eq!(factor, 1.0);

    let maxima = world
        .modify_joint(friction, |kind| match kind {
            JointKind::Friction(joint) => {
                joint.set_max_force(-3.0);
                joint.set_max_torque(-1.0);
                (joint.max_force(), joint.max_torque())
            }
            _ => panic!("wrong joint kind"),
        })
        .unwrap();
    assert_eq!(maxima, (0.0, 0.0));

    // reversed limits in a definition are reordered the same way
    let reversed = world
        .create_joint(
            &RevoluteJointDef::init(&world, base, body, Vec2::zero())
                .unwrap()
                .with_limits(1.0, -1.0)
                .into(),
        )
        .unwrap();
    let JointKind::Revolute(joint) = world.joint(reversed).unwrap().kind() else {
        panic!("wrong joint kind");
    };
    assert_eq!((joint.lower_limit(), joint.upper_limit()), (-1.0, 1.0));

    run(&mut world, 30);
    assert!(world.body(body).unwrap().position().mag().is_finite());
}

//
// queries
//

fn row_of_boxes() -> (World, Vec<FixtureKey>) {
    let mut world = World::default();
    let fixtures = [2.0, 4.0, 6.0]
        .iter()
        .map(|&x| {
            let body = world
                .create_body(&BodyDef::new_static().with_position(Vec2::new(x, 0.0)))
                .unwrap();
            let shape = PolygonShape::new_box(0.5, 0.5).unwrap();
            world.create_fixture(body, &FixtureDef::new(shape)).unwrap()
        })
        .collect();
    (world, fixtures)
}

#[test]
fn ray_cast_finds_closest_hit() {
    let (world, fixtures) = row_of_boxes();
    let mut closest: Option<(FixtureKey, Vec2, f64)> = None;
    world.ray_cast(Vec2::zero(), Vec2::new(10.0, 0.0), |fixture, point, normal, fraction| {
        assert!((normal - Vec2::new(-1.0, 0.0)).mag() < 1e-9);
        if closest.map_or(true, |(_, _, f)| fraction < f) {
            closest = Some((fixture, point, fraction));
        }
        fraction
    });
    let (fixture, point, fraction) = closest.unwrap();
    assert_eq!(fixture, fixtures[0]);
    assert!((point.x - 1.5).abs() < 1e-9);
    assert!((fraction - 0.15).abs() < 1e-9);
}

#[test]
fn ray_cast_can_ignore_and_stop() {
    let (world, fixtures) = row_of_boxes();

    let mut hits = 0;
    world.ray_cast(Vec2::zero(), Vec2::new(10.0, 0.0), |_, _, _, _| {
        hits += 1;
        1.0
    });
    assert_eq!(hits, 3);

    let mut closest: Option<(FixtureKey, f64)> = None;
    world.ray_cast(Vec2::zero(), Vec2::new(10.0, 0.0), |fixture, _, _, fraction| {
        if fixture == fixtures[0] {
            return -1.0;
        }
        if closest.map_or(true, |(_, f)| fraction < f) {
            closest = Some((fixture, fraction));
        }
        fraction
    });
    assert_eq!(closest.map(|(f, _)| f), Some(fixtures[1]));

    let mut calls = 0;
    world.ray_cast(Vec2::zero(), Vec2::new(10.0, 0.0), |_, _, _, _| {
        calls += 1;
        0.0
    });
    assert_eq!(calls, 1);
}

#[test]
fn aabb_query_reports_overlapping_fixtures() {
    let (world, fixtures) = row_of_boxes();

    let mut found = Vec::new();
    let region = Aabb {
        lower: Vec2::new(3.0, -1.0),
        upper: Vec2::new(7.0, 1.0),
    };
    world.query_aabb(&region, |fixture| {
        found.push(fixture);
        true
    });
    found.sort_by_key(|key| fixtures.iter().position(|f| f == key));
    assert_eq!(found, vec![fixtures[1], fixtures[2]]);

    let mut empty = true;
    let far = Aabb {
        lower: Vec2::new(-10.0, 10.0),
        upper: Vec2::new(-5.0, 20.0),
    };
    world.query_aabb(&far, |_| {
        empty = false;
        true
    });
    assert!(empty);
}

//! Islands are groups of bodies connected by touching contacts and joints.
//! Each island is solved on its own and can fall asleep as a whole.

use super::{
    body::{Body, BodyFlags, BodyKey, BodyType},
    callbacks::ContactListener,
    contact::{Contact, ContactKey},
    contact_solver::ContactSolver,
    fixture::Fixture,
    joint::{Joint, JointKey},
    time_step::{Position, SolverData, TimeStep, Velocity},
};
use crate::{
    math::Vec2,
    profiling::{Profile, Timer},
    settings::{
        ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, MAX_ROTATION, MAX_ROTATION_SQUARED,
        MAX_TRANSLATION, MAX_TRANSLATION_SQUARED, TIME_TO_SLEEP,
    },
};

use thunderdome as td;

/// Arena storage the island solver reads and writes.
pub(crate) struct IslandStorage<'a> {
    pub bodies: &'a mut td::Arena<Body>,
    pub fixtures: &'a td::Arena<Fixture>,
    pub contacts: &'a mut td::Arena<Contact>,
    pub joints: &'a mut td::Arena<Joint>,
    pub listener: Option<&'a mut dyn ContactListener>,
}

#[derive(Default)]
pub(crate) struct Island {
    pub bodies: Vec<BodyKey>,
    pub contacts: Vec<ContactKey>,
    pub joints: Vec<JointKey>,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
}

impl Island {
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    /// Add a body, assigning its index in the solver arrays.
    pub fn add_body(&mut self, key: BodyKey, body: &mut Body) {
        body.island_index = self.bodies.len();
        self.bodies.push(key);
    }

    #[inline]
    pub fn add_contact(&mut self, key: ContactKey) {
        self.contacts.push(key);
    }

    #[inline]
    pub fn add_joint(&mut self, key: JointKey) {
        self.joints.push(key);
    }

    /// Integrate velocities, solve constraints, integrate positions
    /// and put the island to sleep if it has come to rest.
    pub fn solve(
        &mut self,
        profile: &mut Profile,
        step: TimeStep,
        gravity: Vec2,
        allow_sleep: bool,
        storage: IslandStorage,
    ) {
        let IslandStorage {
            bodies,
            fixtures,
            contacts,
            joints,
            listener,
        } = storage;
        let mut timer = Timer::start();
        let h = step.dt;

        self.positions.clear();
        self.velocities.clear();

        // integrate velocities
        for key in &self.bodies {
            let body = &mut bodies[key.0];
            let c = body.sweep.c;
            let a = body.sweep.a;
            let mut v = body.linear_velocity;
            let mut w = body.angular_velocity;

            // store positions for continuous collision
            body.sweep.c0 = c;
            body.sweep.a0 = a;

            if body.body_type == BodyType::Dynamic {
                v += h * (body.gravity_scale * gravity + body.inv_mass * body.force);
                w += h * body.inv_i * body.torque;

                // Pade approximation of the damping ODE solution
                // v2 = v1 * 1 / (1 + c * dt), stable for large c
                v *= 1.0 / (1.0 + h * body.linear_damping);
                w *= 1.0 / (1.0 + h * body.angular_damping);
            }

            self.positions.push(Position { c, a });
            self.velocities.push(Velocity { v, w });
        }

        timer.reset();

        let mut contact_solver =
            ContactSolver::new(step, &self.contacts, contacts, fixtures, bodies);
        contact_solver.initialize_velocity_constraints(&self.positions, &self.velocities);
        if step.warm_starting {
            contact_solver.warm_start(&mut self.velocities);
        }

        let mut data = SolverData {
            step,
            positions: &mut self.positions,
            velocities: &mut self.velocities,
        };

        for key in &self.joints {
            joints[key.0].init_velocity_constraints(&mut data, bodies);
        }

        profile.solve_init += timer.millis();

        // solve velocity constraints
        timer.reset();
        for _ in 0..step.velocity_iterations {
            for key in &self.joints {
                joints[key.0].solve_velocity_constraints(&mut data);
            }
            contact_solver.solve_velocity_constraints(data.velocities);
        }

        // store impulses for warm starting
        contact_solver.store_impulses(contacts);
        profile.solve_velocity += timer.millis();

        integrate_positions(h, data.positions, data.velocities);

        // solve position constraints
        timer.reset();
        let mut position_solved = false;
        for _ in 0..step.position_iterations {
            let contacts_okay = contact_solver.solve_position_constraints(data.positions);

            let joints_okay = self.joints.iter().fold(true, |okay, key| {
                joints[key.0].solve_position_constraints(&mut data) && okay
            });

            if contacts_okay && joints_okay {
                // exit early if the position errors are small
                position_solved = true;
                break;
            }
        }

        // copy state buffers back to the bodies
        for (i, key) in self.bodies.iter().enumerate() {
            let body = &mut bodies[key.0];
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }

        profile.solve_position += timer.millis();

        report(&contact_solver, contacts, listener);

        if allow_sleep {
            let mut min_sleep_time = f64::MAX;

            let lin_tol_sq = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
            let ang_tol_sq = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

            for key in &self.bodies {
                let body = &mut bodies[key.0];
                if body.body_type == BodyType::Static {
                    continue;
                }

                if !body.flags.contains(BodyFlags::AUTO_SLEEP)
                    || body.angular_velocity * body.angular_velocity > ang_tol_sq
                    || body.linear_velocity.mag_sq() > lin_tol_sq
                {
                    body.sleep_time = 0.0;
                    min_sleep_time = 0.0;
                } else {
                    body.sleep_time += h;
                    min_sleep_time = min_sleep_time.min(body.sleep_time);
                }
            }

            if min_sleep_time >= TIME_TO_SLEEP && position_solved {
                for key in &self.bodies {
                    bodies[key.0].set_awake(false);
                }
            }
        }
    }

    /// Resolve a time of impact event between the bodies at `toi_index_a`
    /// and `toi_index_b`. Other bodies in the island are treated as static.
    pub fn solve_toi(
        &mut self,
        sub_step: TimeStep,
        toi_index_a: usize,
        toi_index_b: usize,
        storage: IslandStorage,
    ) {
        let IslandStorage {
            bodies,
            fixtures,
            contacts,
            listener,
            ..
        } = storage;
        debug_assert!(toi_index_a < self.bodies.len());
        debug_assert!(toi_index_b < self.bodies.len());

        self.positions.clear();
        self.velocities.clear();
        for key in &self.bodies {
            let body = &bodies[key.0];
            self.positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            self.velocities.push(Velocity {
                v: body.linear_velocity,
                w: body.angular_velocity,
            });
        }

        let mut contact_solver =
            ContactSolver::new(sub_step, &self.contacts, contacts, fixtures, bodies);

        // solve position constraints
        for _ in 0..sub_step.position_iterations {
            if contact_solver.solve_toi_position_constraints(
                &mut self.positions,
                toi_index_a,
                toi_index_b,
            ) {
                break;
            }
        }

        // Leap of faith to the new safe state: the TOI bodies start
        // their next sweep from here.
        for index in [toi_index_a, toi_index_b] {
            let body = &mut bodies[self.bodies[index].0];
            body.sweep.c0 = self.positions[index].c;
            body.sweep.a0 = self.positions[index].a;
        }

        // No warm starting is needed for TOI events because warm
        // starting impulses were applied in the discrete solver.
        contact_solver.initialize_velocity_constraints(&self.positions, &self.velocities);

        for _ in 0..sub_step.velocity_iterations {
            contact_solver.solve_velocity_constraints(&mut self.velocities);
        }

        // Don't store the TOI contact forces for warm starting
        // because they can be quite large.

        integrate_positions(sub_step.dt, &mut self.positions, &mut self.velocities);

        for (i, key) in self.bodies.iter().enumerate() {
            let body = &mut bodies[key.0];
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }

        report(&contact_solver, contacts, listener);
    }
}

/// Integrate positions, clamping velocities that would move a body
/// too far in one step.
fn integrate_positions(h: f64, positions: &mut [Position], velocities: &mut [Velocity]) {
    for (pos, vel) in positions.iter_mut().zip(velocities.iter_mut()) {
        let translation = h * vel.v;
        if translation.mag_sq() > MAX_TRANSLATION_SQUARED {
            vel.v *= MAX_TRANSLATION / translation.mag();
        }

        let rotation = h * vel.w;
        if rotation * rotation > MAX_ROTATION_SQUARED {
            vel.w *= MAX_ROTATION / rotation.abs();
        }

        pos.c += h * vel.v;
        pos.a += h * vel.w;
    }
}

/// Hand the solved impulses to the contact listener.
fn report(
    solver: &ContactSolver,
    contacts: &td::Arena<Contact>,
    listener: Option<&mut dyn ContactListener>,
) {
    let Some(listener) = listener else {
        return;
    };
    for (key, vc) in solver.contacts().iter().zip(&solver.velocity_constraints) {
        if let Some(contact) = contacts.get(key.0) {
            listener.post_solve(contact, &vc.impulse());
        }
    }
}

//! Global tuning constants of the engine.
//!
//! Units are meters, kilograms and seconds. The collision and solver tolerances
//! are tuned for moving objects between 0.1 and 10 meters in size.

use std::f64::consts::PI;

/// Maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Fattening of the AABBs stored in the broad phase,
/// allowing proxies to move a little without triggering a tree update.
pub const AABB_EXTENSION: f64 = 0.1;

/// Predictive fattening of broad phase AABBs in the direction of motion,
/// as a multiple of the displacement.
pub const AABB_MULTIPLIER: f64 = 2.0;

/// Collision and constraint tolerance. Chosen to be numerically significant
/// but visually insignificant.
pub const LINEAR_SLOP: f64 = 0.005;

/// Angular collision and constraint tolerance.
pub const ANGULAR_SLOP: f64 = 2.0 / 180.0 * PI;

/// The radius of the polygon/edge skin. Should not be modified,
/// making it smaller makes polygons have insufficient buffering for CCD.
pub const POLYGON_RADIUS: f64 = 2.0 * LINEAR_SLOP;

/// Maximum number of sub-steps per contact in continuous physics simulation.
pub const MAX_SUB_STEPS: u32 = 8;

/// Maximum number of contacts handled to solve a TOI impact.
pub const MAX_TOI_CONTACTS: usize = 32;

/// Relative velocity below which collisions are treated as inelastic.
pub const VELOCITY_THRESHOLD: f64 = 1.0;

/// Maximum linear position correction used when solving constraints.
pub const MAX_LINEAR_CORRECTION: f64 = 0.2;

/// Maximum angular position correction used when solving constraints.
pub const MAX_ANGULAR_CORRECTION: f64 = 8.0 / 180.0 * PI;

/// Maximum linear translation of a body per step.
/// Keeps the solver stable with very large velocities.
pub const MAX_TRANSLATION: f64 = 2.0;
pub const MAX_TRANSLATION_SQUARED: f64 = MAX_TRANSLATION * MAX_TRANSLATION;

/// Maximum angular rotation of a body per step.
pub const MAX_ROTATION: f64 = 0.5 * PI;
pub const MAX_ROTATION_SQUARED: f64 = MAX_ROTATION * MAX_ROTATION;

/// Fraction of overlap resolved per step. Should be less than one
/// so that the solver does not overshoot.
pub const BAUMGARTE: f64 = 0.2;
pub const TOI_BAUMGARTE: f64 = 0.75;

/// Time a body must be still before it can sleep.
pub const TIME_TO_SLEEP: f64 = 0.5;

/// A body cannot sleep if its linear velocity is above this tolerance.
pub const LINEAR_SLEEP_TOLERANCE: f64 = 0.01;

/// A body cannot sleep if its angular velocity is above this tolerance.
pub const ANGULAR_SLEEP_TOLERANCE: f64 = 2.0 / 180.0 * PI;

/// Mixing law for friction: the geometric mean.
#[inline]
pub fn mix_friction(friction1: f64, friction2: f64) -> f64 {
    (friction1 * friction2).sqrt()
}

/// Mixing law for restitution: the larger wins, so bouncy objects bounce off anything.
#[inline]
pub fn mix_restitution(restitution1: f64, restitution2: f64) -> f64 {
    restitution1.max(restitution2)
}

use crate::math::Vec2;

/// Parameters of one (sub)step handed down to the solvers.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct TimeStep {
    pub dt: f64,
    pub inv_dt: f64,
    /// `dt * inv_dt0`, used to rescale warm starting impulses when the step size varies.
    pub dt_ratio: f64,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
}

/// Center of mass position and angle of a body inside an island.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Position {
    pub c: Vec2,
    pub a: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Velocity {
    pub v: Vec2,
    pub w: f64,
}

/// Everything joints need to read and write while solving an island.
pub(crate) struct SolverData<'a> {
    pub step: TimeStep,
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

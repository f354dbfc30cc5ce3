//! Step timings and integration with the Tracy profiler.

/// Open a Tracy span that lasts until the end of the enclosing scope.
/// Compiles to nothing useful unless the `tracy` feature is enabled.
macro_rules! tracy_span {
    ($name:expr, $fn_name:expr) => {
        tracy_client::Client::running().map(|client| {
            client.span(
                tracy_client::span_location!(concat!($fn_name, ": ", $name)),
                0,
            )
        })
    };
}
pub(crate) use tracy_span;

/// Wall clock timings of the phases of the last time step, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Profile {
    pub step: f64,
    pub collide: f64,
    pub solve: f64,
    pub solve_init: f64,
    pub solve_velocity: f64,
    pub solve_position: f64,
    pub broadphase: f64,
    pub solve_toi: f64,
}

/// A simple stopwatch.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Timer(instant::Instant);

impl Timer {
    #[inline]
    pub fn start() -> Self {
        Timer(instant::Instant::now())
    }

    #[inline]
    pub fn reset(&mut self) {
        self.0 = instant::Instant::now();
    }

    /// Milliseconds since the timer was started or reset.
    #[inline]
    pub fn millis(&self) -> f64 {
        self.0.elapsed().as_secs_f64() * 1000.0
    }
}

//! Time of impact by conservative advancement along separating axes.

use super::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::{
    math::{self as m, Sweep, Transform, Vec2},
    settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES},
};

const MAX_ITERATIONS: usize = 20;
const MAX_ROOT_ITERATIONS: usize = 50;

#[derive(Clone, Copy, Debug)]
pub struct TOIInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Upper bound of the sweep interval, usually 1.
    pub t_max: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TOIState {
    #[default]
    Unknown,
    /// The iteration limit was reached before converging.
    Failed,
    /// The shapes already overlap at the start of the sweep.
    Overlapped,
    /// The shapes come within the target distance at `t`.
    Touching,
    /// The shapes never touch during the sweep.
    Separated,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TOIOutput {
    pub state: TOIState,
    pub t: f64,
}

//
// Separating axis functions
//

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

/// Separation of the two shapes along an axis chosen from the GJK simplex,
/// as a function of time.
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f64,
    ) -> Self {
        debug_assert!(0 < cache.count && cache.count < 3);

        let xf_a = sweep_a.get_transform(t1);
        let xf_b = sweep_b.get_transform(t1);

        let mut f = SeparationFunction {
            proxy_a,
            proxy_b,
            sweep_a,
            sweep_b,
            kind: SeparationKind::Points,
            local_point: Vec2::zero(),
            axis: Vec2::zero(),
        };

        if cache.count == 1 {
            let point_a = xf_a.apply(proxy_a.vertex(cache.index_a[0] as usize));
            let point_b = xf_b.apply(proxy_b.vertex(cache.index_b[0] as usize));
            f.axis = point_b - point_a;
            m::normalize(&mut f.axis);
        } else if cache.index_a[0] == cache.index_a[1] {
            // two points on B and one on A
            f.kind = SeparationKind::FaceB;
            let local_b1 = proxy_b.vertex(cache.index_b[0] as usize);
            let local_b2 = proxy_b.vertex(cache.index_b[1] as usize);

            f.axis = m::right_normal(local_b2 - local_b1);
            m::normalize(&mut f.axis);
            let normal = xf_b.q.apply(f.axis);

            f.local_point = 0.5 * (local_b1 + local_b2);
            let point_b = xf_b.apply(f.local_point);
            let point_a = xf_a.apply(proxy_a.vertex(cache.index_a[0] as usize));

            if (point_a - point_b).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        } else {
            // two points on A and one or two points on B
            f.kind = SeparationKind::FaceA;
            let local_a1 = proxy_a.vertex(cache.index_a[0] as usize);
            let local_a2 = proxy_a.vertex(cache.index_a[1] as usize);

            f.axis = m::right_normal(local_a2 - local_a1);
            m::normalize(&mut f.axis);
            let normal = xf_a.q.apply(f.axis);

            f.local_point = 0.5 * (local_a1 + local_a2);
            let point_a = xf_a.apply(f.local_point);
            let point_b = xf_b.apply(proxy_b.vertex(cache.index_b[0] as usize));

            if (point_b - point_a).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        }
        f
    }

    #[inline]
    fn transforms(&self, t: f64) -> (Transform, Transform) {
        (self.sweep_a.get_transform(t), self.sweep_b.get_transform(t))
    }

    /// Deepest points along the axis at time `t` and their separation.
    fn find_min_separation(&self, t: f64) -> (usize, usize, f64) {
        let (xf_a, xf_b) = self.transforms(t);
        match self.kind {
            SeparationKind::Points => {
                let index_a = self.proxy_a.support(xf_a.q.apply_inv(self.axis));
                let index_b = self.proxy_b.support(xf_b.q.apply_inv(-self.axis));
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (index_a, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let index_b = self.proxy_b.support(xf_b.q.apply_inv(-normal));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (0, index_b, (point_b - point_a).dot(normal))
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let index_a = self.proxy_a.support(xf_a.q.apply_inv(-normal));
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (index_a, 0, (point_a - point_b).dot(normal))
            }
        }
    }

    /// Separation of the given points along the axis at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f64) -> f64 {
        let (xf_a, xf_b) = self.transforms(t);
        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Compute the upper bound on time before two shapes penetrate.
///
/// Time is a fraction of the sweep interval `[0, t_max]`. The shapes are advanced
/// until their cores are within `max(LINEAR_SLOP, total_radius - 3 * LINEAR_SLOP)`
/// of each other, which leaves a little overlap for the contact solver to work with.
/// Rotation is handled, but a fast spinning shape may be missed.
pub fn time_of_impact(input: &TOIInput) -> TOIOutput {
    let mut output = TOIOutput {
        state: TOIState::Unknown,
        t: input.t_max,
    };

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    // large rotations can make the root finder fail, so normalize the sweep angles
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;
    let mut iter = 0;

    // prepare input for the distance query
    let mut cache = SimplexCache::default();
    let mut distance_input = DistanceInput {
        proxy_a: *proxy_a,
        proxy_b: *proxy_b,
        transform_a: Transform::identity(),
        transform_b: Transform::identity(),
        use_radii: false,
    };

    // the outer loop progressively attempts to compute new separating axes,
    // terminating when an axis is repeated (no progress is made)
    loop {
        distance_input.transform_a = sweep_a.get_transform(t1);
        distance_input.transform_b = sweep_b.get_transform(t1);

        // get the distance between the shapes. We can also use the results
        // to get a separating axis.
        let distance_output = distance(&mut cache, &distance_input);

        // if the shapes are overlapped, we give up on continuous collision
        if distance_output.distance <= 0.0 {
            output.state = TOIState::Overlapped;
            output.t = 0.0;
            break;
        }

        if distance_output.distance < target + tolerance {
            output.state = TOIState::Touching;
            output.t = t1;
            break;
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // resolve the deepest point. This loop is bounded by the number of vertices.
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back_iter = 0;
        loop {
            // find the deepest point at t2
            let (index_a, index_b, mut s2) = fcn.find_min_separation(t2);

            // is the final configuration separated?
            if s2 > target + tolerance {
                output.state = TOIState::Separated;
                output.t = t_max;
                done = true;
                break;
            }

            // has the separation reached tolerance?
            if s2 > target - tolerance {
                // advance the sweeps
                t1 = t2;
                break;
            }

            // initial separation of the witness points
            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // initial overlap can happen if the root finder runs out of iterations
            if s1 < target - tolerance {
                output.state = TOIState::Failed;
                output.t = t1;
                done = true;
                break;
            }

            // check for touching
            if s1 <= target + tolerance {
                // victory! t1 should hold the TOI (could be 0.0)
                output.state = TOIState::Touching;
                output.t = t1;
                done = true;
                break;
            }

            // compute the 1D root of f(x) - target = 0
            let mut root_iter = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                // mix the secant rule and bisection
                let t = if root_iter & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };
                root_iter += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    // t2 holds a tentative value for t1
                    t2 = t;
                    break;
                }

                // keep the root bracketed
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iter == MAX_ROOT_ITERATIONS {
                    break;
                }
            }

            push_back_iter += 1;
            if push_back_iter == MAX_POLYGON_VERTICES {
                break;
            }
        }

        iter += 1;

        if done {
            break;
        }

        if iter == MAX_ITERATIONS {
            // root finder got stuck. Semi-victory.
            output.state = TOIState::Failed;
            output.t = t1;
            break;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CircleShape, PolygonShape, Shape};

    fn sweep(from: Vec2, to: Vec2, a0: f64, a: f64) -> Sweep {
        Sweep {
            local_center: Vec2::zero(),
            c0: from,
            c: to,
            a0,
            a,
            alpha0: 0.0,
        }
    }

    #[test]
    fn head_on_circles_match_analytic_time() {
        let circle: Shape = CircleShape::new(0.5).unwrap().into();
        let input = TOIInput {
            proxy_a: DistanceProxy::new(&circle, 0),
            proxy_b: DistanceProxy::new(&circle, 0),
            sweep_a: sweep(Vec2::zero(), Vec2::zero(), 0.0, 0.0),
            sweep_b: sweep(Vec2::new(5.0, 0.0), Vec2::new(-5.0, 0.0), 0.0, 0.0),
            t_max: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, TOIState::Touching);
        // surfaces touch when the centers are 1 apart: 5 - 10 t = 1
        let analytic = 0.4;
        // the solver aims for 3 slops of overlap, within a quarter slop,
        // at a closing speed of 10
        let slack = 3.5 * LINEAR_SLOP / 10.0;
        assert!(output.t >= analytic, "{}", output.t);
        assert!(output.t - analytic <= slack, "{}", output.t);
    }

    #[test]
    fn passing_shapes_are_separated() {
        let circle: Shape = CircleShape::new(0.5).unwrap().into();
        let input = TOIInput {
            proxy_a: DistanceProxy::new(&circle, 0),
            proxy_b: DistanceProxy::new(&circle, 0),
            sweep_a: sweep(Vec2::zero(), Vec2::zero(), 0.0, 0.0),
            sweep_b: sweep(Vec2::new(5.0, 3.0), Vec2::new(-5.0, 3.0), 0.0, 0.0),
            t_max: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, TOIState::Separated);
        assert_eq!(output.t, 1.0);
    }

    #[test]
    fn overlapping_at_start() {
        let b: Shape = PolygonShape::new_box(1.0, 1.0).unwrap().into();
        let input = TOIInput {
            proxy_a: DistanceProxy::new(&b, 0),
            proxy_b: DistanceProxy::new(&b, 0),
            sweep_a: sweep(Vec2::zero(), Vec2::zero(), 0.0, 0.0),
            sweep_b: sweep(Vec2::new(0.5, 0.0), Vec2::new(3.0, 0.0), 0.0, 0.0),
            t_max: 1.0,
        };
        assert_eq!(time_of_impact(&input).state, TOIState::Overlapped);
    }

    #[test]
    fn rotating_box_hits_wall() {
        let wall: Shape = PolygonShape::new_box(0.1, 5.0).unwrap().into();
        let bullet: Shape = PolygonShape::new_box(0.25, 0.25).unwrap().into();
        let input = TOIInput {
            proxy_a: DistanceProxy::new(&wall, 0),
            proxy_b: DistanceProxy::new(&bullet, 0),
            sweep_a: sweep(Vec2::zero(), Vec2::zero(), 0.0, 0.0),
            sweep_b: sweep(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), 0.0, 1.0),
            t_max: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, TOIState::Touching);
        // the box reaches the wall somewhere before its center does
        assert!(output.t > 0.45 && output.t < 0.5, "{}", output.t);

        let xf_b = input.sweep_b.get_transform(output.t);
        let mut cache = SimplexCache::default();
        let d = distance(
            &mut cache,
            &DistanceInput {
                proxy_a: input.proxy_a,
                proxy_b: input.proxy_b,
                transform_a: Transform::identity(),
                transform_b: xf_b,
                use_radii: false,
            },
        );
        assert!(d.distance > 0.0 && d.distance < 2.0 * LINEAR_SLOP);
    }
}

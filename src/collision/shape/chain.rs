use super::EdgeShape;
use crate::{
    collision::{Aabb, RayCastInput, RayCastOutput},
    error::ShapeError,
    math::{self as m, Transform, Vec2},
    settings::{LINEAR_SLOP, POLYGON_RADIUS},
};

/// A free-form sequence of line segments, either open or closed into a loop.
/// Each segment is a child shape that collides like an [`EdgeShape`]
/// with its neighbors as ghost vertices.
///
/// Chains have no volume and should only be attached to static bodies.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct ChainShape {
    pub(crate) vertices: Vec<Vec2>,
    pub(crate) prev_vertex: Option<Vec2>,
    pub(crate) next_vertex: Option<Vec2>,
    pub(crate) radius: f64,
}

impl ChainShape {
    /// A closed loop. The last vertex is connected back to the first.
    pub fn new_loop(vertices: &[Vec2]) -> Result<Self, ShapeError> {
        if vertices.len() < 3 {
            return Err(ShapeError::TooFewVertices);
        }
        validate_spacing(vertices)?;
        if m::distance_sq(vertices[0], vertices[vertices.len() - 1]) <= LINEAR_SLOP * LINEAR_SLOP
        {
            return Err(ShapeError::ChainVerticesTooClose);
        }

        let mut vs = Vec::with_capacity(vertices.len() + 1);
        vs.extend_from_slice(vertices);
        vs.push(vertices[0]);
        let count = vs.len();
        Ok(ChainShape {
            prev_vertex: Some(vs[count - 2]),
            next_vertex: Some(vs[1]),
            vertices: vs,
            radius: POLYGON_RADIUS,
        })
    }

    /// An open chain with no ghost vertices at the ends.
    pub fn new_chain(vertices: &[Vec2]) -> Result<Self, ShapeError> {
        if vertices.len() < 2 {
            return Err(ShapeError::TooFewVertices);
        }
        validate_spacing(vertices)?;
        Ok(ChainShape {
            vertices: vertices.to_vec(),
            prev_vertex: None,
            next_vertex: None,
            radius: POLYGON_RADIUS,
        })
    }

    /// Ghost vertex before the first vertex, for connecting chains together.
    pub fn with_prev_vertex(mut self, v: Vec2) -> Self {
        self.prev_vertex = Some(v);
        self
    }

    /// Ghost vertex after the last vertex, for connecting chains together.
    pub fn with_next_vertex(mut self, v: Vec2) -> Self {
        self.next_vertex = Some(v);
        self
    }

    /// The vertices. For loops the first vertex is repeated at the end.
    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Number of segments.
    #[inline]
    pub fn child_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// Segment `index` as an edge with its neighbors filled in as ghost vertices.
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        debug_assert!(index < self.child_count());
        let vs = &self.vertices;
        let v0 = if index > 0 {
            Some(vs[index - 1])
        } else {
            self.prev_vertex
        };
        let v3 = if index + 2 < vs.len() {
            Some(vs[index + 2])
        } else {
            self.next_vertex
        };
        EdgeShape {
            v1: vs[index],
            v2: vs[index + 1],
            v0,
            v3,
            radius: self.radius,
        }
    }

    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        self.child_edge(child_index).ray_cast(input, xf)
    }

    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> Aabb {
        let v1 = xf.apply(self.vertices[child_index]);
        let v2 = xf.apply(self.vertices[child_index + 1]);
        Aabb::new(v1.min_by_component(v2), v1.max_by_component(v2)).padded(self.radius)
    }
}

fn validate_spacing(vertices: &[Vec2]) -> Result<(), ShapeError> {
    for pair in vertices.windows(2) {
        if !m::is_valid_vec(pair[0]) || !m::is_valid_vec(pair[1]) {
            return Err(ShapeError::ChainVerticesTooClose);
        }
        if m::distance_sq(pair[0], pair[1]) <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(ShapeError::ChainVerticesTooClose);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn loop_child_edges_wrap_around() {
        let chain = ChainShape::new_loop(&square()).unwrap();
        assert_eq!(chain.child_count(), 4);

        let first = chain.child_edge(0);
        assert_eq!(first.adjacent().0, Some(Vec2::new(0.0, 1.0)));
        assert_eq!(first.adjacent().1, Some(Vec2::new(1.0, 1.0)));

        let last = chain.child_edge(3);
        assert_eq!(last.vertices(), (Vec2::new(0.0, 1.0), Vec2::new(0.0, 0.0)));
        assert_eq!(last.adjacent().1, Some(Vec2::new(1.0, 0.0)));
    }

    #[test]
    fn open_chain_ends_have_no_ghosts() {
        let chain = ChainShape::new_chain(&square()).unwrap();
        assert_eq!(chain.child_count(), 3);
        assert_eq!(chain.child_edge(0).adjacent().0, None);
        assert_eq!(chain.child_edge(2).adjacent().1, None);

        let linked = chain.with_prev_vertex(Vec2::new(-1.0, 0.0));
        assert_eq!(linked.child_edge(0).adjacent().0, Some(Vec2::new(-1.0, 0.0)));
    }

    #[test]
    fn rejects_close_vertices() {
        let vs = [Vec2::new(0.0, 0.0), Vec2::new(0.001, 0.0), Vec2::new(1.0, 0.0)];
        assert_eq!(
            ChainShape::new_chain(&vs),
            Err(ShapeError::ChainVerticesTooClose)
        );
        assert_eq!(
            ChainShape::new_loop(&vs[..2]),
            Err(ShapeError::TooFewVertices)
        );
    }
}

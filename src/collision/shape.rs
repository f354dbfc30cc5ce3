//! Geometric primitives that can be attached to bodies.

use super::{Aabb, RayCastInput, RayCastOutput};
use crate::math::{Transform, Vec2};

mod circle;
pub use circle::CircleShape;
mod polygon;
pub use polygon::PolygonShape;
mod edge;
pub use edge::EdgeShape;
mod chain;
pub use chain::ChainShape;

/// Mass properties of a shape or body.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct MassData {
    pub mass: f64,
    /// Center of mass relative to the shape (or body) origin.
    pub center: Vec2,
    /// Rotational inertia about the shape (or body) origin.
    pub inertia: f64,
}

/// Discriminant of [`Shape`], used as the key of the manifold dispatch table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Circle = 0,
    Edge = 1,
    Polygon = 2,
    Chain = 3,
}

/// A collision shape. Geometry is fixed once constructed;
/// every constructor validates its input.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub enum Shape {
    Circle(CircleShape),
    Polygon(PolygonShape),
    Edge(EdgeShape),
    Chain(ChainShape),
}

impl Shape {
    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    /// Radius of the shape. For polygons, edges and chains this is the skin thickness.
    #[inline]
    pub fn radius(&self) -> f64 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Polygon(p) => p.radius(),
            Shape::Edge(e) => e.radius(),
            Shape::Chain(c) => c.radius(),
        }
    }

    /// Number of child primitives. Only chains have more than one.
    #[inline]
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(c) => c.child_count(),
            _ => 1,
        }
    }

    /// Test a world point for containment. Always false for edges and chains.
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        match self {
            Shape::Circle(c) => c.test_point(xf, p),
            Shape::Polygon(poly) => poly.test_point(xf, p),
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    /// Cast a ray against a child shape.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(c) => c.ray_cast(input, xf),
            Shape::Polygon(p) => p.ray_cast(input, xf),
            Shape::Edge(e) => e.ray_cast(input, xf),
            Shape::Chain(c) => c.ray_cast(input, xf, child_index),
        }
    }

    /// Bounding box of a child shape in world space.
    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> Aabb {
        match self {
            Shape::Circle(c) => c.compute_aabb(xf),
            Shape::Polygon(p) => p.compute_aabb(xf),
            Shape::Edge(e) => e.compute_aabb(xf),
            Shape::Chain(c) => c.compute_aabb(xf, child_index),
        }
    }

    /// Mass properties for the given density in kg/m^2.
    pub fn compute_mass(&self, density: f64) -> MassData {
        match self {
            Shape::Circle(c) => c.compute_mass(density),
            Shape::Polygon(p) => p.compute_mass(density),
            Shape::Edge(e) => e.compute_mass(),
            Shape::Chain(_) => MassData::default(),
        }
    }
}

impl From<CircleShape> for Shape {
    fn from(s: CircleShape) -> Self {
        Shape::Circle(s)
    }
}
impl From<PolygonShape> for Shape {
    fn from(s: PolygonShape) -> Self {
        Shape::Polygon(s)
    }
}
impl From<EdgeShape> for Shape {
    fn from(s: EdgeShape) -> Self {
        Shape::Edge(s)
    }
}
impl From<ChainShape> for Shape {
    fn from(s: ChainShape) -> Self {
        Shape::Chain(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_matches_variants() {
        let circle: Shape = CircleShape::new(0.5).unwrap().into();
        let chain: Shape = ChainShape::new_chain(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 1.0),
        ])
        .unwrap()
        .into();

        assert_eq!(circle.shape_type(), ShapeType::Circle);
        assert_eq!(circle.child_count(), 1);
        assert_eq!(chain.child_count(), 2);
        assert_eq!(chain.compute_mass(1.0).mass, 0.0);
        assert!(circle.test_point(&Transform::identity(), Vec2::new(0.2, 0.2)));
        assert!(!chain.test_point(&Transform::identity(), Vec2::new(0.5, 0.0)));
    }
}

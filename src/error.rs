//! Error types for operations on the physics world.

/// Reasons a shape can be rejected at construction time.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeError {
    #[error("A polygon needs at least 3 distinct vertices")]
    TooFewVertices,
    #[error("A polygon can have at most {} vertices", crate::settings::MAX_POLYGON_VERTICES)]
    TooManyVertices,
    #[error("The polygon vertices are collinear or too close together")]
    DegeneratePolygon,
    #[error("The radius is too small")]
    RadiusTooSmall,
    #[error("The edge has zero length")]
    DegenerateEdge,
    #[error("Chain vertices are too close together")]
    ChainVerticesTooClose,
}

/// Errors returned by mutating operations on a [`World`][crate::World].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsError {
    #[error("The world is locked in the middle of a time step")]
    Locked,
    #[error("The {0} this handle refers to no longer exists")]
    InvalidHandle(&'static str),
    #[error("Invalid shape: {0}")]
    InvalidShape(#[from] ShapeError),
    #[error("Invalid joint definition: {0}")]
    InvalidJoint(&'static str),
    #[error("Invalid mass data: {0}")]
    InvalidMassData(&'static str),
}

pub type Result<T> = std::result::Result<T, PhysicsError>;

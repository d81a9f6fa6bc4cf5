pub mod half_float;
pub mod quaternion;
pub mod vector2;
pub mod vector3;

pub use quaternion::Quaternion;
pub use vector2::Vector2;
pub use vector3::Vector3;

/// Lengths below this are treated as zero when normalizing or intersecting.
pub const EPSILON: f32 = 1e-6;

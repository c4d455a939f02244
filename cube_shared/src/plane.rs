//! Collision planes.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Half-space boundary: points with `offset - point·normal > 0` are inside
/// (penetrating) the plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionPlane {
    /// Unit normal pointing out of the solid side.
    pub normal: Vec3,
    pub offset: f32,
}

impl CollisionPlane {
    pub const fn new(normal: Vec3, offset: f32) -> Self {
        Self { normal, offset }
    }

    /// Penetration depth of `point`; positive means inside.
    pub fn penetration(&self, point: Vec3) -> f32 {
        self.offset - point.dot(self.normal)
    }

    /// Pushes `point` out along the normal until it is at least `radius` in
    /// front of the plane.
    pub fn clip(&self, point: &mut Vec3, radius: f32) {
        let depth = self.penetration(*point) + radius;
        if depth > 0.0 {
            *point += self.normal * depth;
        }
    }
}

/// Ground plane at y = 0.
pub fn ground() -> CollisionPlane {
    CollisionPlane::new(Vec3::new(0.0, 1.0, 0.0), 0.0)
}

/// Ground plus four walls `half_width` meters from the origin.
pub fn arena(half_width: f32) -> Vec<CollisionPlane> {
    vec![
        ground(),
        CollisionPlane::new(Vec3::new(1.0, 0.0, 0.0), -half_width),
        CollisionPlane::new(Vec3::new(-1.0, 0.0, 0.0), -half_width),
        CollisionPlane::new(Vec3::new(0.0, 0.0, 1.0), -half_width),
        CollisionPlane::new(Vec3::new(0.0, 0.0, -1.0), -half_width),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn penetration_sign() {
        let g = ground();
        assert!(g.penetration(Vec3::new(0.0, -0.5, 0.0)) > 0.0);
        assert!(g.penetration(Vec3::new(0.0, 0.5, 0.0)) < 0.0);
        assert_eq!(g.penetration(Vec3::new(3.0, 0.0, 1.0)), 0.0);
    }

    #[test]
    fn clip_pushes_out_to_radius() {
        let wall = CollisionPlane::new(Vec3::new(-1.0, 0.0, 0.0), -10.0);
        let mut p = Vec3::new(10.2, 1.0, 0.0);
        wall.clip(&mut p, 0.5);
        assert!((p.x - 9.5).abs() < 1e-5);

        let mut inside = Vec3::new(0.0, 1.0, 0.0);
        wall.clip(&mut inside, 0.5);
        assert_eq!(inside, Vec3::new(0.0, 1.0, 0.0));
    }
}

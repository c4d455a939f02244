//! Rigid body physics state.
//!
//! Primary quantities are integrated; secondary quantities are derived from
//! them by [`RigidBodyState::recalculate`] and are never sent over the wire.
//! Constants describe the cube and never change after construction.

use serde::{Deserialize, Serialize};

use crate::math::{Mat4, Quat, Vec3};

/// Squared distance (and squared quaternion difference) above which two states
/// differ "significantly".
pub const SNAP_THRESHOLD: f32 = 0.1 * 0.1;

/// Allowed drift of the orientation's squared length before it is renormalized.
pub const NORM_TOLERANCE: f32 = 1e-5;

/// Physics state of one cube.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidBodyState {
    // Primary.
    /// Center of mass in world coordinates (meters).
    pub position: Vec3,
    /// Linear momentum (kg·m/s).
    pub momentum: Vec3,
    /// Unit quaternion.
    pub orientation: Quat,
    pub angular_momentum: Vec3,

    // Secondary.
    #[serde(skip)]
    pub velocity: Vec3,
    /// Rate of change of `orientation`.
    #[serde(skip)]
    pub spin: Quat,
    #[serde(skip)]
    pub angular_velocity: Vec3,
    #[serde(skip)]
    pub body_to_world: Mat4,
    #[serde(skip)]
    pub world_to_body: Mat4,

    // Constant.
    /// Edge length (meters).
    pub size: f32,
    pub mass: f32,
    pub inverse_mass: f32,
    /// Scalar inertia; a uniform cube has the same inertia about every axis.
    pub inertia_tensor: f32,
    pub inverse_inertia_tensor: f32,
}

impl Default for RigidBodyState {
    fn default() -> Self {
        Self::cube(1.0, 1.0, Vec3::new(0.0, 40.0, 0.0))
    }
}

impl RigidBodyState {
    /// A cube at rest at `position` with identity orientation.
    pub fn cube(size: f32, mass: f32, position: Vec3) -> Self {
        let inertia_tensor = mass * size * size / 6.0;
        let mut state = Self {
            position,
            momentum: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            angular_momentum: Vec3::ZERO,
            velocity: Vec3::ZERO,
            spin: Quat::new(0.0, 0.0, 0.0, 0.0),
            angular_velocity: Vec3::ZERO,
            body_to_world: Mat4::IDENTITY,
            world_to_body: Mat4::IDENTITY,
            size,
            mass,
            inverse_mass: 1.0 / mass,
            inertia_tensor,
            inverse_inertia_tensor: 1.0 / inertia_tensor,
        };
        state.recalculate();
        state
    }

    /// Recomputes secondary quantities from primary quantities and constants.
    ///
    /// Must run after any change to primary state. Also renormalizes the
    /// orientation to counter integration drift; an orientation already within
    /// [`NORM_TOLERANCE`] of unit length is left as is, which keeps repeated
    /// calls bit-identical.
    pub fn recalculate(&mut self) {
        debug_assert!(!self.position.is_nan(), "position is NaN");
        debug_assert!(!self.momentum.is_nan(), "momentum is NaN");
        debug_assert!(!self.orientation.is_nan(), "orientation is NaN");
        debug_assert!(!self.angular_momentum.is_nan(), "angular momentum is NaN");

        self.velocity = self.momentum * self.inverse_mass;
        self.angular_velocity = self.angular_momentum * self.inverse_inertia_tensor;
        if (self.orientation.norm() - 1.0).abs() > NORM_TOLERANCE {
            self.orientation.normalize();
        }
        self.spin = 0.5 * Quat::from_vector(self.angular_velocity) * self.orientation;
        self.body_to_world = Mat4::translation(self.position) * self.orientation.to_mat4();
        self.world_to_body = self.body_to_world.inverse_rigid();
    }

    /// Returns true if `other` differs enough that a correction towards it
    /// should be a hard snap rather than a smoothed blend.
    pub fn compare(&self, other: &Self) -> bool {
        (other.position - self.position).len_sq() > SNAP_THRESHOLD
            || (other.orientation - self.orientation).norm() > SNAP_THRESHOLD
    }

    /// Half the edge length.
    pub fn half_extent(&self) -> f32 {
        self.size * 0.5
    }

    /// The eight cube corners in world space.
    pub fn corners(&self) -> [Vec3; 8] {
        let s = self.half_extent();
        [
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, 1.0, 1.0),
        ]
        .map(|corner| self.body_to_world.transform_point(corner * s))
    }

    /// Blends primary state between `a` (alpha 0) and `b` (alpha 1).
    ///
    /// Constants come from `b`.
    pub fn interpolate(a: &Self, b: &Self, alpha: f32) -> Self {
        let mut state = b.clone();
        state.position = a.position.lerp(b.position, alpha);
        state.momentum = a.momentum.lerp(b.momentum, alpha);
        state.orientation = Quat::slerp(a.orientation, b.orientation, alpha);
        state.angular_momentum = a.angular_momentum.lerp(b.angular_momentum, alpha);
        state.recalculate();
        state
    }
}

/// Equality over primary quantities only.
impl PartialEq for RigidBodyState {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.momentum == other.momentum
            && self.orientation == other.orientation
            && self.angular_momentum == other.angular_momentum
    }
}

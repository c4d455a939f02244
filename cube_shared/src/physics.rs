//! Force model.
//!
//! Forces are computed purely from state, input and collision planes so the
//! RK4 integrator can re-evaluate them at every intermediate stage. Nothing is
//! applied "once per update"; the curvature of these functions over a step is
//! what the integrator measures.
//!
//! Contributors run in a fixed order (gravity, damping, collision, control).
//! The order has no physical meaning but keeps float results reproducible.

use tracing::error;

use crate::{input::Input, math::Vec3, plane::CollisionPlane, state::RigidBodyState};

/// Downward acceleration; mass is 1 so it is applied as a force directly.
pub const GRAVITY: f32 = 9.8;

pub const LINEAR_DAMPING: f32 = 0.001;
pub const ANGULAR_DAMPING: f32 = 0.001;

/// Velocity constraint (braking) coefficient for closing contacts.
pub const CONTACT_BRAKING: f32 = 10.0;
/// Penetration spring stiffness.
pub const CONTACT_STIFFNESS: f32 = 100.0;
/// Penetration-scaled damping.
pub const CONTACT_DAMPING: f32 = 5.0;
/// Tangential (rolling-style) friction.
pub const CONTACT_FRICTION: f32 = 3.0;

pub const CONTROL_FORCE: f32 = 50.0;
pub const JUMP_TARGET_VELOCITY: f32 = 20.0;
pub const JUMP_FORCE_SCALE: f32 = 5.0;
/// Jumping is allowed while falling slower than this.
pub const JUMP_MIN_VERTICAL_VELOCITY: f32 = -0.1;
/// Lowest corner must be below this height to count as grounded.
pub const GROUNDED_HEIGHT: f32 = 0.05;

/// Accumulated force and torque acting on a body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Forces {
    pub force: Vec3,
    pub torque: Vec3,
}

impl Forces {
    /// Adds a contribution.
    ///
    /// NaN is a programming error: it asserts in debug builds; release builds
    /// drop the contribution so it never reaches the integrator.
    fn add(&mut self, force: Vec3, torque: Vec3) {
        debug_assert!(!force.is_nan(), "NaN force contribution");
        debug_assert!(!torque.is_nan(), "NaN torque contribution");
        if force.is_nan() || torque.is_nan() {
            error!(?force, ?torque, "discarding non-finite force contribution");
            return;
        }
        self.force += force;
        self.torque += torque;
    }

    /// Adds a force applied at `arm` from the center of mass.
    fn add_at(&mut self, force: Vec3, arm: Vec3) {
        self.add(force, arm.cross(force));
    }
}

/// Total force and torque on `state`.
pub fn forces(input: &Input, planes: &[CollisionPlane], state: &RigidBodyState) -> Forces {
    let mut out = Forces::default();
    gravity(&mut out);
    damping(state, &mut out);
    collision(planes, state, &mut out);
    control(input, state, &mut out);
    out
}

fn gravity(out: &mut Forces) {
    out.add(Vec3::new(0.0, -GRAVITY, 0.0), Vec3::ZERO);
}

/// Simple linear and angular energy loss.
fn damping(state: &RigidBodyState, out: &mut Forces) {
    out.add(
        -LINEAR_DAMPING * state.velocity,
        -ANGULAR_DAMPING * state.angular_velocity,
    );
}

/// Penalty collision response: every cube corner is tested against every plane.
fn collision(planes: &[CollisionPlane], state: &RigidBodyState, out: &mut Forces) {
    let corners = state.corners();
    for plane in planes {
        for &point in &corners {
            collision_for_point(state, point, plane, out);
        }
    }
}

/// Soft contact for one corner.
///
/// A penetrating point gets a braking force while it is still closing, a
/// tangential friction force, a spring pushing it out and a damping force
/// scaled by depth. The result allows slight interpenetration.
pub fn collision_for_point(
    state: &RigidBodyState,
    point: Vec3,
    plane: &CollisionPlane,
    out: &mut Forces,
) {
    let penetration = plane.penetration(point);
    if penetration <= 0.0 {
        return;
    }

    let arm = point - state.position;
    let velocity = state.angular_velocity.cross(arm) + state.velocity;
    let relative_speed = -plane.normal.dot(velocity);

    if relative_speed > 0.0 {
        out.add_at(plane.normal * (relative_speed * CONTACT_BRAKING), arm);
    }

    let tangential_velocity = velocity + plane.normal * relative_speed;
    out.add_at(-tangential_velocity * CONTACT_FRICTION, arm);

    out.add_at(plane.normal * (penetration * CONTACT_STIFFNESS), arm);

    out.add_at(
        plane.normal * (relative_speed * penetration * CONTACT_DAMPING),
        arm,
    );
}

/// Player control: lateral pushes plus a grounded jump.
///
/// The jump force chases a target velocity, `(target - vy) * scale`. It is a
/// force, not an impulse, and is kept that way on purpose.
fn control(input: &Input, state: &RigidBodyState, out: &mut Forces) {
    let mut push = Vec3::ZERO;
    if input.left {
        push.x -= CONTROL_FORCE;
    }
    if input.right {
        push.x += CONTROL_FORCE;
    }
    if input.forward {
        push.z -= CONTROL_FORCE;
    }
    if input.back {
        push.z += CONTROL_FORCE;
    }

    if input.jump && state.velocity.y >= JUMP_MIN_VERTICAL_VELOCITY {
        let difference = JUMP_TARGET_VELOCITY - state.velocity.y;
        let lowest = state
            .corners()
            .iter()
            .map(|c| c.y)
            .fold(f32::INFINITY, f32::min);
        if difference > 0.0 && lowest < GROUNDED_HEIGHT {
            push.y += difference * JUMP_FORCE_SCALE;
        }
    }

    out.add(push, Vec3::ZERO);
}

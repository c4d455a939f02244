//! Fixed-step RK4 integration of a [`RigidBodyState`].
//!
//! Each stage advances a tentative copy of the state by the previous stage's
//! derivative, recomputes secondary quantities, and re-evaluates forces there.

use crate::{
    input::Input,
    math::{Quat, Vec3},
    physics::{self, Forces},
    plane::CollisionPlane,
    state::RigidBodyState,
};

/// Time derivatives of the primary quantities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivative {
    /// d(position)/dt
    pub velocity: Vec3,
    /// d(momentum)/dt
    pub force: Vec3,
    /// d(orientation)/dt
    pub spin: Quat,
    /// d(angular momentum)/dt
    pub torque: Vec3,
}

impl Derivative {
    fn at(state: &RigidBodyState, forces: Forces) -> Self {
        Self {
            velocity: state.velocity,
            force: forces.force,
            spin: state.spin,
            torque: forces.torque,
        }
    }
}

/// Advances `state` by `dt` seconds under the cube force model.
pub fn integrate(input: &Input, planes: &[CollisionPlane], state: &mut RigidBodyState, dt: f32) {
    integrate_with(state, dt, |s| physics::forces(input, planes, s));
}

/// Advances `state` by `dt` seconds with an arbitrary state-derived force
/// function.
pub fn integrate_with<F>(state: &mut RigidBodyState, dt: f32, forces: F)
where
    F: Fn(&RigidBodyState) -> Forces,
{
    let a = Derivative::at(state, forces(&*state));
    let b = evaluate(state, dt * 0.5, &a, &forces);
    let c = evaluate(state, dt * 0.5, &b, &forces);
    let d = evaluate(state, dt, &c, &forces);

    let k = 1.0 / 6.0 * dt;
    state.position += k * (a.velocity + 2.0 * (b.velocity + c.velocity) + d.velocity);
    state.momentum += k * (a.force + 2.0 * (b.force + c.force) + d.force);
    state.orientation += k * (a.spin + 2.0 * (b.spin + c.spin) + d.spin);
    state.angular_momentum += k * (a.torque + 2.0 * (b.torque + c.torque) + d.torque);
    state.recalculate();
}

/// Derivative at `state` advanced `dt` seconds along `derivative`.
fn evaluate<F>(state: &RigidBodyState, dt: f32, derivative: &Derivative, forces: &F) -> Derivative
where
    F: Fn(&RigidBodyState) -> Forces,
{
    let mut ahead = state.clone();
    ahead.position += derivative.velocity * dt;
    ahead.momentum += derivative.force * dt;
    ahead.orientation += derivative.spin * dt;
    ahead.angular_momentum += derivative.torque * dt;
    ahead.recalculate();
    Derivative::at(&ahead, forces(&ahead))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::GRAVITY;
    use crate::plane::ground;

    fn gravity_only(_: &RigidBodyState) -> Forces {
        Forces {
            force: Vec3::new(0.0, -GRAVITY, 0.0),
            torque: Vec3::ZERO,
        }
    }

    #[test]
    fn free_fall_matches_closed_form() {
        let dt = 0.01;
        let mut state = RigidBodyState::default();
        let y0 = state.position.y;
        let steps = 100;
        for _ in 0..steps {
            integrate_with(&mut state, dt, gravity_only);
        }
        let t = dt * steps as f32;
        let expected_y = y0 - 0.5 * GRAVITY * t * t;
        let expected_vy = -GRAVITY * t;
        assert!((state.position.y - expected_y).abs() < 1e-3, "y = {}", state.position.y);
        assert!((state.velocity.y - expected_vy).abs() < 1e-3, "vy = {}", state.velocity.y);
    }

    #[test]
    fn harmonic_oscillator_error_shrinks_with_step() {
        // Spring along x with k = 10; exact solution x(t) = cos(sqrt(10) t).
        let spring = |s: &RigidBodyState| Forces {
            force: Vec3::new(-10.0 * s.position.x, 0.0, 0.0),
            torque: Vec3::ZERO,
        };
        let duration = 0.5;
        let error = |dt: f32| {
            let mut state = RigidBodyState::cube(1.0, 1.0, Vec3::new(1.0, 0.0, 0.0));
            let steps = (duration / dt).round() as usize;
            for _ in 0..steps {
                integrate_with(&mut state, dt, spring);
            }
            (state.position.x - (10f32.sqrt() * duration).cos()).abs()
        };
        let coarse = error(0.1);
        let fine = error(0.05);
        assert!(coarse < 1e-2);
        // Fourth order: halving dt cuts error by ~16x.
        assert!(fine < coarse / 8.0, "coarse {coarse} fine {fine}");
    }

    #[test]
    fn orientation_stays_unit_while_spinning() {
        let mut state = RigidBodyState::default();
        state.angular_momentum = Vec3::new(0.7, 2.0, -1.3);
        state.recalculate();
        let torque_free = |_: &RigidBodyState| Forces::default();
        for _ in 0..5_000 {
            integrate_with(&mut state, 0.01, torque_free);
            let norm = state.orientation.norm();
            assert!((norm - 1.0).abs() < 1e-4, "norm drifted to {norm}");
        }
    }

    #[test]
    fn cube_settles_on_ground() {
        let planes = [ground()];
        let mut state = RigidBodyState::default();
        let input = Input::default();
        // Resting means slow for a sustained stretch, not just at a bounce apex.
        let mut slow_steps = 0;
        for _ in 0..5_000 {
            integrate(&input, &planes, &mut state, 0.01);
            if state.velocity.y.abs() < 0.01 {
                slow_steps += 1;
            } else {
                slow_steps = 0;
            }
            if slow_steps >= 20 {
                break;
            }
        }
        assert!(slow_steps >= 20);
        // Four corners share the weight: 4 * k * depth = g.
        assert!((state.position.y - state.half_extent()).abs() < 0.05, "y = {}", state.position.y);
    }
}

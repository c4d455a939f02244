//! Cube and scene.
//!
//! A [`Cube`] keeps the current physics state plus the state one step earlier
//! so rendering can interpolate between fixed steps. A [`Scene`] owns one cube,
//! the collision planes, the active input and an integer step clock.

use tracing::trace;

use crate::{
    input::Input,
    integrator,
    math::Quat,
    plane::{self, CollisionPlane},
    render::{CubeKind, CubeView, RenderBackend},
    state::RigidBodyState,
};

/// Default fixed step in seconds.
pub const DEFAULT_DT: f32 = 0.01;

/// Distance from the origin to each arena wall.
pub const ARENA_HALF_WIDTH: f32 = 10.0;

/// One simulated cube with its previous state for interpolation.
#[derive(Debug, Clone)]
pub struct Cube {
    previous: RigidBodyState,
    current: RigidBodyState,
}

impl Default for Cube {
    fn default() -> Self {
        Self::new(RigidBodyState::default())
    }
}

impl Cube {
    pub fn new(state: RigidBodyState) -> Self {
        Self {
            previous: state.clone(),
            current: state,
        }
    }

    /// Integrates one step, keeping the pre-step state as `previous`.
    pub fn update(&mut self, input: &Input, planes: &[CollisionPlane], dt: f32) {
        self.previous = self.current.clone();
        integrator::integrate(input, planes, &mut self.current, dt);
    }

    /// Eases the pose towards `target`.
    ///
    /// Position and orientation move `tightness` of the way; momentum and
    /// angular momentum are taken from `target` directly.
    pub fn smooth(&mut self, target: &RigidBodyState, tightness: f32) {
        self.previous = self.current.clone();
        let mut next = target.clone();
        next.position = self.previous.position.lerp(target.position, tightness);
        next.orientation = Quat::slerp(self.previous.orientation, target.orientation, tightness);
        next.recalculate();
        self.current = next;
    }

    /// Replaces both current and previous state with `state`.
    pub fn snap(&mut self, state: &RigidBodyState) {
        self.current = state.clone();
        self.previous = state.clone();
    }

    pub fn state(&self) -> &RigidBodyState {
        &self.current
    }

    pub fn previous(&self) -> &RigidBodyState {
        &self.previous
    }

    /// State blended between previous (alpha 0) and current (alpha 1).
    pub fn interpolated(&self, alpha: f32) -> RigidBodyState {
        RigidBodyState::interpolate(&self.previous, &self.current, alpha)
    }

    /// Hands the interpolated pose to `sink`.
    pub fn render(&self, kind: CubeKind, alpha: f32, sink: &mut dyn RenderBackend) {
        sink.draw_cube(&CubeView::new(kind, &self.interpolated(alpha)));
    }
}

/// Deterministic single-cube simulation.
#[derive(Debug, Clone)]
pub struct Scene {
    cube: Cube,
    planes: Vec<CollisionPlane>,
    input: Input,
    time: u32,
    dt: f32,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(plane::arena(ARENA_HALF_WIDTH), DEFAULT_DT)
    }
}

impl Scene {
    /// A scene with the default cube dropped from its start height.
    pub fn new(planes: Vec<CollisionPlane>, dt: f32) -> Self {
        Self::with_state(RigidBodyState::default(), planes, dt)
    }

    pub fn with_state(state: RigidBodyState, planes: Vec<CollisionPlane>, dt: f32) -> Self {
        Self {
            cube: Cube::new(state),
            planes,
            input: Input::default(),
            time: 0,
            dt,
        }
    }

    /// Advances exactly one fixed step with the active input.
    pub fn update(&mut self) {
        self.cube.update(&self.input, &self.planes, self.dt);
        self.time += 1;
        trace!(time = self.time, position = ?self.cube.state().position, "scene step");
    }

    /// Hands the pose interpolated at `alpha` to `sink`.
    pub fn render(&self, kind: CubeKind, alpha: f32, sink: &mut dyn RenderBackend) {
        self.cube.render(kind, alpha, sink);
    }

    /// Sets the input used by subsequent steps.
    pub fn set_input(&mut self, input: Input) {
        self.input = input;
    }

    pub fn input(&self) -> Input {
        self.input
    }

    /// Number of fixed steps taken so far.
    pub fn time(&self) -> u32 {
        self.time
    }

    /// Moves the clock without simulating; used when adopting a state that
    /// belongs to another point in time.
    pub fn set_time(&mut self, time: u32) {
        self.time = time;
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn planes(&self) -> &[CollisionPlane] {
        &self.planes
    }

    pub fn cube(&self) -> &Cube {
        &self.cube
    }

    pub fn cube_mut(&mut self) -> &mut Cube {
        &mut self.cube
    }

    pub fn state(&self) -> &RigidBodyState {
        self.cube.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{math::Vec3, render::RecordingRenderer};

    #[test]
    fn update_advances_clock_and_keeps_previous() {
        let mut scene = Scene::default();
        let start = scene.state().clone();
        scene.update();
        assert_eq!(scene.time(), 1);
        assert_eq!(scene.cube().previous(), &start);
        assert!(scene.state().position.y < start.position.y);
    }

    #[test]
    fn identical_scenes_stay_identical() {
        let mut a = Scene::default();
        let mut b = Scene::default();
        let input = Input {
            right: true,
            ..Input::default()
        };
        a.set_input(input);
        b.set_input(input);
        for _ in 0..500 {
            a.update();
            b.update();
        }
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn smooth_converges_geometrically() {
        let mut cube = Cube::new(RigidBodyState::cube(1.0, 1.0, Vec3::ZERO));
        let target = RigidBodyState::cube(1.0, 1.0, Vec3::new(10.0, 0.0, 0.0));
        let mut calls = 0;
        while (cube.state().position - target.position).length() > 0.01 * 10.0 {
            cube.smooth(&target, 0.1);
            calls += 1;
            assert!(calls <= 50, "smoothing did not converge");
        }
        // 0.9^n <= 0.01 first holds at n = 44.
        assert!(calls >= 40);
    }

    #[test]
    fn smooth_takes_target_momentum_directly() {
        let mut cube = Cube::new(RigidBodyState::cube(1.0, 1.0, Vec3::ZERO));
        let mut target = RigidBodyState::cube(1.0, 1.0, Vec3::new(1.0, 0.0, 0.0));
        target.momentum = Vec3::new(0.0, 3.0, 0.0);
        target.recalculate();
        cube.smooth(&target, 0.1);
        assert_eq!(cube.state().momentum, target.momentum);
        assert_eq!(cube.state().velocity, target.velocity);
        assert!((cube.state().position.x - 0.1).abs() < 1e-6);
    }

    #[test]
    fn snap_converges_in_one_call() {
        let mut cube = Cube::default();
        let target = RigidBodyState::cube(1.0, 1.0, Vec3::new(3.0, 2.0, 1.0));
        cube.snap(&target);
        assert_eq!(cube.state(), &target);
        assert_eq!(cube.previous(), &target);
    }

    #[test]
    fn render_interpolates_between_steps() {
        let mut scene = Scene::default();
        scene.update();
        let mut sink = RecordingRenderer::default();
        sink.begin_frame();
        scene.render(CubeKind::Client, 0.5, &mut sink);
        sink.end_frame();

        let view = sink.last_frame()[0];
        let prev = scene.cube().previous().position.y;
        let cur = scene.state().position.y;
        assert!((view.position.y - 0.5 * (prev + cur)).abs() < 1e-5);
        assert_eq!(view.half_extent, 0.5);
        assert_eq!(view.kind, CubeKind::Client);
    }

    #[test]
    fn render_slerps_orientation_of_spinning_cube() {
        let mut state = RigidBodyState::cube(1.0, 1.0, Vec3::new(0.0, 10.0, 0.0));
        state.angular_momentum = Vec3::new(0.0, 2.0, 0.0);
        state.recalculate();
        let mut scene = Scene::with_state(state, Vec::new(), DEFAULT_DT);
        scene.update();

        let mut sink = RecordingRenderer::default();
        sink.begin_frame();
        scene.render(CubeKind::Client, 0.5, &mut sink);
        sink.end_frame();
        let view = sink.last_frame()[0];

        let prev = scene.cube().previous().orientation;
        let cur = scene.state().orientation;
        assert_ne!(prev, cur);
        let expected = Quat::slerp(prev, cur, 0.5);
        assert!((view.orientation - expected).norm() < 1e-10, "{:?} vs {expected:?}", view.orientation);

        // Starting from identity, halfway is half the rotation about y.
        let (cur_angle, _) = cur.angle_axis();
        assert!((view.angle - 0.5 * cur_angle).abs() < 1e-4);
        assert!((view.axis.y.abs() - 1.0).abs() < 1e-4);
    }
}

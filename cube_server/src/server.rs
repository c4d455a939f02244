//! Server implementation.
//!
//! The authoritative scene. It is driven by move messages from the client
//! carrying the client's step time and input, and advances its own cube up to
//! that time. It supports:
//! - Fixed-step catch-up (never a variable `dt`)
//! - Important-move replay to patch inputs lost in transit
//! - A diagnostic `snap` that forces a desync
//!
//! Determinism notes:
//! - The scene only ever advances by whole fixed steps.
//! - Client-sent state is advisory; only input is replayed.
//! - Important moves are applied in ascending time order.

use cube_shared::{
    input::Input,
    math::Vec3,
    net::{Move, Snapshot},
    plane::CollisionPlane,
    render::{CubeKind, RenderBackend},
    scene::Scene,
};
use tracing::{debug, info};

/// Radius kept between the snapped cube center and every plane.
const SNAP_CLEARANCE: f32 = 0.5;

/// Authoritative cube simulation.
#[derive(Debug, Clone, Default)]
pub struct Server {
    scene: Scene,
    /// Replay resent important moves before catching up.
    pub use_important_moves: bool,
}

impl Server {
    pub fn new(scene: Scene, use_important_moves: bool) -> Self {
        Self {
            scene,
            use_important_moves,
        }
    }

    /// Builds a default scene with the given planes and step.
    pub fn with_planes(planes: Vec<CollisionPlane>, dt: f32) -> Self {
        Self::new(Scene::new(planes, dt), false)
    }

    /// Advances the scene to `target_time` and adopts `input` from then on.
    ///
    /// With important moves enabled, each move newer than the scene is
    /// replayed first: the scene steps up to the move's time and then takes
    /// its input. Moves older than the scene clock were already simulated and
    /// are skipped.
    pub fn update(&mut self, target_time: u32, input: Input, important_moves: &[Move]) {
        if self.use_important_moves {
            let mut pending: Vec<&Move> = important_moves
                .iter()
                .filter(|m| m.time >= self.scene.time())
                .collect();
            pending.sort_by_key(|m| m.time);
            for m in pending {
                self.advance_to(m.time);
                if self.scene.input() != m.input {
                    debug!(time = m.time, input = ?m.input, "replaying important move");
                }
                self.scene.set_input(m.input);
            }
        }

        self.advance_to(target_time);
        self.scene.set_input(input);
    }

    fn advance_to(&mut self, time: u32) {
        while self.scene.time() < time {
            self.scene.update();
        }
    }

    /// Knocks the cube one meter along +x, kept clear of every plane.
    pub fn snap(&mut self) {
        let mut state = self.scene.state().clone();
        state.position += Vec3::new(1.0, 0.0, 0.0);
        for plane in self.scene.planes() {
            plane.clip(&mut state.position, SNAP_CLEARANCE);
        }
        state.recalculate();
        info!(time = self.scene.time(), position = ?state.position, "server snap");
        self.scene.cube_mut().snap(&state);
    }

    /// Current authoritative state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            time: self.scene.time(),
            state: self.scene.state().clone(),
        }
    }

    pub fn render(&self, alpha: f32, sink: &mut dyn RenderBackend) {
        self.scene.render(CubeKind::Server, alpha, sink);
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn time(&self) -> u32 {
        self.scene.time()
    }
}

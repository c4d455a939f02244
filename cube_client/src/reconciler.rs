//! Prediction and reconciliation.
//!
//! The client runs its own copy of the scene ahead of the server and records
//! each step in a [`MoveHistory`]. When an authoritative snapshot arrives it
//! is brought forward to the client's clock by replaying the recorded inputs,
//! and the local cube is snapped or smoothed towards that target.

use cube_shared::{
    config::ViewOptions,
    input::Input,
    net::{Move, Snapshot},
    render::{CubeKind, CubeView, RenderBackend},
    scene::{Cube, Scene},
    state::RigidBodyState,
};
use tracing::{debug, trace};

use crate::history::{MoveHistory, MAX_IMPORTANT_MOVES};

/// How a snapshot was applied to the local cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Prediction matched exactly.
    None,
    Smooth,
    Snap,
    /// Snapshot was older than one already applied.
    Stale,
}

/// Running totals of [`Correction`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionStats {
    pub exact: u64,
    pub smoothed: u64,
    pub snapped: u64,
    pub stale: u64,
}

impl CorrectionStats {
    fn record(&mut self, c: Correction) {
        match c {
            Correction::None => self.exact += 1,
            Correction::Smooth => self.smoothed += 1,
            Correction::Snap => self.snapped += 1,
            Correction::Stale => self.stale += 1,
        }
    }
}

/// Snap when `compare` says so, otherwise ease in.
fn correct(cube: &mut Cube, target: &RigidBodyState, tightness: f32) -> Correction {
    if cube.state() == target {
        Correction::None
    } else if cube.state().compare(target) {
        cube.snap(target);
        Correction::Snap
    } else {
        cube.smooth(target, tightness);
        Correction::Smooth
    }
}

/// Client-side predicted scene plus its reconciliation state.
#[derive(Debug, Clone)]
pub struct ClientReconciler {
    scene: Scene,
    history: MoveHistory,
    /// Raw last authoritative state.
    proxy: Cube,
    /// Proxy eased towards each authoritative state.
    smoothed_proxy: Cube,
    tightness: f32,
    last_snapshot: Option<u32>,
    stats: CorrectionStats,
}

impl ClientReconciler {
    pub fn new(scene: Scene, tightness: f32) -> Self {
        let start = scene.state().clone();
        Self {
            scene,
            history: MoveHistory::default(),
            proxy: Cube::new(start.clone()),
            smoothed_proxy: Cube::new(start),
            tightness,
            last_snapshot: None,
            stats: CorrectionStats::default(),
        }
    }

    /// Records the pre-step state with `input` and predicts one step.
    pub fn step(&mut self, input: Input) -> Move {
        let m = Move {
            time: self.scene.time(),
            state: self.scene.state().clone(),
            input,
        };
        self.history.push(m.clone());
        self.scene.set_input(input);
        self.scene.update();
        m
    }

    /// Recent input changes not yet covered by a snapshot.
    pub fn important_moves(&self) -> Vec<Move> {
        self.history.important_moves(MAX_IMPORTANT_MOVES)
    }

    /// Applies an authoritative snapshot.
    pub fn reconcile(&mut self, snapshot: &Snapshot) -> Correction {
        if self.last_snapshot.is_some_and(|last| snapshot.time < last) {
            trace!(time = snapshot.time, "ignoring stale snapshot");
            self.stats.record(Correction::Stale);
            return Correction::Stale;
        }
        self.last_snapshot = Some(snapshot.time);

        self.proxy.snap(&snapshot.state);
        correct(&mut self.smoothed_proxy, &snapshot.state, self.tightness);

        let target = self.replay(snapshot);
        let correction = correct(self.scene.cube_mut(), &target, self.tightness);
        match correction {
            Correction::Snap => debug!(
                time = snapshot.time,
                client_time = self.scene.time(),
                local = ?self.scene.state().position,
                "snapping to server state"
            ),
            Correction::Smooth => trace!(time = snapshot.time, "smoothing towards server state"),
            _ => {}
        }
        self.stats.record(correction);
        self.history.prune(snapshot.time);
        correction
    }

    /// Authoritative state carried forward to the client clock.
    ///
    /// Falls back to the raw snapshot state when the history no longer covers
    /// the snapshot time or the snapshot is not behind the client.
    fn replay(&self, snapshot: &Snapshot) -> RigidBodyState {
        let now = self.scene.time();
        if snapshot.time >= now {
            return snapshot.state.clone();
        }
        let Some(moves) = self.history.since(snapshot.time) else {
            debug!(time = snapshot.time, "history does not cover snapshot");
            return snapshot.state.clone();
        };

        let mut scratch = Scene::with_state(
            snapshot.state.clone(),
            self.scene.planes().to_vec(),
            self.scene.dt(),
        );
        scratch.set_time(snapshot.time);
        for m in moves.take_while(|m| m.time < now) {
            scratch.set_input(m.input);
            scratch.update();
        }
        scratch.state().clone()
    }

    /// Draws the enabled client-side views.
    pub fn render(&self, view: &ViewOptions, alpha: f32, sink: &mut dyn RenderBackend) {
        if view.render_history {
            for m in self.history.iter() {
                sink.draw_cube(&CubeView::new(CubeKind::History, &m.state));
            }
        }
        if view.render_proxy {
            self.proxy.render(CubeKind::Proxy, 1.0, sink);
        }
        if view.render_smoothed_proxy {
            self.smoothed_proxy.render(CubeKind::SmoothedProxy, alpha, sink);
        }
        if view.render_client {
            self.scene.render(CubeKind::Client, 1.0, sink);
        }
        if view.render_smoothed_client {
            self.scene.render(CubeKind::SmoothedClient, alpha, sink);
        }
    }

    pub fn set_tightness(&mut self, tightness: f32) {
        self.tightness = tightness;
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn state(&self) -> &RigidBodyState {
        self.scene.state()
    }

    pub fn time(&self) -> u32 {
        self.scene.time()
    }

    pub fn history(&self) -> &MoveHistory {
        &self.history
    }

    pub fn proxy(&self) -> &RigidBodyState {
        self.proxy.state()
    }

    pub fn smoothed_proxy(&self) -> &RigidBodyState {
        self.smoothed_proxy.state()
    }

    pub fn stats(&self) -> CorrectionStats {
        self.stats
    }
}

//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! A renderer receives fully interpolated cube poses once per displayed frame
//! and never reaches back into the simulation.

use crate::{
    math::{Quat, Vec3},
    state::RigidBodyState,
};

/// Which simulated copy of the cube a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeKind {
    /// Locally predicted client cube at the latest step.
    Client,
    /// Client cube interpolated between its last two steps.
    SmoothedClient,
    /// The server's own authoritative cube.
    Server,
    /// Last authoritative state received by the client.
    Proxy,
    /// Proxy eased towards each received state.
    SmoothedProxy,
    /// A recorded past client state.
    History,
}

/// Pose of one cube as handed to a renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeView {
    pub kind: CubeKind,
    pub position: Vec3,
    pub orientation: Quat,
    /// Rotation angle in radians, about `axis`.
    pub angle: f32,
    pub axis: Vec3,
    pub half_extent: f32,
}

impl CubeView {
    pub fn new(kind: CubeKind, state: &RigidBodyState) -> Self {
        let (angle, axis) = state.orientation.angle_axis();
        Self {
            kind,
            position: state.position,
            orientation: state.orientation,
            angle,
            axis,
            half_extent: state.half_extent(),
        }
    }
}

/// A minimal rendering API.
pub trait RenderBackend {
    fn begin_frame(&mut self);
    fn draw_cube(&mut self, view: &CubeView);
    fn end_frame(&mut self);
}

/// A no-op renderer useful for headless runs.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self) {}
    fn draw_cube(&mut self, _view: &CubeView) {}
    fn end_frame(&mut self) {}
}

/// Collects every frame's views; handy for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub frames: Vec<Vec<CubeView>>,
}

impl RecordingRenderer {
    /// Views of the most recently finished frame.
    pub fn last_frame(&self) -> &[CubeView] {
        self.frames.last().map(Vec::as_slice).unwrap_or_default()
    }
}

impl RenderBackend for RecordingRenderer {
    fn begin_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    fn draw_cube(&mut self, view: &CubeView) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(*view);
        }
    }

    fn end_frame(&mut self) {}
}

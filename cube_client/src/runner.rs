//! Real-time driver.
//!
//! Paces a [`Session`] at the configured display rate, feeding it the measured
//! wall-clock delta each frame and executing console lines as they arrive.

use std::time::Duration;

use cube_shared::render::RenderBackend;
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tracing::info;

use crate::session::Session;

/// Runs `session` until `quit` arrives or `max_frames` frames have been shown.
///
/// Console output and errors are handed to `on_output`. Returns the number of
/// frames rendered.
pub async fn run_realtime(
    session: &mut Session,
    mut commands: mpsc::Receiver<String>,
    sink: &mut dyn RenderBackend,
    max_frames: Option<u64>,
    mut on_output: impl FnMut(&str),
) -> anyhow::Result<u64> {
    let tick_hz = session.config().tick_hz.max(1);
    let tick = Duration::from_secs_f64(1.0 / f64::from(tick_hz));
    let report_every = u64::from(tick_hz) * 5;

    let mut last = Instant::now();
    let mut next_tick = last + tick;
    let mut frames = 0u64;

    loop {
        while let Ok(line) = commands.try_recv() {
            if matches!(line.trim(), "quit" | "exit") {
                info!(frames, "Quit requested");
                return Ok(frames);
            }
            match session.exec_console(&line) {
                Ok(output) => output.iter().for_each(|l| on_output(l.as_str())),
                Err(e) => on_output(&format!("Error: {e:#}")),
            }
        }

        let now = Instant::now();
        let delta = now.duration_since(last).as_secs_f32();
        last = now;
        let input = session.keys();
        session.frame(delta, input, sink)?;
        frames += 1;

        if frames % report_every == 0 {
            let client = session.client();
            info!(
                time = client.time(),
                position = ?client.state().position,
                server_time = session.server().time(),
                "Status"
            );
        }
        if max_frames.is_some_and(|max| frames >= max) {
            return Ok(frames);
        }

        sleep_until(next_tick).await;
        next_tick += tick;
    }
}

//! Client/server session.
//!
//! Runs the predicting client, the authoritative server and the simulated
//! link between them in one process. The session owns:
//! - A fixed-step accumulator driven by real frame time
//! - The console (cvars, `snap`, `status`, key commands)
//! - A [`Link`] whose latency and loss follow the config
//!
//! Each fixed step sends one move message and delivers whatever the link has
//! due in both directions, so the whole exchange is deterministic for a given
//! seed and frame sequence.

use anyhow::Context;
use cube_server::Server;
use cube_shared::{
    config::SimConfig,
    console::Console,
    input::Input,
    net::{decode_from_bytes, encode_to_bytes, Link, NetMsg},
    plane,
    render::RenderBackend,
    scene::{Scene, ARENA_HALF_WIDTH},
    timestep::FixedTimestep,
};
use tracing::{info, warn};

use crate::{
    input::HeldKeys,
    reconciler::{ClientReconciler, Correction},
};

/// In-process client, link and server.
#[derive(Debug)]
pub struct Session {
    config: SimConfig,
    pub console: Console,
    client: ClientReconciler,
    server: Server,
    link: Link,
    timestep: FixedTimestep,
    keys: HeldKeys,
}

impl Session {
    pub fn new(config: SimConfig) -> Self {
        let planes = plane::arena(ARENA_HALF_WIDTH);
        let client = ClientReconciler::new(Scene::new(planes.clone(), config.dt), config.tightness);
        let server = Server::new(Scene::new(planes, config.dt), config.use_important_moves);
        let link = Link::new(
            config.latency.one_way_secs(),
            config.packet_loss.probability(),
            config.seed,
        );

        let mut console = Console::new();
        config.register_cvars(&mut console);

        info!(
            dt = config.dt,
            latency = %config.latency,
            loss = %config.packet_loss,
            important_moves = config.use_important_moves,
            "Session started"
        );

        Self {
            timestep: FixedTimestep::new(config.dt),
            config,
            console,
            client,
            server,
            link,
            keys: HeldKeys::default(),
        }
    }

    /// Advances by `delta` seconds of wall time and renders one frame.
    ///
    /// Only whole fixed steps are simulated; the remainder carries over and
    /// sets the render interpolation factor.
    pub fn frame(&mut self, delta: f32, input: Input, sink: &mut dyn RenderBackend) -> anyhow::Result<()> {
        let steps = self.timestep.advance(delta);
        for _ in 0..steps {
            self.step(input)?;
        }
        self.render(self.timestep.alpha(), sink);
        Ok(())
    }

    /// One fixed step: predict, send, deliver both directions.
    pub fn step(&mut self, input: Input) -> anyhow::Result<()> {
        let current = self.client.step(input);
        let msg = NetMsg::Moves {
            current,
            important: self.client.important_moves(),
        };
        let now = self.now();
        self.link.to_server.send(now, encode_to_bytes(&msg).context("encode moves")?);

        for bytes in self.link.to_server.receive(now) {
            match decode_from_bytes(&bytes).context("decode client message")? {
                NetMsg::Moves { current, important } => {
                    self.server.update(current.time, current.input, &important);
                    let reply = NetMsg::Snapshot(self.server.snapshot());
                    self.link
                        .to_client
                        .send(now, encode_to_bytes(&reply).context("encode snapshot")?);
                }
                other => warn!(?other, "server ignoring unexpected message"),
            }
        }

        for bytes in self.link.to_client.receive(now) {
            match decode_from_bytes(&bytes).context("decode server message")? {
                NetMsg::Snapshot(snapshot) => {
                    if self.client.reconcile(&snapshot) == Correction::Snap {
                        info!(time = snapshot.time, "client snapped to server");
                    }
                }
                other => warn!(?other, "client ignoring unexpected message"),
            }
        }
        Ok(())
    }

    /// Simulated network clock in seconds.
    fn now(&self) -> f32 {
        self.client.time() as f32 * self.config.dt
    }

    /// Draws every enabled view at interpolation factor `alpha`.
    pub fn render(&self, alpha: f32, sink: &mut dyn RenderBackend) {
        sink.begin_frame();
        self.client.render(&self.config.view, alpha, sink);
        if self.config.view.render_server {
            self.server.render(alpha, sink);
        }
        sink.end_frame();
    }

    /// Executes a console line.
    pub fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return Ok(Vec::new());
        };

        match command {
            "snap" => {
                self.server.snap();
                Ok(vec!["Server cube snapped".to_string()])
            }
            "status" => Ok(self.status()),
            "net_cycle_latency" => {
                self.config.latency = self.config.latency.next();
                self.sync_cvars()?;
                Ok(vec![self.config.latency.to_string()])
            }
            "net_cycle_loss" => {
                self.config.packet_loss = self.config.packet_loss.next();
                self.sync_cvars()?;
                Ok(vec![self.config.packet_loss.to_string()])
            }
            key if self.keys.apply(key) => Ok(Vec::new()),
            _ => {
                let output = self.console.exec(line)?;
                if let Err(e) = self.config.apply_cvars(&self.console) {
                    // Put the console back in line with the config it rejected.
                    self.config.store_cvars(&mut self.console)?;
                    return Err(e);
                }
                self.apply_config();
                Ok(output)
            }
        }
    }

    fn sync_cvars(&mut self) -> anyhow::Result<()> {
        self.config.store_cvars(&mut self.console)?;
        self.apply_config();
        Ok(())
    }

    /// Pushes config changes into the link, server and client.
    fn apply_config(&mut self) {
        self.link.set_latency(self.config.latency.one_way_secs());
        self.link.set_loss(self.config.packet_loss.probability());
        self.server.use_important_moves = self.config.use_important_moves;
        self.client.set_tightness(self.config.tightness);
        info!(
            latency = %self.config.latency,
            loss = %self.config.packet_loss,
            important_moves = self.config.use_important_moves,
            tightness = self.config.tightness,
            "Config applied"
        );
    }

    pub fn status(&self) -> Vec<String> {
        let stats = self.client.stats();
        let (sent, dropped) = self.link.to_server.stats();
        let (replies, replies_dropped) = self.link.to_client.stats();
        vec![
            format!("Client time: {}", self.client.time()),
            format!("Server time: {}", self.server.time()),
            format!("Client position: {:?}", self.client.state().position),
            format!("Server position: {:?}", self.server.scene().state().position),
            format!("{}, {}", self.config.latency, self.config.packet_loss),
            format!("Important moves: {}", if self.config.use_important_moves { "on" } else { "off" }),
            format!("Moves sent: {} (dropped {})", sent, dropped),
            format!("Snapshots sent: {} (dropped {})", replies, replies_dropped),
            format!(
                "Corrections: {} exact, {} smoothed, {} snapped",
                stats.exact, stats.smoothed, stats.snapped
            ),
            format!("History: {} moves", self.client.history().len()),
        ]
    }

    /// Keys held through console key commands.
    pub fn keys(&self) -> Input {
        self.keys.input()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn client(&self) -> &ClientReconciler {
        &self.client
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn link(&self) -> &Link {
        &self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_shared::{
        config::{Latency, PacketLoss},
        render::{CubeKind, RecordingRenderer},
    };

    #[test]
    fn frame_runs_whole_steps_and_renders() {
        let mut session = Session::new(SimConfig::default());
        let mut sink = RecordingRenderer::default();
        session.frame(0.035, Input::default(), &mut sink).unwrap();
        assert_eq!(session.client().time(), 3);
        assert_eq!(sink.frames.len(), 1);
        assert_eq!(sink.last_frame().len(), 1);
        assert_eq!(sink.last_frame()[0].kind, CubeKind::Client);
    }

    #[test]
    fn perfect_link_keeps_server_one_step_behind() {
        let mut session = Session::new(SimConfig::default());
        for _ in 0..50 {
            session.step(Input::default()).unwrap();
        }
        assert_eq!(session.client().time(), 50);
        assert_eq!(session.server().time(), 49);
        assert_eq!(session.client().stats().snapped, 0);
        assert_eq!(session.client().stats().smoothed, 0);
    }

    #[test]
    fn console_updates_link_and_server() {
        let mut session = Session::new(SimConfig::default());
        session.exec_console("net_latency 200").unwrap();
        session.exec_console("sv_important_moves 1").unwrap();
        assert_eq!(session.config().latency, Latency::TwoHundredMs);
        assert!(session.server().use_important_moves);

        assert!(session.exec_console("net_latency 123").is_err());
        assert_eq!(session.config().latency, Latency::TwoHundredMs);
        assert_eq!(
            session.console.get_cvar("net_latency"),
            Some(cube_shared::console::CvarValue::Int(200))
        );

        session.exec_console("net_cycle_loss").unwrap();
        assert_eq!(session.config().packet_loss, PacketLoss::Five);
    }

    #[test]
    fn key_commands_and_snap() {
        let mut session = Session::new(SimConfig::default());
        session.exec_console("+right").unwrap();
        assert!(session.keys().right);
        session.exec_console("-right").unwrap();
        assert!(!session.keys().right);

        let before = session.server().snapshot().state.position.x;
        let out = session.exec_console("snap").unwrap();
        assert_eq!(out.len(), 1);
        assert!((session.server().snapshot().state.position.x - before - 1.0).abs() < 1e-6);
        assert!(session.exec_console("status").unwrap().len() > 5);
    }

    #[test]
    fn server_snap_is_corrected_on_client() {
        let mut session = Session::new(SimConfig::default());
        session.step(Input::default()).unwrap();
        session.exec_console("snap").unwrap();
        session.step(Input::default()).unwrap();
        assert_eq!(session.client().stats().snapped, 1);
    }
}

//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p cube_client -- [--config sim.json] [--latency 200] [--loss 10]
//!                               [--important-moves] [--seed 7] [--frames 600]
//!
//! Runs the predicting client and the authoritative server in one process,
//! joined by a simulated lossy link, and renders headlessly.
//!
//! Console commands:
//!   +left / -left (also right, forward, back, jump) - hold or release a key
//!   snap                - Knock the server cube out of sync
//!   status              - Show session status
//!   net_cycle_latency   - Step through 0/50/200/2000 ms
//!   net_cycle_loss      - Step through 0/5/10/50 % loss
//!   cvarlist, set, help - Inspect and change cvars
//!   quit                - Exit client

use std::env;
use std::io::{BufRead, Write};

use anyhow::{bail, Context};
use cube_client::{runner::run_realtime, session::Session};
use cube_shared::{
    config::{Latency, PacketLoss, SimConfig},
    render::NullRenderer,
};
use tokio::sync::mpsc;
use tracing::info;

struct Args {
    config: SimConfig,
    frames: Option<u64>,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().skip(1).collect();

    // The config file is the base; flags override it.
    let mut config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).context("--config needs a path")?;
            let text = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
            SimConfig::from_json_str(&text).with_context(|| format!("load {path}"))?
        }
        None => SimConfig::default(),
    };
    let mut frames = None;

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1).map(String::as_str);
        match (args[i].as_str(), value) {
            ("--config", Some(_)) => i += 2,
            ("--latency", Some(v)) => {
                config.latency = v.parse::<Latency>()?;
                i += 2;
            }
            ("--loss", Some(v)) => {
                config.packet_loss = v.parse::<PacketLoss>()?;
                i += 2;
            }
            ("--seed", Some(v)) => {
                config.seed = v.parse().with_context(|| format!("parse seed '{v}'"))?;
                i += 2;
            }
            ("--tick-hz", Some(v)) => {
                config.tick_hz = v.parse().with_context(|| format!("parse tick rate '{v}'"))?;
                i += 2;
            }
            ("--frames", Some(v)) => {
                frames = Some(v.parse().with_context(|| format!("parse frame count '{v}'"))?);
                i += 2;
            }
            ("--important-moves", _) => {
                config.use_important_moves = true;
                i += 1;
            }
            (other, _) => bail!("unrecognized argument '{other}'"),
        }
    }
    Ok(Args { config, frames })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Args { config, frames } = parse_args()?;
    info!(tick_hz = config.tick_hz, seed = config.seed, "Starting client");

    let mut session = Session::new(config);

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Type 'status' for info, '+right' / '-right' to push the cube, 'quit' to exit.");
    println!();

    let mut renderer = NullRenderer;
    let shown = run_realtime(&mut session, console_rx, &mut renderer, frames, |line| {
        println!("{}", line)
    })
    .await?;

    info!(frames = shown, "Client stopped");
    Ok(())
}

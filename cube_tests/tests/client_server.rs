//! End-to-end tests of prediction, replay and reconciliation over the
//! simulated link.

use cube_client::Session;
use cube_server::Server;
use cube_shared::{
    config::{Latency, PacketLoss, SimConfig},
    input::Input,
    net::{decode_from_bytes, encode_to_bytes, Move, NetMsg},
    scene::Scene,
    state::RigidBodyState,
};
use cube_tests::{init_tracing, right, run, server_at, zigzag};

fn config(latency: Latency, packet_loss: PacketLoss, use_important_moves: bool) -> SimConfig {
    SimConfig {
        latency,
        packet_loss,
        use_important_moves,
        seed: 7,
        ..SimConfig::default()
    }
}

/// Unit-style test: protocol messages roundtrip correctly.
#[test]
fn protocol_messages_roundtrip() -> anyhow::Result<()> {
    let m = Move {
        time: 12,
        state: RigidBodyState::default(),
        input: right(),
    };
    let moves = NetMsg::Moves {
        current: m.clone(),
        important: vec![m],
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&moves)?)?, moves);
    Ok(())
}

#[test]
fn perfect_link_never_corrects() -> anyhow::Result<()> {
    init_tracing();
    let mut session = Session::new(config(Latency::None, PacketLoss::None, false));
    let mut script = zigzag(37, 20);
    run(&mut session, &mut script, 700)?;

    let stats = session.client().stats();
    assert_eq!(stats.smoothed, 0);
    assert_eq!(stats.snapped, 0);
    assert_eq!(stats.exact, 700);

    // The client recorded the exact state the server is at now.
    let server = session.server().snapshot();
    let recorded = session
        .client()
        .history()
        .iter()
        .find(|m| m.time == server.time)
        .map(|m| m.state.clone());
    assert_eq!(recorded, Some(server.state));
    Ok(())
}

#[test]
fn latency_delays_snapshots() -> anyhow::Result<()> {
    let mut session = Session::new(config(Latency::TwoHundredMs, PacketLoss::None, false));
    let mut script = zigzag(37, 4);
    run(&mut session, &mut script, 5)?;
    assert_eq!(session.server().time(), 0);
    assert_eq!(session.client().stats(), Default::default());

    run(&mut session, &mut script, 100)?;
    assert!(session.server().time() > 0);
    assert!(session.client().stats().exact > 0);
    assert_eq!(session.client().stats().snapped, 0);
    assert_eq!(session.client().stats().smoothed, 0);
    Ok(())
}

#[test]
fn important_moves_keep_lossy_link_exact() -> anyhow::Result<()> {
    init_tracing();
    for (latency, loss) in [
        (Latency::None, PacketLoss::Ten),
        (Latency::FiftyMs, PacketLoss::Fifty),
        (Latency::TwoHundredMs, PacketLoss::Five),
    ] {
        let mut session = Session::new(config(latency, loss, true));
        let mut script = zigzag(37, 20);
        run(&mut session, &mut script, 700)?;

        let (_, dropped) = session.link().to_server.stats();
        assert!(dropped > 0, "{loss}: nothing was dropped");
        let stats = session.client().stats();
        assert_eq!(stats.smoothed + stats.snapped, 0, "{latency}, {loss}: {stats:?}");
        assert!(stats.exact > 0);
    }
    Ok(())
}

#[test]
fn loss_without_important_moves_corrects_and_converges() -> anyhow::Result<()> {
    init_tracing();
    let mut session = Session::new(config(Latency::None, PacketLoss::Fifty, false));
    let mut script = zigzag(5, 80);
    run(&mut session, &mut script, 400)?;

    let stats = session.client().stats();
    tracing::info!(?stats, "corrections under loss");
    assert!(stats.smoothed + stats.snapped > 0, "{stats:?}");

    session.exec_console("net_loss 0")?;
    let mut idle = cube_client::input::ScriptedInput::default();
    run(&mut session, &mut idle, 600)?;

    let client = session.client();
    let server = server_at(session.server(), client.time());
    assert!(!client.state().compare(&server), "client {:?} server {:?}", client.state().position, server.position);
    Ok(())
}

#[test]
fn server_snap_reaches_client() -> anyhow::Result<()> {
    let mut session = Session::new(config(Latency::FiftyMs, PacketLoss::None, false));
    let mut idle = cube_client::input::ScriptedInput::default();
    // Let the cube come to rest first.
    run(&mut session, &mut idle, 1000)?;
    let before = session.client().state().position.x;

    session.exec_console("snap")?;
    run(&mut session, &mut idle, 20)?;
    assert_eq!(session.client().stats().snapped, 1);
    assert!((session.client().state().position.x - before - 1.0).abs() < 0.05);
    Ok(())
}

#[test]
fn server_replay_is_deterministic() {
    let moves: Vec<Move> = (0..300u32)
        .filter(|t| t % 23 == 0)
        .enumerate()
        .map(|(i, time)| Move {
            time,
            state: RigidBodyState::default(),
            input: if i % 2 == 0 { right() } else { Input::default() },
        })
        .collect();

    let replay = || {
        let mut server = Server::new(Scene::default(), true);
        for m in &moves {
            server.update(m.time, m.input, &[]);
        }
        server.update(300, Input::default(), &[]);
        server.snapshot()
    };
    assert_eq!(replay(), replay());
}

#[test]
fn dropped_move_is_recovered_by_important_resend() {
    let inputs = [Input::default(), right(), right(), Input::default(), right(), right(), right()];
    let moves: Vec<Move> = inputs
        .iter()
        .enumerate()
        .map(|(i, &input)| Move {
            time: i as u32 * 10,
            state: RigidBodyState::default(),
            input,
        })
        .collect();

    let mut lossless = Server::new(Scene::default(), true);
    for m in &moves {
        lossless.update(m.time, m.input, &[]);
    }

    // Move 1 is lost; move 2 carries it as important.
    let mut lossy = Server::new(Scene::default(), true);
    for (i, m) in moves.iter().enumerate() {
        match i {
            1 => continue,
            2 => lossy.update(m.time, m.input, &moves[1..2]),
            _ => lossy.update(m.time, m.input, &[]),
        }
    }
    assert_eq!(lossy.snapshot(), lossless.snapshot());

    // Without the resend the server diverges.
    let mut naive = Server::new(Scene::default(), true);
    for (i, m) in moves.iter().enumerate() {
        if i != 1 {
            naive.update(m.time, m.input, &[]);
        }
    }
    assert_ne!(naive.snapshot(), lossless.snapshot());
}

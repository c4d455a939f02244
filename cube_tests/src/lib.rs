//! Helpers shared by the integration tests.

use cube_client::{input::InputSource, input::ScriptedInput, Session};
use cube_server::Server;
use cube_shared::{input::Input, state::RigidBodyState};

/// Installs a test-writer subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

pub fn right() -> Input {
    Input {
        right: true,
        ..Input::default()
    }
}

pub fn left() -> Input {
    Input {
        left: true,
        ..Input::default()
    }
}

pub fn jump_forward() -> Input {
    Input {
        jump: true,
        forward: true,
        ..Input::default()
    }
}

pub fn back() -> Input {
    Input {
        back: true,
        ..Input::default()
    }
}

/// Cycles through idle, right, left, jump+forward and back, changing every
/// `period` steps.
pub fn zigzag(period: u32, changes: u32) -> ScriptedInput {
    let cycle = [Input::default(), right(), left(), jump_forward(), back()];
    ScriptedInput::new(
        (0..changes)
            .map(|i| (i * period, cycle[i as usize % cycle.len()]))
            .collect(),
    )
}

/// Runs `steps` fixed steps with inputs from `source`.
pub fn run(session: &mut Session, source: &mut impl InputSource, steps: u32) -> anyhow::Result<()> {
    for _ in 0..steps {
        let input = source.sample(session.client().time());
        session.step(input)?;
    }
    Ok(())
}

/// Server state carried forward to `time` with the server's active input.
pub fn server_at(server: &Server, time: u32) -> RigidBodyState {
    let mut ahead = server.clone();
    let input = ahead.scene().input();
    ahead.update(time, input, &[]);
    ahead.snapshot().state
}

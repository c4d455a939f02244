//! Networking primitives.
//!
//! Goals:
//! - Provide the move and snapshot messages exchanged by client and server.
//! - Keep serialization explicit and versionable.
//! - Simulate an unreliable link (fixed latency, random loss, no reordering)
//!   in-process, so both ends run in one deterministic loop.
//!
//! There is no socket layer: the "network" is a pair of [`LossyChannel`]s
//! carrying encoded bytes.

use std::collections::VecDeque;

use anyhow::{bail, Context};
use bytes::Bytes;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{input::Input, state::RigidBodyState};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// One client control event.
///
/// `state` is the client's pre-step state at `time`. The server treats it as
/// advisory and replays `input` only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Move {
    pub time: u32,
    pub state: RigidBodyState,
    pub input: Input,
}

/// Authoritative state at a step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub time: u32,
    pub state: RigidBodyState,
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    /// Client -> server: the latest move plus redundant copies of recent
    /// important moves, oldest first.
    Moves {
        current: Move,
        important: Vec<Move>,
    },
    /// Server -> client: authoritative state.
    Snapshot(Snapshot),
}

impl NetMsg {
    /// Rebuilds derived quantities of every carried state.
    ///
    /// Only primary state travels on the wire.
    pub fn recalculate(&mut self) {
        match self {
            NetMsg::Moves { current, important } => {
                current.state.recalculate();
                for m in important {
                    m.state.recalculate();
                }
            }
            NetMsg::Snapshot(snapshot) => snapshot.state.recalculate(),
        }
    }
}

/// What actually goes on the wire: a message stamped with the protocol version.
#[derive(Serialize, Deserialize)]
struct Packet<M> {
    version: u32,
    msg: M,
}

/// Encodes a message for the wire.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let packet = Packet {
        version: PROTOCOL_VERSION,
        msg,
    };
    let payload = serde_json::to_vec(&packet).context("serialize")?;
    Ok(Bytes::from(payload))
}

/// Decodes a message and rebuilds its derived state.
///
/// Packets from a different protocol version are rejected.
pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    let packet: Packet<NetMsg> = serde_json::from_slice(b).context("deserialize")?;
    if packet.version != PROTOCOL_VERSION {
        bail!(
            "protocol version mismatch: got {}, expected {}",
            packet.version,
            PROTOCOL_VERSION
        );
    }
    let mut msg = packet.msg;
    msg.recalculate();
    Ok(msg)
}

/// One direction of a simulated unreliable link.
///
/// Messages are dropped with probability `loss` at send time; survivors are
/// delivered `latency` seconds later in send order.
#[derive(Debug)]
pub struct LossyChannel {
    latency: f32,
    loss: f32,
    rng: StdRng,
    in_flight: VecDeque<(f32, Bytes)>,
    sent: u64,
    dropped: u64,
}

impl LossyChannel {
    /// `loss` is a probability in [0, 1]; `latency` is one-way, in seconds.
    pub fn new(latency: f32, loss: f32, seed: u64) -> Self {
        Self {
            latency,
            loss: loss.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
            in_flight: VecDeque::new(),
            sent: 0,
            dropped: 0,
        }
    }

    /// A channel that delivers everything immediately.
    pub fn perfect() -> Self {
        Self::new(0.0, 0.0, 0)
    }

    pub fn set_latency(&mut self, latency: f32) {
        self.latency = latency.max(0.0);
    }

    pub fn set_loss(&mut self, loss: f32) {
        self.loss = loss.clamp(0.0, 1.0);
    }

    /// Sends `payload` at time `now`. Returns false if the packet was lost.
    pub fn send(&mut self, now: f32, payload: Bytes) -> bool {
        self.sent += 1;
        if self.loss > 0.0 && self.rng.gen::<f32>() < self.loss {
            self.dropped += 1;
            trace!(now, bytes = payload.len(), "packet dropped");
            return false;
        }
        // Never deliver before an earlier packet, even if latency dropped.
        let mut deliver_at = now + self.latency;
        if let Some(&(last, _)) = self.in_flight.back() {
            deliver_at = deliver_at.max(last);
        }
        self.in_flight.push_back((deliver_at, payload));
        true
    }

    /// Pops every payload due at or before `now`, oldest first.
    pub fn receive(&mut self, now: f32) -> Vec<Bytes> {
        let mut out = Vec::new();
        while let Some(&(deliver_at, _)) = self.in_flight.front() {
            if deliver_at > now {
                break;
            }
            if let Some((_, payload)) = self.in_flight.pop_front() {
                out.push(payload);
            }
        }
        out
    }

    /// Number of packets still travelling.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Total packets sent and how many of them were dropped.
    pub fn stats(&self) -> (u64, u64) {
        (self.sent, self.dropped)
    }
}

/// Both directions of the simulated client/server link.
#[derive(Debug)]
pub struct Link {
    pub to_server: LossyChannel,
    pub to_client: LossyChannel,
}

impl Link {
    /// Symmetric link; each direction gets its own loss sequence.
    pub fn new(latency: f32, loss: f32, seed: u64) -> Self {
        Self {
            to_server: LossyChannel::new(latency, loss, seed),
            to_client: LossyChannel::new(latency, loss, seed.wrapping_add(1)),
        }
    }

    pub fn set_latency(&mut self, latency: f32) {
        self.to_server.set_latency(latency);
        self.to_client.set_latency(latency);
    }

    pub fn set_loss(&mut self, loss: f32) {
        self.to_server.set_loss(loss);
        self.to_client.set_loss(loss);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    fn payload(tag: u8) -> Bytes {
        Bytes::from(vec![tag])
    }

    #[test]
    fn netmsg_roundtrip_bytes() {
        let mut state = RigidBodyState::default();
        state.momentum = Vec3::new(0.0, -2.0, 1.0);
        state.recalculate();
        let msg = NetMsg::Snapshot(Snapshot { time: 7, state });
        let bytes = encode_to_bytes(&msg).unwrap();
        let back = decode_from_bytes(&bytes).unwrap();
        assert_eq!(msg, back);

        let NetMsg::Snapshot(snapshot) = back else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.state.velocity, Vec3::new(0.0, -2.0, 1.0));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(decode_from_bytes(b"{not json").is_err());
    }

    #[test]
    fn packets_carry_and_check_the_version() {
        let msg = NetMsg::Snapshot(Snapshot {
            time: 3,
            state: RigidBodyState::default(),
        });
        let bytes = encode_to_bytes(&msg).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["version"], PROTOCOL_VERSION);

        value["version"] = serde_json::json!(PROTOCOL_VERSION + 1);
        let newer = serde_json::to_vec(&value).unwrap();
        let err = decode_from_bytes(&newer).unwrap_err();
        assert!(err.to_string().contains("protocol version mismatch"), "{err:#}");
    }

    #[test]
    fn delivers_after_latency_in_order() {
        let mut ch = LossyChannel::new(0.1, 0.0, 1);
        assert!(ch.send(0.0, payload(1)));
        assert!(ch.send(0.05, payload(2)));
        assert!(ch.receive(0.09).is_empty());
        assert_eq!(ch.receive(0.1), vec![payload(1)]);
        assert_eq!(ch.receive(1.0), vec![payload(2)]);
        assert_eq!(ch.in_flight(), 0);
    }

    #[test]
    fn lowering_latency_never_reorders() {
        let mut ch = LossyChannel::new(1.0, 0.0, 1);
        ch.send(0.0, payload(1));
        ch.set_latency(0.0);
        ch.send(0.1, payload(2));
        assert!(ch.receive(0.5).is_empty());
        assert_eq!(ch.receive(1.0), vec![payload(1), payload(2)]);
    }

    #[test]
    fn loss_rate_roughly_matches() {
        let mut ch = LossyChannel::new(0.0, 0.5, 42);
        let delivered = (0..2000).filter(|_| ch.send(0.0, payload(0))).count();
        assert!((800..1200).contains(&delivered), "delivered {delivered}");
        let (sent, dropped) = ch.stats();
        assert_eq!(sent, 2000);
        assert_eq!(dropped as usize, 2000 - delivered);
    }

    #[test]
    fn same_seed_drops_same_packets() {
        let pattern = |seed| {
            let mut ch = LossyChannel::new(0.0, 0.1, seed);
            (0..200).map(|_| ch.send(0.0, payload(0))).collect::<Vec<_>>()
        };
        assert_eq!(pattern(9), pattern(9));
    }
}

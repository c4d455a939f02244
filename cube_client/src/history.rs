//! Move history.
//!
//! Every predicted step is recorded as a [`Move`] (step time, pre-step state,
//! input). The history serves two purposes:
//! - replaying the client's own inputs on top of an authoritative snapshot;
//! - picking "important" moves (input changes) to resend until a snapshot
//!   covers them.

use std::collections::VecDeque;

use cube_shared::{input::Input, net::Move};

/// Default number of retained moves.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Upper bound on important moves attached to one outgoing message.
pub const MAX_IMPORTANT_MOVES: usize = 16;

/// Bounded, time-ordered ring of recent moves.
#[derive(Debug, Clone)]
pub struct MoveHistory {
    moves: VecDeque<Move>,
    capacity: usize,
    /// Input of the entry just before the oldest retained one.
    preceding_input: Input,
}

impl Default for MoveHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MoveHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            moves: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
            preceding_input: Input::default(),
        }
    }

    /// Appends a move. Times must be increasing.
    pub fn push(&mut self, m: Move) {
        debug_assert!(
            self.moves.back().map_or(true, |last| last.time < m.time),
            "moves must be pushed in time order"
        );
        self.moves.push_back(m);
        while self.moves.len() > self.capacity {
            self.pop_oldest();
        }
    }

    fn pop_oldest(&mut self) {
        if let Some(old) = self.moves.pop_front() {
            self.preceding_input = old.input;
        }
    }

    /// Drops every move older than `time`.
    pub fn prune(&mut self, time: u32) {
        while self.moves.front().is_some_and(|m| m.time < time) {
            self.pop_oldest();
        }
    }

    /// Returns the number of retained moves.
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Returns true if no moves are retained.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Move> {
        self.moves.iter()
    }

    /// Moves from `time` onwards, or `None` if `time` is older than anything
    /// retained.
    pub fn since(&self, time: u32) -> Option<impl Iterator<Item = &Move>> {
        let oldest = self.moves.front()?;
        if oldest.time > time {
            return None;
        }
        Some(self.moves.iter().filter(move |m| m.time >= time))
    }

    /// The most recent moves (at most `max`) whose input differs from the
    /// move before them, oldest first.
    pub fn important_moves(&self, max: usize) -> Vec<Move> {
        let mut previous = self.preceding_input;
        let mut important: Vec<&Move> = Vec::new();
        for m in &self.moves {
            if m.input != previous {
                important.push(m);
            }
            previous = m.input;
        }
        let skip = important.len().saturating_sub(max);
        important.into_iter().skip(skip).cloned().collect()
    }
}

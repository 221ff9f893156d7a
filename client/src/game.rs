//! The locally simulated game: the player's own board, falling piece,
//! preview queue and gravity timing.
//!
//! The simulation is authoritative for this player. Nothing here touches the
//! network; every mutation returns the [`GameEvent`]s it produced and the
//! network layer translates those into protocol messages. Movement of the
//! falling piece alone never produces an event, because the board proper only
//! holds settled cells.

use log::debug;
use rand::Rng;
use shared::board::Board;
use shared::piece::{random_shape, resolve_penalty_collision, try_rotate, Piece, Shape};
use std::collections::VecDeque;
use std::time::Duration;

/// Gravity interval: the falling piece descends one row this often.
pub const DROP_INTERVAL: Duration = Duration::from_millis(1000);

/// Number of upcoming shapes shown to the player.
pub const NEXT_QUEUE_LEN: usize = 3;

/// A player input, already mapped from whatever frontend produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    MoveLeft,
    MoveRight,
    Rotate,
    SoftDrop,
    HardDrop,
}

/// Something observable happened to the local simulation.
///
/// Events come out in the order they occurred, so a lock-in that clears rows
/// yields `LinesCleared` before the `BoardChanged` snapshot trigger, and a
/// top-out yields `GameOver` as the final event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Settled cells changed; the current board should be published.
    BoardChanged,
    /// This many full rows were just removed.
    LinesCleared(u32),
    /// The local player lost.
    GameOver,
}

/// The full state of the local player's simulation.
pub struct LocalGame {
    pub board: Board,
    pub piece: Piece,
    pub next_queue: VecDeque<Shape>,
    pub lines_cleared: u32,
    pub alive: bool,
    drop_counter: Duration,
}

impl LocalGame {
    pub fn new(rng: &mut impl Rng) -> Self {
        let mut next_queue = VecDeque::with_capacity(NEXT_QUEUE_LEN);
        for _ in 0..NEXT_QUEUE_LEN {
            next_queue.push_back(random_shape(rng));
        }

        LocalGame {
            board: Board::new(),
            piece: Piece::spawn(random_shape(rng)),
            next_queue,
            lines_cleared: 0,
            alive: true,
            drop_counter: Duration::ZERO,
        }
    }

    /// Discards everything and starts a fresh round.
    pub fn restart(&mut self, rng: &mut impl Rng) {
        *self = LocalGame::new(rng);
    }

    /// Applies one player input. Dead players' inputs are ignored.
    pub fn apply_intent(&mut self, intent: Intent, rng: &mut impl Rng) -> Vec<GameEvent> {
        if !self.alive {
            return Vec::new();
        }

        match intent {
            Intent::MoveLeft => {
                self.shift(-1);
                Vec::new()
            }
            Intent::MoveRight => {
                self.shift(1);
                Vec::new()
            }
            Intent::Rotate => {
                try_rotate(&mut self.piece, &self.board);
                Vec::new()
            }
            Intent::SoftDrop => self.drop_step(rng),
            Intent::HardDrop => {
                while !self
                    .board
                    .collides(&self.piece.shape, self.piece.x, self.piece.y + 1)
                {
                    self.piece.y += 1;
                }
                self.drop_step(rng)
            }
        }
    }

    /// Advances the gravity clock by `dt`, descending the piece once per
    /// elapsed [`DROP_INTERVAL`].
    pub fn advance(&mut self, dt: Duration, rng: &mut impl Rng) -> Vec<GameEvent> {
        if !self.alive {
            return Vec::new();
        }

        self.drop_counter += dt;
        let mut events = Vec::new();
        while self.drop_counter >= DROP_INTERVAL {
            self.drop_counter -= DROP_INTERVAL;
            events.extend(self.gravity_drop(rng));
            if !self.alive {
                break;
            }
        }
        events
    }

    /// Injects `count` garbage rows at the bottom and re-validates the
    /// falling piece against the raised stack.
    pub fn apply_penalty(&mut self, count: u32, rng: &mut impl Rng) -> Vec<GameEvent> {
        if !self.alive {
            return Vec::new();
        }

        self.board.apply_penalty(count, rng);

        let mut events = Vec::new();
        if resolve_penalty_collision(&mut self.piece, &self.board) {
            self.alive = false;
            events.push(GameEvent::GameOver);
        }
        events.push(GameEvent::BoardChanged);
        events
    }

    fn shift(&mut self, dx: i32) {
        if !self
            .board
            .collides(&self.piece.shape, self.piece.x + dx, self.piece.y)
        {
            self.piece.x += dx;
        }
    }

    /// One gravity tick without resetting the counter.
    fn gravity_drop(&mut self, rng: &mut impl Rng) -> Vec<GameEvent> {
        if self
            .board
            .collides(&self.piece.shape, self.piece.x, self.piece.y + 1)
        {
            self.lock_piece(rng)
        } else {
            self.piece.y += 1;
            Vec::new()
        }
    }

    /// A player-initiated descent, which also restarts the gravity clock.
    fn drop_step(&mut self, rng: &mut impl Rng) -> Vec<GameEvent> {
        self.drop_counter = Duration::ZERO;
        self.gravity_drop(rng)
    }

    /// Locks the piece into the board, sweeps full rows and spawns the next
    /// piece from the queue.
    fn lock_piece(&mut self, rng: &mut impl Rng) -> Vec<GameEvent> {
        if self
            .board
            .merge(&self.piece.shape, self.piece.x, self.piece.y)
        {
            // Locked while still above the visible board.
            self.alive = false;
            return vec![GameEvent::GameOver];
        }

        let mut events = Vec::new();
        let cleared = self.board.clear_lines();
        if cleared > 0 {
            // One trigger per row, the hook a clear sound would hang off.
            for _ in 0..cleared {
                debug!("line cleared");
            }
            self.lines_cleared += cleared;
            events.push(GameEvent::LinesCleared(cleared));
        }
        events.push(GameEvent::BoardChanged);

        let shape = match self.next_queue.pop_front() {
            Some(shape) => shape,
            None => random_shape(rng),
        };
        self.next_queue.push_back(random_shape(rng));
        self.piece = Piece::spawn(shape);

        if self
            .board
            .collides(&self.piece.shape, self.piece.x, self.piece.y)
        {
            self.alive = false;
            events.push(GameEvent::GameOver);
        }

        events
    }
}

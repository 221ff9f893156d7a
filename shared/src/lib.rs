//! Types and game logic shared between the blockfall server and client.
//!
//! The crate is split into four concerns:
//!
//! - [`board`]: the fixed 10x20 playfield and the pure operations on it
//!   (collision testing, piece lock-in, line clearing, garbage injection)
//! - [`piece`]: the seven canonical tetromino shapes, rotation, spawning
//!   and the wall-kick rotation attempt
//! - [`protocol`]: the [`Message`] sum type that makes up the wire protocol
//! - [`framing`]: the length-prefixed bincode frame codec used over TCP
//!
//! Both sides of the connection run the exact same engine code: the client
//! uses it to simulate its own board locally, the server trusts the client's
//! reported results and only relays them. Keeping the logic here is what
//! makes the two views agree.

pub mod board;
pub mod framing;
pub mod piece;
pub mod protocol;

pub use board::Board;
pub use piece::{random_shape, resolve_penalty_collision, try_rotate, Piece, PieceId, Shape};
pub use protocol::{GameFlags, Message, PlayerInfo};

/// Playfield width in cells.
pub const BOARD_WIDTH: usize = 10;
/// Playfield height in cells; row 0 is the top.
pub const BOARD_HEIGHT: usize = 20;
/// Cell value used for injected garbage rows.
pub const GARBAGE_CELL: u8 = 1;

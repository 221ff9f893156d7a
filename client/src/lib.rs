//! # Blockfall Client
//!
//! The player-side half of the game: a locally simulated board plus a view
//! of every opponent, kept in sync with the server over a framed TCP
//! connection.
//!
//! The client is authoritative for its own playfield. It runs the full
//! engine from the `shared` crate (gravity, movement, rotation, lock-in,
//! line clearing, garbage injection) and reports the results; the server
//! never second-guesses them. Opponent boards flow the other way and are
//! displayed exactly as received.
//!
//! ## Modules
//!
//! - [`game`]: the local simulation and its input/event model
//! - [`remote`]: passive snapshots of the other players
//! - [`network`]: the connection and the select loop tying it all together

pub mod game;
pub mod network;
pub mod remote;

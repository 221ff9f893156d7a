//! # Blockfall Game Server
//!
//! The authoritative coordinator for a multiplayer falling-block session.
//! Clients simulate their own boards; the server owns everything the players
//! have to agree on: the lobby roster, host privileges, the
//! waiting/running/reset lifecycle, line-clear tallies and garbage-penalty
//! routing. Board contents are relayed as reported, without validation.
//!
//! ## Architecture
//!
//! All state lives in a single [`session::Session`] mutated only from one
//! event loop. Network tasks never touch the session directly; they decode
//! frames and push [`network::SessionEvent`]s into a queue, and the session
//! answers every operation with a list of [`session::Effect`]s that the
//! network layer executes. Delayed work (the post-game lobby reset, the
//! disconnect grace-period purge) goes through the same queue, so there is
//! exactly one serialization point and no locking.
//!
//! ## Modules
//!
//! - [`session`]: the pure state machine - registry, host election,
//!   lifecycle transitions, penalty routing
//! - [`network`]: TCP accept/reader/writer tasks, the event loop, timers

pub mod network;
pub mod session;

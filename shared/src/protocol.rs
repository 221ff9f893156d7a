//! The wire protocol: one tagged sum type for every message either side can
//! send, serialized with bincode inside length-prefixed frames.
//!
//! Board and line-count updates carry the full current value rather than a
//! diff, so they stay idempotent under cross-connection reordering - there is
//! no ordering guarantee between two different players' update streams, only
//! within a single connection. There is no version field; schema changes are
//! breaking.

use crate::board::Board;
use serde::{Deserialize, Serialize};

/// Lobby-visible state of one player, as broadcast by the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: u32,
    pub name: String,
    pub active: bool,
    pub lines_cleared: u32,
}

/// Session lifecycle flags. `is_waiting` implies not running; a fully reset
/// session is waiting and not running.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct GameFlags {
    pub is_running: bool,
    pub is_waiting: bool,
}

/// Every message in the protocol, both directions.
///
/// The server is the sole author of identity-bearing events (join, loss,
/// disconnect, host change, lifecycle); `BoardUpdate` and `LineCleared`
/// contents are relayed from the reporting client without validation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Message {
    /// Server -> client: prompt for a display name after connecting.
    RequestName,
    /// Client -> server: register with the chosen name.
    SetName { name: String },
    /// Server -> newly registered client: its identity and the session view.
    Init {
        player_id: u32,
        is_host: bool,
        players: Vec<PlayerInfo>,
        flags: GameFlags,
    },
    /// Broadcast to everyone else when a player registers.
    PlayerJoined { player: PlayerInfo },
    /// Client -> server: host asks to start the game.
    StartGame,
    /// Broadcast: the session transitioned to running.
    GameStart,
    /// Full-board snapshot. Clients send it with their own id; the server
    /// rewrites the id from the connection before relaying, so a client can
    /// never claim another player's board slot.
    BoardUpdate { player_id: u32, board: Board },
    /// Client -> server: rows the sender just cleared.
    LineCleared { count: u32 },
    /// Broadcast: garbage assignment to one randomly chosen other player.
    Penalty {
        target_player_id: u32,
        count: u32,
        source_player_id: u32,
        source_name: String,
    },
    /// Client -> server: the sender's board topped out.
    GameOver,
    /// Broadcast: a player lost.
    PlayerLost { player_id: u32, player_name: String },
    /// Broadcast: a player's connection closed.
    PlayerDisconnected { player_id: u32, player_name: String },
    /// Server -> client: the receiver is now the host.
    BecomeHost,
    /// Broadcast: the lobby was restored after everyone lost.
    GameReset { players: Vec<PlayerInfo> },
    /// Server -> client: rejection notice, e.g. joining a running game.
    Error { message: String },
}

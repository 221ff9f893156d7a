//! Passive view of every other player in the session.
//!
//! The server is the only source of truth here: snapshots are stored as
//! received and never simulated forward. Because every update carries the
//! full board and tally, applying the latest message always yields the
//! correct view regardless of how updates from different players interleave.

use shared::board::Board;
use shared::protocol::PlayerInfo;
use std::collections::HashMap;

/// One opponent as last reported by the server.
#[derive(Debug, Clone)]
pub struct RemotePlayer {
    pub name: String,
    pub active: bool,
    pub lines_cleared: u32,
    pub board: Board,
}

impl RemotePlayer {
    fn from_info(info: &PlayerInfo) -> Self {
        RemotePlayer {
            name: info.name.clone(),
            active: info.active,
            lines_cleared: info.lines_cleared,
            board: Board::new(),
        }
    }
}

/// All opponents, keyed by the server-assigned player id.
#[derive(Debug, Default)]
pub struct RemoteBoards {
    players: HashMap<u32, RemotePlayer>,
}

impl RemoteBoards {
    pub fn new() -> Self {
        RemoteBoards {
            players: HashMap::new(),
        }
    }

    pub fn get(&self, player_id: u32) -> Option<&RemotePlayer> {
        self.players.get(&player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Replaces the whole roster, e.g. from `Init` or `GameReset`. The local
    /// player's own id is excluded since the local simulation owns that view.
    pub fn replace_roster(&mut self, players: &[PlayerInfo], own_id: u32) {
        self.players = players
            .iter()
            .filter(|info| info.id != own_id)
            .map(|info| (info.id, RemotePlayer::from_info(info)))
            .collect();
    }

    pub fn player_joined(&mut self, player: &PlayerInfo) {
        self.players
            .insert(player.id, RemotePlayer::from_info(player));
    }

    /// Stores a relayed board snapshot. Updates for unknown players are
    /// dropped; the roster messages are the only way players appear.
    pub fn board_update(&mut self, player_id: u32, board: Board) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.board = board;
        }
    }

    pub fn add_lines(&mut self, player_id: u32, count: u32) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.lines_cleared += count;
        }
    }

    pub fn player_lost(&mut self, player_id: u32) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.active = false;
        }
    }

    /// Handles a disconnect notice. Mid-game the player stays on screen as
    /// an inactive board; in the lobby they disappear immediately.
    pub fn player_disconnected(&mut self, player_id: u32, game_running: bool) {
        if game_running {
            if let Some(player) = self.players.get_mut(&player_id) {
                player.active = false;
            }
        } else {
            self.players.remove(&player_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u32, name: &str) -> PlayerInfo {
        PlayerInfo {
            id,
            name: name.to_string(),
            active: true,
            lines_cleared: 0,
        }
    }

    #[test]
    fn roster_replacement_excludes_the_local_player() {
        let mut remote = RemoteBoards::new();
        remote.replace_roster(&[info(1, "Alice"), info(2, "Bob")], 1);

        assert_eq!(remote.len(), 1);
        assert!(remote.get(1).is_none());
        assert_eq!(remote.get(2).map(|p| p.name.as_str()), Some("Bob"));
    }

    #[test]
    fn board_updates_only_apply_to_known_players() {
        let mut remote = RemoteBoards::new();
        remote.player_joined(&info(2, "Bob"));

        let mut board = Board::new();
        board.cells[19][0] = 7;
        remote.board_update(2, board.clone());
        remote.board_update(99, board.clone());

        assert_eq!(remote.get(2).map(|p| p.board.cells[19][0]), Some(7));
        assert!(remote.get(99).is_none());
    }

    #[test]
    fn disconnect_behavior_depends_on_game_state() {
        let mut remote = RemoteBoards::new();
        remote.player_joined(&info(2, "Bob"));
        remote.player_joined(&info(3, "Carol"));

        remote.player_disconnected(2, true);
        assert_eq!(remote.get(2).map(|p| p.active), Some(false));

        remote.player_disconnected(3, false);
        assert!(remote.get(3).is_none());
    }

    #[test]
    fn loss_and_line_tallies_accumulate() {
        let mut remote = RemoteBoards::new();
        remote.player_joined(&info(2, "Bob"));

        remote.add_lines(2, 3);
        remote.add_lines(2, 1);
        remote.player_lost(2);

        let bob = remote.get(2).unwrap();
        assert_eq!(bob.lines_cleared, 4);
        assert!(!bob.active);
    }
}

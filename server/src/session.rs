//! The authoritative session state machine.
//!
//! This module owns the player registry, host election and the
//! lobby/running/reset lifecycle, and nothing else: no sockets, no timers,
//! no channels. Every operation returns the [`Effect`]s the network layer
//! must carry out (sends, broadcasts, timer scheduling), which keeps the
//! whole state machine synchronously testable.
//!
//! All mutation goes through the server's single event queue, so no locking
//! is needed here. Transport handles are not stored on player records; the
//! network layer keeps its own id-to-sender map and looks handles up at
//! send time.

use log::info;
use rand::Rng;
use shared::{Board, GameFlags, Message, PlayerInfo};
use std::collections::HashMap;
use std::time::Duration;

/// Delay before the automatic lobby reset once every player has lost.
pub const RESET_DELAY: Duration = Duration::from_secs(5);
/// Grace period before a disconnected player's registry entry is purged.
/// Reconnection is not supported; this only delays cleanup.
pub const PURGE_DELAY: Duration = Duration::from_secs(5);

/// Side effects requested by a session operation, executed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Unicast to one registered player.
    Send { player_id: u32, message: Message },
    /// Send to every registered player, optionally excluding one.
    Broadcast {
        exclude: Option<u32>,
        message: Message,
    },
    /// Arm the delayed lobby reset ([`RESET_DELAY`]).
    ScheduleReset,
    /// Arm the delayed registry purge for one player ([`PURGE_DELAY`]).
    SchedulePurge { player_id: u32 },
}

/// Server-side record of one player.
///
/// `active` means still playing (flips on loss or disconnect); `connected`
/// tracks the transport. A disconnected record lingers until its purge timer
/// fires so that final-state broadcasts can still name the player.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub id: u32,
    pub name: String,
    pub active: bool,
    pub connected: bool,
    pub lines_cleared: u32,
    pub board: Board,
}

impl PlayerRecord {
    fn new(id: u32, name: String) -> Self {
        Self {
            id,
            name,
            active: true,
            connected: true,
            lines_cleared: 0,
            board: Board::new(),
        }
    }

    fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            active: self.active,
            lines_cleared: self.lines_cleared,
        }
    }
}

/// The single process-wide game session.
///
/// Invariants: at most one host, and `host_id` always references a present
/// registry entry (or is `None`). `is_waiting` implies `!is_running`. The
/// session is reset in place, never recreated.
pub struct Session {
    players: HashMap<u32, PlayerRecord>,
    host_id: Option<u32>,
    is_running: bool,
    is_waiting: bool,
    reset_pending: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            host_id: None,
            is_running: false,
            is_waiting: true,
            reset_pending: false,
        }
    }

    /// Whether a new connection may register right now.
    pub fn is_joinable(&self) -> bool {
        !(self.is_running && !self.is_waiting)
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_waiting(&self) -> bool {
        self.is_waiting
    }

    pub fn host_id(&self) -> Option<u32> {
        self.host_id
    }

    pub fn player(&self, id: u32) -> Option<&PlayerRecord> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Ids of every registered player, for broadcast fan-out.
    pub fn player_ids(&self) -> Vec<u32> {
        self.players.keys().copied().collect()
    }

    fn flags(&self) -> GameFlags {
        GameFlags {
            is_running: self.is_running,
            is_waiting: self.is_waiting,
        }
    }

    fn roster(&self) -> Vec<PlayerInfo> {
        self.players.values().map(PlayerRecord::info).collect()
    }

    fn all_inactive(&self) -> bool {
        self.players.values().all(|p| !p.active)
    }

    /// Schedules the delayed reset at most once until it fires.
    fn arm_reset(&mut self, effects: &mut Vec<Effect>) {
        if !self.reset_pending {
            self.reset_pending = true;
            effects.push(Effect::ScheduleReset);
        }
    }

    /// Registers a named player. The caller has already gated on
    /// [`Session::is_joinable`]; this is a no-op otherwise.
    ///
    /// The first registrant (more precisely: any registrant while no host
    /// exists) becomes host.
    pub fn register(&mut self, id: u32, name: String) -> Vec<Effect> {
        if !self.is_joinable() || self.players.contains_key(&id) {
            return Vec::new();
        }

        let record = PlayerRecord::new(id, name);
        info!("player {} ({}) registered", id, record.name);
        let joined = record.info();
        self.players.insert(id, record);

        if self.host_id.is_none() {
            self.host_id = Some(id);
            info!("player {} is now host", id);
        }

        vec![
            Effect::Send {
                player_id: id,
                message: Message::Init {
                    player_id: id,
                    is_host: self.host_id == Some(id),
                    players: self.roster(),
                    flags: self.flags(),
                },
            },
            Effect::Broadcast {
                exclude: Some(id),
                message: Message::PlayerJoined { player: joined },
            },
        ]
    }

    /// Host-only transition from waiting to running. Silently ignored for
    /// non-hosts and outside the lobby.
    pub fn start_game(&mut self, id: u32) -> Vec<Effect> {
        if self.host_id != Some(id) || !self.is_waiting {
            return Vec::new();
        }

        self.is_waiting = false;
        self.is_running = true;
        info!("game started by host {}", id);

        vec![Effect::Broadcast {
            exclude: None,
            message: Message::GameStart,
        }]
    }

    /// Stores a reported board snapshot and relays it to everyone else.
    /// The relayed id comes from the connection, never from the payload.
    pub fn board_update(&mut self, id: u32, board: Board) -> Vec<Effect> {
        let Some(player) = self.players.get_mut(&id) else {
            return Vec::new();
        };
        if !player.active {
            return Vec::new();
        }

        player.board = board.clone();

        vec![Effect::Broadcast {
            exclude: Some(id),
            message: Message::BoardUpdate {
                player_id: id,
                board,
            },
        }]
    }

    /// Credits reported clears to the sender and assigns the same count as
    /// garbage to one uniformly random other active player. No-op when the
    /// sender is the only active player left.
    pub fn line_cleared(&mut self, id: u32, count: u32, rng: &mut impl Rng) -> Vec<Effect> {
        let Some(player) = self.players.get_mut(&id) else {
            return Vec::new();
        };
        if !player.active {
            return Vec::new();
        }

        player.lines_cleared += count;
        let source_name = player.name.clone();

        let mut targets: Vec<u32> = self
            .players
            .values()
            .filter(|p| p.active && p.id != id)
            .map(|p| p.id)
            .collect();
        targets.sort_unstable();

        if targets.is_empty() {
            return Vec::new();
        }
        let target = targets[rng.gen_range(0..targets.len())];

        vec![Effect::Broadcast {
            exclude: None,
            message: Message::Penalty {
                target_player_id: target,
                count,
                source_player_id: id,
                source_name,
            },
        }]
    }

    /// Handles a self-reported loss. When the last active player falls, the
    /// delayed lobby reset is armed so final-state messages can propagate.
    pub fn game_over(&mut self, id: u32) -> Vec<Effect> {
        let Some(player) = self.players.get_mut(&id) else {
            return Vec::new();
        };
        if !player.active {
            return Vec::new();
        }

        player.active = false;
        let name = player.name.clone();
        info!("player {} ({}) lost", id, name);

        let mut effects = vec![Effect::Broadcast {
            exclude: None,
            message: Message::PlayerLost {
                player_id: id,
                player_name: name,
            },
        }];

        if self.all_inactive() {
            self.arm_reset(&mut effects);
        }
        effects
    }

    /// Handles a transport disconnect: the player turns inactive at once but
    /// stays in the registry until the purge timer fires. A departing host
    /// hands the role to the first remaining active player (lowest id), who
    /// is notified.
    pub fn disconnect(&mut self, id: u32) -> Vec<Effect> {
        let Some(player) = self.players.get_mut(&id) else {
            return Vec::new();
        };

        player.active = false;
        player.connected = false;
        let name = player.name.clone();
        info!("player {} ({}) disconnected", id, name);

        let mut effects = vec![Effect::Broadcast {
            exclude: None,
            message: Message::PlayerDisconnected {
                player_id: id,
                player_name: name,
            },
        }];

        if self.host_id == Some(id) {
            let mut candidates: Vec<u32> = self
                .players
                .values()
                .filter(|p| p.active)
                .map(|p| p.id)
                .collect();
            candidates.sort_unstable();

            if let Some(&new_host) = candidates.first() {
                self.host_id = Some(new_host);
                info!("host role transferred to player {}", new_host);
                effects.push(Effect::Send {
                    player_id: new_host,
                    message: Message::BecomeHost,
                });
            }
        }

        if self.all_inactive() {
            self.arm_reset(&mut effects);
        }

        effects.push(Effect::SchedulePurge { player_id: id });
        effects
    }

    /// Restores the lobby in place: connected players become active again
    /// with a fresh board and zero lines, disconnected ones are purged. The
    /// host id survives if its player does; otherwise it is cleared and only
    /// re-derived on a later disconnect.
    pub fn reset(&mut self) -> Vec<Effect> {
        self.is_running = false;
        self.is_waiting = true;
        self.reset_pending = false;

        self.players.retain(|_, p| p.connected);
        for player in self.players.values_mut() {
            player.active = true;
            player.lines_cleared = 0;
            player.board = Board::new();
        }

        if let Some(host) = self.host_id {
            if !self.players.contains_key(&host) {
                self.host_id = None;
            }
        }

        info!("session reset, {} player(s) back in lobby", self.players.len());

        vec![Effect::Broadcast {
            exclude: None,
            message: Message::GameReset {
                players: self.roster(),
            },
        }]
    }

    /// Removes a disconnected record once its grace period elapses. A
    /// record that is still connected is left alone.
    pub fn purge(&mut self, id: u32) {
        let disconnected = self.players.get(&id).is_some_and(|p| !p.connected);
        if !disconnected {
            return;
        }

        self.players.remove(&id);
        if self.host_id == Some(id) {
            self.host_id = None;
        }
        info!("purged registry entry for player {}", id);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

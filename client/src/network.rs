//! Client-side connection handling and the main event loop.
//!
//! The loop multiplexes three sources: frames from the server, commands from
//! the frontend (mapped inputs), and a timer that drives gravity. Local
//! simulation results are translated into protocol messages immediately, so
//! the server's view of this player lags by at most one round trip.

use crate::game::{GameEvent, Intent, LocalGame};
use crate::remote::RemoteBoards;
use log::{debug, error, info, warn};
use shared::framing::{read_message, write_message};
use shared::protocol::GameFlags;
use shared::Message;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};

/// What the frontend can ask for. Inputs during the lobby phase are dropped
/// here rather than at the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Intent(Intent),
    StartGame,
}

/// Everything the connected client knows: its identity, its own simulation
/// and the server-reported view of everyone else.
pub struct Client {
    write_half: OwnedWriteHalf,
    name: String,
    player_id: Option<u32>,
    is_host: bool,
    flags: GameFlags,
    game: LocalGame,
    remote: RemoteBoards,
    commands: mpsc::UnboundedReceiver<Command>,
    read_half: Option<tokio::net::tcp::OwnedReadHalf>,
}

impl Client {
    /// Connects and prepares the event loop. The returned client still has
    /// to be driven with [`Client::run`].
    pub async fn connect(
        addr: &str,
        name: String,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(addr).await?;
        info!("connected to {}", addr);
        let (read_half, write_half) = stream.into_split();

        Ok(Client {
            write_half,
            name,
            player_id: None,
            is_host: false,
            flags: GameFlags {
                is_running: false,
                is_waiting: true,
            },
            game: LocalGame::new(&mut rand::thread_rng()),
            remote: RemoteBoards::new(),
            commands,
            read_half: Some(read_half),
        })
    }

    /// Runs until the server closes the connection or sends a rejection.
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut read_half = match self.read_half.take() {
            Some(half) => half,
            None => return Err("client already running".into()),
        };

        // Frames are decoded in their own task; reading through `select!`
        // directly could drop a half-read frame on cancellation.
        let (inbound_tx, mut inbound) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match read_message(&mut read_half).await {
                    Ok(message) => {
                        if inbound_tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::InvalidData => {
                        warn!("undecodable message from server: {}", e);
                    }
                    Err(e) => {
                        if e.kind() != ErrorKind::UnexpectedEof {
                            debug!("read failed: {}", e);
                        }
                        break;
                    }
                }
            }
        });

        let mut ticker = interval(Duration::from_millis(50));
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                message = inbound.recv() => {
                    match message {
                        Some(message) => {
                            if !self.handle_message(message).await? {
                                return Ok(());
                            }
                        }
                        None => {
                            info!("server closed the connection");
                            return Ok(());
                        }
                    }
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let dt = now - last_tick;
                    last_tick = now;
                    if self.flags.is_running {
                        let events = self.game.advance(dt, &mut rand::thread_rng());
                        self.publish_events(events).await?;
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await?,
                        None => {
                            debug!("frontend closed, shutting down");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Handles one server message. Returns `false` when the session is over
    /// and the loop should exit.
    async fn handle_message(
        &mut self,
        message: Message,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        match message {
            Message::RequestName => {
                self.send(Message::SetName {
                    name: self.name.clone(),
                })
                .await?;
            }
            Message::Init {
                player_id,
                is_host,
                players,
                flags,
            } => {
                info!(
                    "registered as player {} ({} player(s) in session){}",
                    player_id,
                    players.len(),
                    if is_host { ", you are the host" } else { "" }
                );
                self.player_id = Some(player_id);
                self.is_host = is_host;
                self.flags = flags;
                self.remote.replace_roster(&players, player_id);
            }
            Message::PlayerJoined { player } => {
                info!("{} joined the session", player.name);
                self.remote.player_joined(&player);
            }
            Message::GameStart => {
                info!("game started");
                self.flags.is_running = true;
                self.flags.is_waiting = false;
                self.game.restart(&mut rand::thread_rng());
                // Publish the fresh board so everyone starts from the same view.
                self.publish_events(vec![GameEvent::BoardChanged]).await?;
            }
            Message::BoardUpdate { player_id, board } => {
                self.remote.board_update(player_id, board);
            }
            Message::Penalty {
                target_player_id,
                count,
                source_player_id,
                source_name,
            } => {
                if self.player_id != Some(source_player_id) {
                    self.remote.add_lines(source_player_id, count);
                }
                if self.player_id == Some(target_player_id) {
                    info!("{} sent you {} garbage row(s)", source_name, count);
                    let events = self.game.apply_penalty(count, &mut rand::thread_rng());
                    self.publish_events(events).await?;
                }
            }
            Message::PlayerLost {
                player_id,
                player_name,
            } => {
                if self.player_id != Some(player_id) {
                    info!("{} lost", player_name);
                    self.remote.player_lost(player_id);
                }
            }
            Message::PlayerDisconnected {
                player_id,
                player_name,
            } => {
                info!("{} disconnected", player_name);
                self.remote
                    .player_disconnected(player_id, self.flags.is_running);
            }
            Message::BecomeHost => {
                info!("you are now the host");
                self.is_host = true;
            }
            Message::GameReset { players } => {
                info!("session reset, back to the lobby");
                self.flags.is_running = false;
                self.flags.is_waiting = true;
                self.game.restart(&mut rand::thread_rng());
                if let Some(own_id) = self.player_id {
                    self.remote.replace_roster(&players, own_id);
                }
            }
            Message::Error { message } => {
                error!("rejected by server: {}", message);
                return Ok(false);
            }
            other => {
                debug!("ignoring unexpected server message {:?}", other);
            }
        }
        Ok(true)
    }

    async fn handle_command(
        &mut self,
        command: Command,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match command {
            Command::Intent(intent) => {
                if self.flags.is_running {
                    let events = self.game.apply_intent(intent, &mut rand::thread_rng());
                    self.publish_events(events).await?;
                }
            }
            Command::StartGame => {
                if self.is_host && self.flags.is_waiting {
                    self.send(Message::StartGame).await?;
                } else if !self.is_host {
                    info!("only the host can start the game");
                }
            }
        }
        Ok(())
    }

    /// Turns local simulation events into their protocol messages, in order.
    async fn publish_events(
        &mut self,
        events: Vec<GameEvent>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let player_id = match self.player_id {
            Some(id) => id,
            None => return Ok(()),
        };

        for event in events {
            match event {
                GameEvent::BoardChanged => {
                    self.send(Message::BoardUpdate {
                        player_id,
                        board: self.game.board.clone(),
                    })
                    .await?;
                }
                GameEvent::LinesCleared(count) => {
                    self.send(Message::LineCleared { count }).await?;
                }
                GameEvent::GameOver => {
                    info!("you lost");
                    self.send(Message::GameOver).await?;
                }
            }
        }
        Ok(())
    }

    async fn send(&mut self, message: Message) -> Result<(), Box<dyn std::error::Error>> {
        write_message(&mut self.write_half, &message).await?;
        Ok(())
    }
}

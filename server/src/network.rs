//! TCP network layer: connection handling and the single event loop that
//! serializes every session mutation.
//!
//! Each accepted connection gets a reader task (decodes frames into
//! [`SessionEvent`]s) and a writer task (drains a per-connection channel).
//! The main loop owns the [`Session`] and the id-to-sender map and handles
//! one event to completion at a time, so the state machine never needs a
//! lock. Delayed resets and purges are spawned sleeps that re-enter the same
//! event queue.

use crate::session::{Effect, Session, PURGE_DELAY, RESET_DELAY};
use log::{debug, error, info, warn};
use shared::framing::{read_message, write_message};
use shared::Message;
use std::collections::HashMap;
use std::io::ErrorKind;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Events funneled into the main loop. Everything that can touch the
/// session arrives here, including timer expirations.
#[derive(Debug)]
pub enum SessionEvent {
    Connected {
        conn_id: u32,
        sender: mpsc::UnboundedSender<Message>,
    },
    MessageReceived {
        conn_id: u32,
        message: Message,
    },
    Disconnected {
        conn_id: u32,
    },
    ResetTimerFired,
    PurgeTimerFired {
        player_id: u32,
    },
}

/// The game server: listener, session state machine and outbound handles.
pub struct Server {
    /// Taken by [`Server::run`], which moves it into the accept task.
    listener: Option<TcpListener>,
    session: Session,
    /// Outbound channel per connection, looked up at send time. A missing or
    /// closed entry means the transport is gone and the send is skipped.
    senders: HashMap<u32, mpsc::UnboundedSender<Message>>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    event_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Server {
    pub async fn new(addr: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(addr).await?;
        info!("server listening on {}", addr);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            session: Session::new(),
            senders: HashMap::new(),
            event_tx,
            event_rx,
        })
    }

    /// The bound listen address, useful when binding to port 0.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        match &self.listener {
            Some(listener) => listener.local_addr(),
            None => Err(std::io::Error::new(
                ErrorKind::NotConnected,
                "server is already running",
            )),
        }
    }

    /// Runs the accept loop and the event loop until the process ends.
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => return Err("server already running".into()),
        };
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut next_conn_id: u32 = 0;
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        next_conn_id += 1;
                        debug!("connection {} accepted from {}", next_conn_id, addr);
                        spawn_connection(next_conn_id, stream, event_tx.clone());
                    }
                    Err(e) => {
                        error!("accept failed: {}", e);
                    }
                }
            }
        });

        while let Some(event) = self.event_rx.recv().await {
            match event {
                SessionEvent::Connected { conn_id, sender } => {
                    self.handle_connected(conn_id, sender);
                }
                SessionEvent::MessageReceived { conn_id, message } => {
                    self.handle_message(conn_id, message);
                }
                SessionEvent::Disconnected { conn_id } => {
                    let effects = self.session.disconnect(conn_id);
                    self.senders.remove(&conn_id);
                    self.apply_effects(effects);
                }
                SessionEvent::ResetTimerFired => {
                    let effects = self.session.reset();
                    self.apply_effects(effects);
                }
                SessionEvent::PurgeTimerFired { player_id } => {
                    self.session.purge(player_id);
                }
            }
        }

        Ok(())
    }

    /// Gates a fresh connection on the session lifecycle: reject with an
    /// error while a game is running, otherwise prompt for a name.
    fn handle_connected(&mut self, conn_id: u32, sender: mpsc::UnboundedSender<Message>) {
        if !self.session.is_joinable() {
            info!("connection {} rejected: game in progress", conn_id);
            let _ = sender.send(Message::Error {
                message: "game in progress, joining is not possible right now".to_string(),
            });
            // Dropping the sender closes the writer task and the socket.
            return;
        }

        let _ = sender.send(Message::RequestName);
        self.senders.insert(conn_id, sender);
    }

    /// Dispatches one decoded client message. Messages that are illegal for
    /// the current state fall through as no-ops inside the session.
    fn handle_message(&mut self, conn_id: u32, message: Message) {
        let registered = self.session.player(conn_id).is_some();

        let effects = match message {
            Message::SetName { name } if !registered => {
                if !self.senders.contains_key(&conn_id) {
                    return;
                }
                // The game may have started between accept and registration.
                if !self.session.is_joinable() {
                    info!("connection {} rejected: game started before registration", conn_id);
                    self.send_to(
                        conn_id,
                        Message::Error {
                            message: "game in progress, joining is not possible right now"
                                .to_string(),
                        },
                    );
                    self.senders.remove(&conn_id);
                    return;
                }
                self.session.register(conn_id, name)
            }
            // Everything else requires a registered player.
            _ if !registered => {
                debug!("connection {}: message before registration ignored", conn_id);
                return;
            }
            Message::StartGame => self.session.start_game(conn_id),
            Message::BoardUpdate { board, .. } => self.session.board_update(conn_id, board),
            Message::LineCleared { count } => {
                self.session
                    .line_cleared(conn_id, count, &mut rand::thread_rng())
            }
            Message::GameOver => self.session.game_over(conn_id),
            other => {
                warn!("connection {}: unexpected message {:?}", conn_id, other);
                return;
            }
        };

        self.apply_effects(effects);
    }

    /// Executes the effects of a session operation. Failed sends are skipped
    /// per recipient and never abort the remaining fan-out.
    fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { player_id, message } => {
                    self.send_to(player_id, message);
                }
                Effect::Broadcast { exclude, message } => {
                    for player_id in self.session.player_ids() {
                        if Some(player_id) == exclude {
                            continue;
                        }
                        self.send_to(player_id, message.clone());
                    }
                }
                Effect::ScheduleReset => {
                    let event_tx = self.event_tx.clone();
                    tokio::spawn(async move {
                        sleep(RESET_DELAY).await;
                        let _ = event_tx.send(SessionEvent::ResetTimerFired);
                    });
                }
                Effect::SchedulePurge { player_id } => {
                    let event_tx = self.event_tx.clone();
                    tokio::spawn(async move {
                        sleep(PURGE_DELAY).await;
                        let _ = event_tx.send(SessionEvent::PurgeTimerFired { player_id });
                    });
                }
            }
        }
    }

    fn send_to(&self, player_id: u32, message: Message) {
        if let Some(sender) = self.senders.get(&player_id) {
            if sender.send(message).is_err() {
                debug!("send to player {} skipped: channel closed", player_id);
            }
        }
    }
}

/// Splits a connection into its reader and writer tasks and announces it to
/// the main loop.
fn spawn_connection(
    conn_id: u32,
    stream: TcpStream,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = write_message(&mut write_half, &message).await {
                debug!("connection {}: write failed: {}", conn_id, e);
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    if event_tx
        .send(SessionEvent::Connected { conn_id, sender })
        .is_err()
    {
        return;
    }

    tokio::spawn(read_loop(conn_id, read_half, event_tx));
}

/// Decodes frames until the connection dies. An undecodable payload is
/// logged and skipped; the frame boundary survives, so the connection stays
/// open. Anything else (EOF, I/O error, oversized frame) ends the
/// connection.
async fn read_loop(
    conn_id: u32,
    mut read_half: OwnedReadHalf,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
) {
    loop {
        match read_message(&mut read_half).await {
            Ok(message) => {
                if event_tx
                    .send(SessionEvent::MessageReceived { conn_id, message })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!("connection {}: undecodable message: {}", conn_id, e);
            }
            Err(e) => {
                if e.kind() != ErrorKind::UnexpectedEof {
                    debug!("connection {}: read failed: {}", conn_id, e);
                }
                let _ = event_tx.send(SessionEvent::Disconnected { conn_id });
                break;
            }
        }
    }
}

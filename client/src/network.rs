use crate::game::{ClientGameState, UpdateCheck};
use crate::input::{Action, InputManager, HELP};
use crate::rendering::Renderer;
use chess_shared::{Packet, PacketCodec, ProtocolError};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::codec::Framed;

/// A framed TCP connection to the chess server.
pub struct Connection {
    frames: Framed<TcpStream, PacketCodec>,
}

impl Connection {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Connection {
            frames: Framed::new(stream, PacketCodec::new()),
        })
    }

    pub async fn send(&mut self, packet: Packet) -> Result<(), ProtocolError> {
        self.frames.send(packet).await
    }

    /// Next packet from the server, or `None` once the server has closed
    /// the connection.
    pub async fn recv(&mut self) -> Result<Option<Packet>, ProtocolError> {
        self.frames.next().await.transpose()
    }

    /// Like [`recv`](Self::recv) but gives up after `wait`, returning
    /// `Ok(None)` on timeout as well as on close.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Result<Option<Packet>, ProtocolError> {
        match timeout(wait, self.recv()).await {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Interactive terminal client: reads commands from stdin and prints what
/// the server sends back.
pub struct Client {
    connection: Connection,
    game_state: ClientGameState,
    input_manager: InputManager,
    renderer: Renderer,
    heartbeat: Duration,
    ping_ms: Option<u64>,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        name: &str,
        heartbeat: Duration,
    ) -> Result<Self, ProtocolError> {
        info!("Connecting to {}...", server_addr);
        let connection = Connection::connect(server_addr).await?;
        Ok(Client {
            connection,
            game_state: ClientGameState::new(),
            input_manager: InputManager::new(name),
            renderer: Renderer::new(),
            heartbeat,
            ping_ms: None,
        })
    }

    fn handle_packet(&mut self, packet: Packet) {
        if !packet.is_client_bound() {
            warn!("Ignoring client-to-server packet from server: {:?}", packet);
            return;
        }
        let check = self.game_state.handle_packet(&packet);
        match packet {
            Packet::GameList { entries } => self.renderer.show(&self.renderer.lobby(&entries)),
            Packet::GameCreated { session_id, seat } => self.renderer.show(&format!(
                "Created game {}. You play {}; waiting for an opponent.",
                session_id, seat
            )),
            Packet::GameJoined {
                session_id,
                seat,
                opponent,
            } => self.renderer.show(&format!(
                "Game {} started. You play {} against {}.",
                session_id, seat, opponent
            )),
            Packet::StateUpdate(_) => {
                match check {
                    Some(UpdateCheck::Gap { expected, received }) => self.renderer.show(&format!(
                        "(missed updates {}..{}, showing latest)",
                        expected,
                        received - 1
                    )),
                    Some(UpdateCheck::Mismatch) => {
                        self.renderer.show("(local replay disagrees with server board)")
                    }
                    Some(UpdateCheck::Stale) => return,
                    _ => {}
                }
                self.renderer.show(&self.renderer.game(&self.game_state));
            }
            Packet::LegalMoves {
                square,
                destinations,
            } => self
                .renderer
                .show(&self.renderer.legal_moves(square, &destinations)),
            Packet::Error { kind, detail } => self.renderer.show(&self.renderer.error(kind, &detail)),
            Packet::OpponentDisconnected => self.renderer.show("Your opponent disconnected."),
            Packet::HeartbeatAck { timestamp } => {
                let rtt = now_millis().saturating_sub(timestamp);
                self.ping_ms = Some(rtt);
                debug!("Heartbeat round trip {}ms", rtt);
            }
            other => warn!("Unexpected packet from server: {:?}", other),
        }
    }

    /// Handles a typed line. Returns false when the user wants to quit.
    async fn handle_line(&mut self, line: &str) -> Result<bool, ProtocolError> {
        match self.input_manager.handle_line(line) {
            Ok(Action::Send(Packet::MoveRequest { .. }))
                if self.game_state.current().is_some()
                    && self.game_state.in_game()
                    && !self.game_state.is_my_turn() =>
            {
                self.renderer.show("It is not your turn.")
            }
            Ok(Action::Send(packet)) => self.connection.send(packet).await?,
            Ok(Action::ShowBoard) => self.renderer.show(&self.renderer.game(&self.game_state)),
            Ok(Action::ShowHelp) => self.renderer.show(HELP),
            Ok(Action::Renamed(name)) => self.renderer.show(&format!("You are now {}", name)),
            Ok(Action::Quit) => return Ok(false),
            Ok(Action::Nothing) => {}
            Err(e) => self.renderer.show(&e.to_string()),
        }
        Ok(true)
    }

    pub async fn run(&mut self) -> Result<(), ProtocolError> {
        self.connection
            .send(Packet::JoinLobby {
                name: self.input_manager.name().to_string(),
            })
            .await?;
        self.renderer.show(HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut heartbeat = interval(self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = self.connection.recv() => {
                    match result {
                        Ok(Some(packet)) => self.handle_packet(packet),
                        Ok(None) => {
                            self.renderer.show("Server closed the connection.");
                            return Ok(());
                        }
                        Err(e) => {
                            error!("Error receiving packet: {}", e);
                            return Err(e);
                        }
                    }
                },

                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if !self.handle_line(&line).await? {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            error!("Error reading stdin: {}", e);
                            break;
                        }
                    }
                },

                _ = heartbeat.tick() => {
                    self.connection.send(Packet::Heartbeat { timestamp: now_millis() }).await?;
                },
            }
        }

        if let Some(ping) = self.ping_ms {
            info!("Last round trip was {}ms", ping);
        }
        self.connection.send(Packet::Disconnect).await
    }
}

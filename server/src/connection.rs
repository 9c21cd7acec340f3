//! Per-connection task: decode packets, hand them to the registry, and queue
//! replies on the connection's outbox.
//!
//! The handler never changes game state itself. Every mutation goes through
//! [`SessionRegistry`](crate::registry::SessionRegistry), which keeps a
//! single path for moves whether they come from a socket or a test.

use crate::client_manager::{sanitize_name, Client};
use crate::error::ServerError;
use crate::network::ServerContext;
use crate::session::{ClientId, ConnectionRef, SessionStatus};
use chess_shared::{Packet, PacketCodec, PieceKind, ProtocolError};
use futures::{SinkExt, Stream, StreamExt};
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::Framed;

/// How long the writer gets to flush queued packets after the reader stops.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Whether the reader loop keeps going after a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

pub struct ConnectionHandler {
    client_id: ClientId,
    context: Arc<ServerContext>,
    outbox: mpsc::UnboundedSender<Packet>,
}

impl ConnectionHandler {
    /// Adds the connection to the roster. Returns None when the server is full.
    pub async fn register(
        context: Arc<ServerContext>,
        addr: SocketAddr,
        outbox: mpsc::UnboundedSender<Packet>,
    ) -> Option<Self> {
        let client_id = context.clients.write().await.add_client(addr, outbox.clone())?;
        Some(Self {
            client_id,
            context,
            outbox,
        })
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Reads packets until the peer leaves, goes quiet for longer than the
    /// idle timeout, or breaks the protocol.
    pub async fn run<S>(&self, frames: &mut S)
    where
        S: Stream<Item = Result<Packet, ProtocolError>> + Unpin,
    {
        let idle_timeout = self.context.config.idle_timeout;
        loop {
            let next = match timeout(idle_timeout, frames.next()).await {
                Ok(next) => next,
                Err(_) => {
                    info!(
                        "Client {} silent for {:?}, dropping",
                        self.client_id, idle_timeout
                    );
                    return;
                }
            };

            match next {
                Some(Ok(packet)) => {
                    if self.dispatch(packet).await == Flow::Close {
                        return;
                    }
                }
                Some(Err(e)) => {
                    warn!("Protocol error from client {}: {}", self.client_id, e);
                    return;
                }
                None => {
                    info!("Client {} closed the connection", self.client_id);
                    return;
                }
            }
        }
    }

    /// Handles one packet from the client.
    pub async fn dispatch(&self, packet: Packet) -> Flow {
        if !packet.is_server_bound() {
            warn!(
                "Unexpected packet type from client {}: {:?}",
                self.client_id, packet
            );
            return Flow::Close;
        }

        let registry = &self.context.registry;
        match packet {
            Packet::JoinLobby { name } => {
                self.rename(&name).await;
                self.send_game_list().await;
            }
            Packet::ListGames => self.send_game_list().await,
            Packet::CreateGame { name } => {
                let connection = self.seat_handle(&name).await;
                match registry.create_game(connection).await {
                    Ok(_) => {
                        self.rename(&name).await;
                        self.context.broadcast_lobby().await;
                    }
                    Err(e) => self.reject(e),
                }
            }
            Packet::JoinGame { session_id, name } => {
                let connection = self.seat_handle(&name).await;
                match registry.join_game(session_id, connection).await {
                    Ok(seat) => {
                        debug!(
                            "Client {} seated as {} in game {}",
                            self.client_id, seat, session_id
                        );
                        self.rename(&name).await;
                        self.context.broadcast_lobby().await;
                    }
                    Err(e) => self.reject(e),
                }
            }
            Packet::MoveRequest { from, to } => {
                // Success is answered by the session's StateUpdate broadcast.
                match registry.submit_move(self.client_id, from, to).await {
                    Ok(mv) if mv.captured.map_or(false, |piece| piece.kind == PieceKind::King) => {
                        // Both players are back in the lobby.
                        self.context.broadcast_lobby().await;
                    }
                    Ok(_) => {}
                    Err(e) => self.reject(e),
                }
            }
            Packet::LegalMovesRequest { square } => {
                match registry.legal_moves(self.client_id, square).await {
                    Ok(destinations) => self.send(Packet::LegalMoves {
                        square,
                        destinations,
                    }),
                    Err(e) => self.reject(e),
                }
            }
            Packet::Heartbeat { timestamp } => self.send(Packet::HeartbeatAck { timestamp }),
            Packet::Disconnect => {
                info!("Client {} said goodbye", self.client_id);
                return Flow::Close;
            }
            _ => {}
        }
        Flow::Continue
    }

    /// Releases the client's seat and roster entry. Safe to call for a
    /// client that never sat down.
    pub async fn close(self) {
        let previous = self.context.registry.handle_disconnect(self.client_id).await;
        self.context
            .clients
            .write()
            .await
            .remove_client(&self.client_id);
        // An open game left the list, or an aborted game sent its other
        // player back to the lobby.
        if matches!(
            previous,
            Some(SessionStatus::WaitingForOpponent | SessionStatus::Active)
        ) {
            self.context.broadcast_lobby().await;
        }
    }

    /// Applies a requested display name to the roster entry.
    async fn rename(&self, name: &str) {
        self.context.clients.write().await.rename(self.client_id, name);
    }

    /// A handle for taking a seat under `name`. The roster keeps the old
    /// name until the seat is actually granted.
    async fn seat_handle(&self, name: &str) -> ConnectionRef {
        let mut connection = self
            .context
            .clients
            .read()
            .await
            .get(self.client_id)
            .map(Client::connection_ref)
            .unwrap_or_else(|| {
                ConnectionRef::new(
                    self.client_id,
                    format!("Player-{}", self.client_id),
                    self.outbox.clone(),
                )
            });
        if let Some(name) = sanitize_name(name) {
            connection.name = name;
        }
        connection
    }

    async fn send_game_list(&self) {
        let entries = self.context.registry.list_open_games().await;
        self.send(Packet::GameList { entries });
    }

    fn reject(&self, error: ServerError) {
        debug!("Client {} request rejected: {}", self.client_id, error);
        self.send(error.to_packet());
    }

    fn send(&self, packet: Packet) {
        if self.outbox.send(packet).is_err() {
            warn!("Outbox for client {} already closed", self.client_id);
        }
    }
}

/// Serves one TCP client from accept to disconnect.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, context: Arc<ServerContext>) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }

    let codec = PacketCodec::with_max_frame_length(context.config.max_frame_len);
    let (mut sink, mut frames) = Framed::new(stream, codec).split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<Packet>();

    let Some(handler) = ConnectionHandler::register(context, addr, outbox).await else {
        warn!("Rejecting {}: server full", addr);
        if let Err(e) = sink.send(ServerError::ServerFull.to_packet()).await {
            warn!("Failed to tell {} the server is full: {}", addr, e);
        }
        return;
    };
    let client_id = handler.client_id();

    let mut writer = tokio::spawn(async move {
        while let Some(packet) = outbox_rx.recv().await {
            if let Err(e) = sink.send(packet).await {
                warn!("Failed to send to client {}: {}", client_id, e);
                break;
            }
        }
    });

    handler.run(&mut frames).await;
    handler.close().await;

    if timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use chess_shared::{Color, ErrorKind, GameListEntry, GameResult};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn context(max_clients: usize) -> Arc<ServerContext> {
        Arc::new(ServerContext::new(ServerConfig {
            max_clients,
            ..ServerConfig::default()
        }))
    }

    async fn connect(context: &Arc<ServerContext>) -> (ConnectionHandler, UnboundedReceiver<Packet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = ConnectionHandler::register(Arc::clone(context), addr(), tx)
            .await
            .unwrap();
        (handler, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Packet>) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(packet) = rx.try_recv() {
            packets.push(packet);
        }
        packets
    }

    async fn name_of(context: &ServerContext, id: ClientId) -> Option<String> {
        context
            .clients
            .read()
            .await
            .get(id)
            .map(|client| client.name.clone())
    }

    fn mv(from: &str, to: &str) -> Packet {
        Packet::MoveRequest {
            from: from.parse().unwrap(),
            to: to.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_register_respects_capacity() {
        let context = context(1);
        let (_first, _rx) = connect(&context).await;
        let (tx, _rx2) = mpsc::unbounded_channel();
        assert!(ConnectionHandler::register(Arc::clone(&context), addr(), tx)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_join_lobby_lists_games() {
        let context = context(4);
        let (alice, mut alice_rx) = connect(&context).await;
        let (bob, mut bob_rx) = connect(&context).await;

        alice
            .dispatch(Packet::CreateGame {
                name: "Alice".to_string(),
            })
            .await;
        let alice_packets = drain(&mut alice_rx);
        assert_eq!(
            alice_packets,
            vec![Packet::GameCreated {
                session_id: 1,
                seat: Color::White
            }]
        );

        // Bob was idle in the lobby, so the new game was pushed to him.
        let expected = Packet::GameList {
            entries: vec![GameListEntry {
                session_id: 1,
                creator_name: "Alice".to_string(),
            }],
        };
        assert_eq!(drain(&mut bob_rx), vec![expected.clone()]);

        bob.dispatch(Packet::JoinLobby {
            name: "Bob".to_string(),
        })
        .await;
        assert_eq!(drain(&mut bob_rx), vec![expected]);
    }

    #[tokio::test]
    async fn test_move_errors_go_to_sender_only() {
        let context = context(4);
        let (alice, mut alice_rx) = connect(&context).await;
        let (bob, mut bob_rx) = connect(&context).await;

        alice
            .dispatch(Packet::CreateGame {
                name: "Alice".to_string(),
            })
            .await;
        bob.dispatch(Packet::JoinGame {
            session_id: 1,
            name: "Bob".to_string(),
        })
        .await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        assert_eq!(bob.dispatch(mv("e7", "e5")).await, Flow::Continue);
        match drain(&mut bob_rx).as_slice() {
            [Packet::Error { kind, .. }] => assert_eq!(*kind, ErrorKind::NotYourTurn),
            other => panic!("unexpected packets: {:?}", other),
        }
        assert!(drain(&mut alice_rx).is_empty());

        alice.dispatch(mv("e2", "e5")).await;
        match drain(&mut alice_rx).as_slice() {
            [Packet::Error { kind, .. }] => assert_eq!(*kind, ErrorKind::IllegalMove),
            other => panic!("unexpected packets: {:?}", other),
        }
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_move_without_game() {
        let context = context(2);
        let (alice, mut alice_rx) = connect(&context).await;
        alice.dispatch(mv("e2", "e4")).await;
        match drain(&mut alice_rx).as_slice() {
            [Packet::Error { kind, .. }] => assert_eq!(*kind, ErrorKind::SessionNotFound),
            other => panic!("unexpected packets: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_legal_moves_request() {
        let context = context(4);
        let (alice, mut alice_rx) = connect(&context).await;
        let (bob, _bob_rx) = connect(&context).await;
        alice
            .dispatch(Packet::CreateGame {
                name: "Alice".to_string(),
            })
            .await;
        bob.dispatch(Packet::JoinGame {
            session_id: 1,
            name: "Bob".to_string(),
        })
        .await;
        drain(&mut alice_rx);

        let square = "g1".parse().unwrap();
        alice.dispatch(Packet::LegalMovesRequest { square }).await;
        assert_eq!(
            drain(&mut alice_rx),
            vec![Packet::LegalMoves {
                square,
                destinations: vec!["h3".parse().unwrap(), "f3".parse().unwrap()],
            }]
        );
    }

    #[tokio::test]
    async fn test_heartbeat_echoes() {
        let context = context(1);
        let (alice, mut rx) = connect(&context).await;
        assert_eq!(
            alice.dispatch(Packet::Heartbeat { timestamp: 5 }).await,
            Flow::Continue
        );
        assert_eq!(drain(&mut rx), vec![Packet::HeartbeatAck { timestamp: 5 }]);
    }

    #[tokio::test]
    async fn test_client_bound_packet_closes() {
        let context = context(1);
        let (alice, _rx) = connect(&context).await;
        assert_eq!(alice.dispatch(Packet::OpponentDisconnected).await, Flow::Close);
        assert_eq!(alice.dispatch(Packet::Disconnect).await, Flow::Close);
    }

    #[tokio::test]
    async fn test_close_aborts_game_and_frees_roster() {
        let context = context(4);
        let (alice, mut alice_rx) = connect(&context).await;
        let (bob, mut bob_rx) = connect(&context).await;
        alice
            .dispatch(Packet::CreateGame {
                name: "Alice".to_string(),
            })
            .await;
        bob.dispatch(Packet::JoinGame {
            session_id: 1,
            name: "Bob".to_string(),
        })
        .await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        bob.close().await;
        assert_eq!(context.clients.read().await.len(), 1);

        let packets = drain(&mut alice_rx);
        assert_eq!(packets[0], Packet::OpponentDisconnected);
        match &packets[1] {
            Packet::StateUpdate(update) => assert_eq!(update.result, GameResult::Aborted),
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_abort_returns_remaining_player_to_lobby() {
        let context = context(4);
        let (alice, mut alice_rx) = connect(&context).await;
        let (bob, mut bob_rx) = connect(&context).await;
        alice
            .dispatch(Packet::CreateGame {
                name: "Alice".to_string(),
            })
            .await;
        bob.dispatch(Packet::JoinGame {
            session_id: 1,
            name: "Bob".to_string(),
        })
        .await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        bob.close().await;
        let packets = drain(&mut alice_rx);
        assert_eq!(packets.last(), Some(&Packet::GameList { entries: vec![] }));

        let (carol, _carol_rx) = connect(&context).await;
        carol
            .dispatch(Packet::CreateGame {
                name: "Carol".to_string(),
            })
            .await;
        assert_eq!(
            drain(&mut alice_rx),
            vec![Packet::GameList {
                entries: vec![GameListEntry {
                    session_id: 2,
                    creator_name: "Carol".to_string(),
                }],
            }]
        );
    }

    #[tokio::test]
    async fn test_king_capture_returns_players_to_lobby() {
        let context = context(4);
        let (alice, mut alice_rx) = connect(&context).await;
        let (bob, mut bob_rx) = connect(&context).await;
        alice
            .dispatch(Packet::CreateGame {
                name: "Alice".to_string(),
            })
            .await;
        bob.dispatch(Packet::JoinGame {
            session_id: 1,
            name: "Bob".to_string(),
        })
        .await;

        alice.dispatch(mv("e2", "e3")).await;
        bob.dispatch(mv("f7", "f6")).await;
        alice.dispatch(mv("d1", "h5")).await;
        bob.dispatch(mv("a7", "a6")).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        alice.dispatch(mv("h5", "e8")).await;
        for packets in [drain(&mut alice_rx), drain(&mut bob_rx)] {
            match packets.as_slice() {
                [Packet::StateUpdate(update), Packet::GameList { entries }] => {
                    assert_eq!(update.result, GameResult::WhiteWins);
                    assert!(entries.is_empty());
                }
                other => panic!("unexpected packets: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_name_applied_only_when_seat_granted() {
        let context = context(4);
        let (alice, mut alice_rx) = connect(&context).await;
        let (bob, mut bob_rx) = connect(&context).await;
        alice
            .dispatch(Packet::CreateGame {
                name: "Alice".to_string(),
            })
            .await;
        bob.dispatch(Packet::JoinLobby {
            name: "Bob".to_string(),
        })
        .await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        bob.dispatch(Packet::JoinGame {
            session_id: 7,
            name: "Robert".to_string(),
        })
        .await;
        match drain(&mut bob_rx).as_slice() {
            [Packet::Error { kind, .. }] => assert_eq!(*kind, ErrorKind::SessionNotFound),
            other => panic!("unexpected packets: {:?}", other),
        }
        assert_eq!(name_of(&context, bob.client_id()).await.as_deref(), Some("Bob"));

        bob.dispatch(Packet::JoinGame {
            session_id: 1,
            name: "Robert".to_string(),
        })
        .await;
        assert_eq!(name_of(&context, bob.client_id()).await.as_deref(), Some("Robert"));
        assert!(drain(&mut alice_rx).contains(&Packet::GameJoined {
            session_id: 1,
            seat: Color::White,
            opponent: "Robert".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_run_stops_on_malformed_frame() {
        let context = context(1);
        let (alice, mut rx) = connect(&context).await;
        // A two-byte body is too short to hold a packet tag.
        let mock = tokio_test::io::Builder::new()
            .read(&[0, 0, 0, 2, 0xff, 0xff])
            .build();
        let mut frames = tokio_util::codec::FramedRead::new(mock, PacketCodec::new());
        alice.run(&mut frames).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_stream_end() {
        let context = context(1);
        let (alice, mut rx) = connect(&context).await;
        let mut frames = futures::stream::iter(vec![
            Ok::<_, ProtocolError>(Packet::Heartbeat { timestamp: 1 }),
            Ok(Packet::ListGames),
        ]);
        alice.run(&mut frames).await;
        assert_eq!(
            drain(&mut rx),
            vec![
                Packet::HeartbeatAck { timestamp: 1 },
                Packet::GameList { entries: vec![] }
            ]
        );
    }
}

//! Session registry and lobby.
//!
//! One registry lives for the whole server process and is shared by every
//! connection task. Each session sits behind its own mutex, so moves in one
//! game never wait on another game. The id map and the membership index
//! have their own short-lived locks, and no method awaits a session lock
//! while holding either of them.

use crate::error::ServerError;
use crate::session::{ClientId, ConnectionRef, Session, SessionStatus};
use chess_shared::{Color, GameListEntry, Move, Packet, SessionId, Square};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub type SharedSession = Arc<Mutex<Session>>;

pub struct SessionRegistry {
    /// Ordered by id, and ids only grow, so iteration is creation order.
    sessions: RwLock<BTreeMap<SessionId, SharedSession>>,
    /// Which session each seated connection belongs to.
    memberships: RwLock<HashMap<ClientId, SessionId>>,
    next_session_id: AtomicU32,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            memberships: RwLock::new(HashMap::new()),
            next_session_id: AtomicU32::new(1),
        }
    }

    pub async fn get(&self, session_id: SessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    pub async fn session_of(&self, client: ClientId) -> Option<SessionId> {
        self.memberships.read().await.get(&client).copied()
    }

    /// Connections seated in a session that is still open or being played.
    /// Players left behind in a finished game count as back in the lobby.
    pub async fn seated_clients(&self) -> HashSet<ClientId> {
        let members: Vec<(ClientId, SessionId)> = self
            .memberships
            .read()
            .await
            .iter()
            .map(|(&client, &session_id)| (client, session_id))
            .collect();
        let sessions: HashMap<SessionId, SharedSession> = {
            let map = self.sessions.read().await;
            members
                .iter()
                .filter_map(|(_, id)| map.get(id).map(|session| (*id, Arc::clone(session))))
                .collect()
        };

        let mut seated = HashSet::new();
        for (client, session_id) in members {
            let Some(session) = sessions.get(&session_id) else {
                continue;
            };
            if session.lock().await.status() != SessionStatus::Finished {
                seated.insert(client);
            }
        }
        seated
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Opens a new game with `creator` as white and lists it in the lobby.
    ///
    /// The creator is told its seat before the game becomes joinable, so
    /// `GameCreated` always reaches it ahead of `GameJoined`.
    pub async fn create_game(&self, creator: ConnectionRef) -> Result<SessionId, ServerError> {
        self.release_finished(creator.id).await;
        if let Some(current) = self.session_of(creator.id).await {
            return Err(ServerError::AlreadySeated(current));
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let creator_id = creator.id;
        info!("Game {} created by {}", session_id, creator.name);
        creator.send(Packet::GameCreated {
            session_id,
            seat: Color::White,
        });

        let session = Arc::new(Mutex::new(Session::new(session_id, creator)));
        self.sessions.write().await.insert(session_id, session);
        self.memberships.write().await.insert(creator_id, session_id);
        Ok(session_id)
    }

    /// Sessions still waiting for a second player, oldest first.
    pub async fn list_open_games(&self) -> Vec<GameListEntry> {
        let sessions: Vec<SharedSession> = self.sessions.read().await.values().cloned().collect();

        let mut entries = Vec::new();
        for session in sessions {
            let session = session.lock().await;
            if session.status() == SessionStatus::WaitingForOpponent {
                entries.push(GameListEntry {
                    session_id: session.id(),
                    creator_name: session.creator_name().to_string(),
                });
            }
        }
        entries
    }

    /// Seats `joiner` as black in a waiting session.
    ///
    /// Concurrent joins for the same session are serialised by its lock:
    /// the first one wins and the rest see `SessionFull`.
    pub async fn join_game(
        &self,
        session_id: SessionId,
        joiner: ConnectionRef,
    ) -> Result<Color, ServerError> {
        self.release_finished(joiner.id).await;
        if let Some(current) = self.session_of(joiner.id).await {
            return Err(ServerError::AlreadySeated(current));
        }

        let session = self
            .get(session_id)
            .await
            .ok_or(ServerError::SessionNotFound(session_id))?;
        let joiner_id = joiner.id;

        let mut session = session.lock().await;
        let seat = session.join(joiner)?;
        self.memberships.write().await.insert(joiner_id, session_id);
        Ok(seat)
    }

    pub async fn submit_move(
        &self,
        client: ClientId,
        from: Square,
        to: Square,
    ) -> Result<Move, ServerError> {
        let session = self.seated_session(client).await?;
        let mv = session.lock().await.submit_move(client, from, to)?;
        debug!("Client {} played {} -> {}", client, mv.from, mv.to);
        Ok(mv)
    }

    pub async fn legal_moves(
        &self,
        client: ClientId,
        square: Square,
    ) -> Result<Vec<Square>, ServerError> {
        let session = self.seated_session(client).await?;
        let destinations = session.lock().await.legal_moves_for(client, square)?;
        Ok(destinations)
    }

    async fn seated_session(&self, client: ClientId) -> Result<SharedSession, ServerError> {
        let session_id = self
            .session_of(client)
            .await
            .ok_or(ServerError::NotSeated)?;
        self.get(session_id)
            .await
            .ok_or(ServerError::SessionNotFound(session_id))
    }

    /// Takes `client` out of whatever session it sits in.
    ///
    /// An active game is aborted and the opponent told; a waiting game is
    /// dropped from the lobby. Returns the session's status before the
    /// client left, or `None` if the client held no seat. Calling it again
    /// for the same client does nothing.
    pub async fn handle_disconnect(&self, client: ClientId) -> Option<SessionStatus> {
        let session_id = self.memberships.write().await.remove(&client)?;
        let session = self.get(session_id).await?;

        let (previous, remove) = {
            let mut session = session.lock().await;
            let previous = session.status();
            session.leave(client);
            let remove = previous == SessionStatus::WaitingForOpponent || session.is_empty();
            (previous, remove)
        };

        if remove {
            self.sessions.write().await.remove(&session_id);
            debug!("Game {} removed from registry", session_id);
        }
        Some(previous)
    }

    /// Frees a client still attached to a game that has already ended, so it
    /// can create or join another one.
    async fn release_finished(&self, client: ClientId) {
        let Some(session_id) = self.session_of(client).await else {
            return;
        };
        let finished = match self.get(session_id).await {
            Some(session) => session.lock().await.status() == SessionStatus::Finished,
            None => true,
        };
        if finished {
            self.handle_disconnect(client).await;
        }
    }

    /// Aborts every live game and empties the registry. Used on shutdown.
    pub async fn close_all(&self) {
        let sessions: Vec<SharedSession> = {
            let mut map = self.sessions.write().await;
            std::mem::take(&mut *map).into_values().collect()
        };
        for session in sessions {
            session.lock().await.close();
        }
        self.memberships.write().await.clear();
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

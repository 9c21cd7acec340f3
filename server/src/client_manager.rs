//! Roster of connected clients.
//!
//! This module tracks every live connection to the chess server:
//! - Connection lifecycle (connect, rename, disconnect)
//! - Capacity limits
//! - Outbound queues, so lobby updates can reach players who are not in a game
//!
//! Game state is not kept here; seats and sessions belong to the
//! [`SessionRegistry`](crate::registry::SessionRegistry).

use crate::session::{ClientId, ConnectionRef};
use chess_shared::Packet;
use log::info;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

const MAX_NAME_LEN: usize = 32;

/// A connected client and the queue its writer task drains.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: ClientId,
    pub addr: SocketAddr,
    /// Display name shown to opponents and in the lobby
    pub name: String,
    pub connected_at: Instant,
    outbox: mpsc::UnboundedSender<Packet>,
}

impl Client {
    /// Creates a client with a placeholder name derived from its id.
    pub fn new(id: ClientId, addr: SocketAddr, outbox: mpsc::UnboundedSender<Packet>) -> Self {
        Self {
            id,
            addr,
            name: format!("Player-{}", id),
            connected_at: Instant::now(),
            outbox,
        }
    }

    pub fn connection_ref(&self) -> ConnectionRef {
        ConnectionRef::new(self.id, self.name.clone(), self.outbox.clone())
    }
}

/// Cleans up a requested display name. Blank names are rejected.
pub fn sanitize_name(name: &str) -> Option<String> {
    let trimmed: String = name
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NAME_LEN)
        .collect();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Manages all connected clients.
pub struct ClientManager {
    clients: HashMap<ClientId, Client>,
    /// Next available client ID for new connections
    next_client_id: ClientId,
    max_clients: usize,
}

impl ClientManager {
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection.
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        outbox: mpsc::UnboundedSender<Packet>,
    ) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, outbox));

        Some(client_id)
    }

    /// Returns true if the client was found and removed, false if it was
    /// already gone.
    pub fn remove_client(&mut self, client_id: &ClientId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} ({}) disconnected after {:?}",
                client.id,
                client.name,
                client.connected_at.elapsed()
            );
            true
        } else {
            false
        }
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Changes a client's display name. Blank names leave it unchanged.
    pub fn rename(&mut self, client_id: ClientId, name: &str) -> Option<&Client> {
        let client = self.clients.get_mut(&client_id)?;
        if let Some(name) = sanitize_name(name) {
            client.name = name;
        }
        Some(&*client)
    }

    /// Queues `packet` for every client not listed in `skip`. Returns how
    /// many clients it was queued for.
    pub fn broadcast_except(&self, packet: &Packet, skip: &HashSet<ClientId>) -> usize {
        self.clients
            .values()
            .filter(|client| !skip.contains(&client.id))
            .filter(|client| client.outbox.send(packet.clone()).is_ok())
            .count()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn outbox() -> (mpsc::UnboundedSender<Packet>, UnboundedReceiver<Packet>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_client_creation() {
        let (tx, _rx) = outbox();
        let client = Client::new(7, test_addr(), tx);

        assert_eq!(client.id, 7);
        assert_eq!(client.addr, test_addr());
        assert_eq!(client.name, "Player-7");
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = outbox();

        let client_id1 = manager.add_client(test_addr(), tx.clone()).unwrap();
        let client_id2 = manager.add_client(test_addr2(), tx).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = outbox();

        assert!(manager.add_client(test_addr(), tx.clone()).is_some());
        assert!(manager.add_client(test_addr2(), tx).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = outbox();
        let client_id = manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.remove_client(&client_id));
        assert!(manager.is_empty());
        assert!(!manager.remove_client(&client_id));
    }

    #[test]
    fn test_ids_not_reused_after_removal() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = outbox();
        let first = manager.add_client(test_addr(), tx.clone()).unwrap();
        manager.remove_client(&first);
        let second = manager.add_client(test_addr(), tx).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_rename() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = outbox();
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert_eq!(manager.rename(id, "  Alice \n").unwrap().name, "Alice");
        assert_eq!(manager.rename(id, "   ").unwrap().name, "Alice");
        assert!(manager.rename(99, "Bob").is_none());
        assert_eq!(manager.get(id).unwrap().connection_ref().name, "Alice");
    }

    #[test]
    fn test_sanitize_name_truncates() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_name(&long).unwrap().len(), MAX_NAME_LEN);
        assert_eq!(sanitize_name("a\u{7}b"), Some("ab".to_string()));
        assert_eq!(sanitize_name(""), None);
    }

    #[test]
    fn test_broadcast_skips_seated_clients() {
        let mut manager = ClientManager::new(3);
        let (tx1, mut rx1) = outbox();
        let (tx2, mut rx2) = outbox();
        let id1 = manager.add_client(test_addr(), tx1).unwrap();
        let _id2 = manager.add_client(test_addr2(), tx2).unwrap();

        let skip: HashSet<ClientId> = [id1].into_iter().collect();
        let sent = manager.broadcast_except(&Packet::GameList { entries: vec![] }, &skip);

        assert_eq!(sent, 1);
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), Packet::GameList { entries: vec![] });
    }
}

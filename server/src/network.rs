//! Server network layer: TCP accept loop and the state shared by every
//! connection task.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::connection::handle_connection;
use crate::registry::SessionRegistry;
use chess_shared::Packet;
use log::{debug, error, info};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};

/// Everything a connection task needs to reach.
pub struct ServerContext {
    pub registry: SessionRegistry,
    pub clients: RwLock<ClientManager>,
    pub config: ServerConfig,
    /// Serializes lobby pushes so a stale list never lands after a newer one.
    lobby_lock: Mutex<()>,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: SessionRegistry::new(),
            clients: RwLock::new(ClientManager::new(config.max_clients)),
            config,
            lobby_lock: Mutex::new(()),
        }
    }

    /// Pushes the current open-game list to every client not sitting in a
    /// game.
    pub async fn broadcast_lobby(&self) {
        let _lobby = self.lobby_lock.lock().await;
        let entries = self.registry.list_open_games().await;
        let seated = self.registry.seated_clients().await;
        let sent = self
            .clients
            .read()
            .await
            .broadcast_except(&Packet::GameList { entries }, &seated);
        debug!("Lobby update sent to {} clients", sent);
    }
}

/// Accepts TCP connections and spawns a handler task for each.
pub struct Server {
    listener: TcpListener,
    context: Arc<ServerContext>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Chess server listening on {}", listener.local_addr()?);
        Ok(Server {
            listener,
            context: Arc::new(ServerContext::new(config)),
        })
    }

    /// The bound address. Useful when binding to port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.context)
    }

    /// Runs the accept loop forever.
    pub async fn run(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("Accepted connection from {}", addr);
                    tokio::spawn(handle_connection(stream, addr, self.context()));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// Runs the accept loop until `shutdown` resolves, then aborts every
    /// live game so the players are told before the process exits.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => info!("Shutdown requested"),
        }
        self.context.registry.close_all().await;
        info!("Server stopped");
    }
}

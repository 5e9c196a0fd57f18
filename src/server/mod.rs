//! Server State
//!
//! [`Server`] is the one value shared by every connection task. It owns the
//! databases, the runtime configuration, the client registry and the command
//! dispatcher, and it carries the shutdown signal.
//!
//! ## Architecture
//!
//! ```text
//!  connection task ──┐
//!  connection task ──┼──> Arc<Server> ──> Dispatcher ──> Databases[db]
//!  connection task ──┘        │
//!                             ├── ConfigStore   (CONFIG GET/SET, requirepass)
//!                             ├── ClientRegistry (CLIENT LIST/KILL)
//!                             └── shutdown watch (SHUTDOWN, Ctrl+C)
//! ```
//!
//! ## Example
//!
//! ```
//! use tidekv::protocol::{Reply, Request};
//! use tidekv::server::{Server, ServerOptions};
//! use bytes::Bytes;
//!
//! let server = Server::new(ServerOptions::default());
//! let mut session = server.open_session("127.0.0.1:50000".parse().unwrap(), -1);
//!
//! let parts = vec![Bytes::from("SET"), Bytes::from("k"), Bytes::from("v")];
//! let set = Request::from_parts(parts).unwrap();
//! assert_eq!(server.execute(&mut session, &set), Some(Reply::ok()));
//!
//! server.close_session(&session);
//! ```

pub mod client;
pub mod config;
pub mod session;
pub mod stats;

pub use client::{is_valid_client_name, ClientHandle, ClientRegistry};
pub use config::{ConfigError, ConfigStore, REQUIREPASS};
pub use session::Session;
pub use stats::ServerStats;

use crate::commands::Dispatcher;
use crate::protocol::{Reply, Request};
use crate::storage::{Databases, DEFAULT_DATABASES};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::info;

/// Startup parameters.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Number of logical databases
    pub databases: usize,
    /// Initial `requirepass`; empty disables authentication
    pub requirepass: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            databases: DEFAULT_DATABASES,
            requirepass: String::new(),
        }
    }
}

/// Shared server state.
#[derive(Debug)]
pub struct Server {
    databases: Arc<Databases>,
    config: ConfigStore,
    clients: ClientRegistry,
    dispatcher: Dispatcher,
    stats: ServerStats,
    started_at: Instant,
    shutdown_tx: watch::Sender<bool>,
}

impl Server {
    pub fn new(options: ServerOptions) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            databases: Arc::new(Databases::new(options.databases)),
            config: ConfigStore::new(options.requirepass),
            clients: ClientRegistry::new(),
            dispatcher: Dispatcher::new(),
            stats: ServerStats::new(),
            started_at: Instant::now(),
            shutdown_tx,
        }
    }

    pub fn databases(&self) -> &Arc<Databases> {
        &self.databases
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Registers a new connection and returns its session.
    ///
    /// The session starts authenticated when no password is configured.
    pub fn open_session(&self, addr: SocketAddr, fd: i64) -> Session {
        let client = self.clients.register(addr, fd);
        self.stats.connection_opened();
        Session::new(client, self.config.requirepass().is_none())
    }

    pub fn close_session(&self, session: &Session) {
        self.clients.unregister(session.client().id());
        self.stats.connection_closed();
    }

    /// Runs one request. `None` means nothing is to be written for it.
    pub fn execute(&self, session: &mut Session, request: &Request) -> Option<Reply> {
        self.dispatcher.dispatch(self, session, request)
    }

    /// Closes every client and signals the accept loop to stop.
    pub fn shutdown(&self) {
        info!("Shutdown requested, closing {} client(s)", self.clients.len());
        self.clients.kill_all();
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(ServerOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn request(parts: &[&str]) -> Request {
        Request::from_parts(parts.iter().map(|p| Bytes::from(p.to_string())).collect()).unwrap()
    }

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    #[test]
    fn test_sessions_register_and_unregister() {
        let server = Server::default();
        let a = server.open_session(addr(), -1);
        let b = server.open_session(addr(), -1);
        assert_eq!(server.clients().len(), 2);
        assert_ne!(a.client().id(), b.client().id());

        server.close_session(&a);
        assert_eq!(server.clients().len(), 1);
        assert_eq!(server.stats().total_connections(), 2);
    }

    #[test]
    fn test_password_requires_auth() {
        let server = Server::new(ServerOptions {
            requirepass: "secret".to_string(),
            ..Default::default()
        });
        let mut session = server.open_session(addr(), -1);
        assert!(!session.is_authenticated());

        let reply = server.execute(&mut session, &request(&["GET", "k"]));
        assert_eq!(reply, Some(Reply::error("ERR operation not permitted")));

        let reply = server.execute(&mut session, &request(&["AUTH", "secret"]));
        assert_eq!(reply, Some(Reply::ok()));
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_concurrent_incr_loses_no_updates() {
        let server = Server::default();
        let threads: u16 = 8;
        let per_thread = 500;

        std::thread::scope(|scope| {
            for t in 0..threads {
                let server = &server;
                scope.spawn(move || {
                    let mut session =
                        server.open_session(SocketAddr::from(([127, 0, 0, 1], 41000 + t)), -1);
                    for _ in 0..per_thread {
                        let reply = server.execute(&mut session, &request(&["INCR", "counter"]));
                        assert!(matches!(reply, Some(Reply::Integer(_))));
                    }
                    server.close_session(&session);
                });
            }
        });

        let mut session = server.open_session(addr(), -1);
        let expected = (threads as i64 * per_thread).to_string();
        assert_eq!(
            server.execute(&mut session, &request(&["GET", "counter"])),
            Some(Reply::bulk(expected))
        );
    }

    #[tokio::test]
    async fn test_shutdown_kills_clients() {
        let server = Server::default();
        let session = server.open_session(addr(), -1);
        let mut shutdown = server.subscribe_shutdown();

        server.shutdown();
        shutdown.changed().await.unwrap();
        assert!(server.is_shutting_down());
        assert!(session.client().is_killed());
    }
}

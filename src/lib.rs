//! # TideKV - An In-Memory, Redis-Compatible String and List Server
//!
//! TideKV speaks the Redis wire protocol and stores two kinds of values, byte
//! strings and lists of byte strings, across a fixed set of numbered
//! databases. Keys can carry absolute expiration deadlines.
//!
//! ## Features
//!
//! - **Redis-Compatible**: RESP multibulk and inline requests, standard replies
//! - **Typed values**: strings and lists, with `WRONGTYPE` on mismatch
//! - **Expiration**: lazy expiry on access, optional background sweeping
//! - **Multiple databases**: `SELECT`, `FLUSHDB`, `FLUSHALL`
//! - **Session commands**: `AUTH`, `CLIENT LIST/KILL/SETNAME`, `CONFIG GET/SET`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              TideKV                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│ Dispatcher  │                  │
//! │  │ (Listener)  │    │  Handler    │    │ (commands)  │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                            ▼                  ▼                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────────────┐ │
//! │  │   RESP      │    │  Session    │    │          Databases           │ │
//! │  │   Parser    │    │  + Client   │    │  ┌──────┐ ┌──────┐ ┌──────┐  │ │
//! │  │             │    │  Registry   │    │  │ db 0 │ │ db 1 │ │ ...  │  │ │
//! │  └─────────────┘    └─────────────┘    │  │Mutex │ │Mutex │ │      │  │ │
//! │                                        │  └──────┘ └──────┘ └──────┘  │ │
//! │                                        └──────────────────────────────┘ │
//! │                                                       ▲                 │
//! │                                  ┌────────────────────┴──────────────┐  │
//! │                                  │  ExpirySweeper (--active-expire)  │  │
//! │                                  └───────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use tidekv::connection::handle_connection;
//! use tidekv::server::{Server, ServerOptions};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Arc::new(Server::new(ServerOptions::default()));
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         tokio::spawn(handle_connection(stream, addr, Arc::clone(&server)));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: request parser and reply serialization
//! - [`storage`]: keyspaces, values, expiration, glob matching
//! - [`commands`]: command table, dispatcher and handlers
//! - [`server`]: shared server state, sessions, clients, runtime config
//! - [`connection`]: per-client connection tasks
//!
//! ## Design Highlights
//!
//! ### One Lock per Database
//!
//! Every database is a plain `Keyspace` behind its own `Mutex`. A command that
//! works on one database holds that lock from its first read to its last
//! write, so commands never observe each other's intermediate states.
//!
//! ### Zero-Copy Parsing
//!
//! Request arguments are `bytes::Bytes` slices of the read buffer, handed to
//! the handlers and stored without copying.
//!
//! ### Lazy + Active Expiry
//!
//! Expired keys disappear the moment anything touches them. With
//! `--active-expire`, a background task also reclaims keys nobody reads.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandError, Dispatcher};
pub use connection::handle_connection;
pub use protocol::{ParseError, Reply, Request, RequestParser};
pub use server::{Server, ServerOptions};
pub use storage::{Databases, ExpiryConfig, ExpirySweeper, Keyspace};

/// The default port TideKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host TideKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of TideKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

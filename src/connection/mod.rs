//! Connection Handler Module
//!
//! This module manages individual client connections. Each connection is
//! handled by its own async task; all tasks share one [`Server`](crate::server::Server).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────┐  │
//! │  │ Read bytes  │───>│ Parse       │───>│ Server::execute │  │
//! │  └─────────────┘    └─────────────┘    └────────┬────────┘  │
//! │        ▲                                        │           │
//! │        │ kill / shutdown                        ▼           │
//! │   watch channel                       ┌──────────────────┐  │
//! │                                       │ Flush replies    │  │
//! │                                       └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use tidekv::connection::handle_connection;
//! use tidekv::server::{Server, ServerOptions};
//! use std::sync::Arc;
//!
//! let server = Arc::new(Server::new(ServerOptions::default()));
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, Arc::clone(&server)));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler};

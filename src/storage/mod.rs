//! Storage Module
//!
//! This module holds the in-memory keyspace: one [`Keyspace`] per logical
//! database, each behind its own lock inside [`Databases`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Databases                            │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐        │
//! │  │  db 0    │ │  db 1    │ │  db 2    │ │ ...N-1   │        │
//! │  │  Mutex   │ │  Mutex   │ │  Mutex   │ │          │        │
//! │  │ Keyspace │ │ Keyspace │ │ Keyspace │ │          │        │
//! │  └──────────┘ └──────────┘ └──────────┘ └──────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ (optional, --active-expire)
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Typed values**: a key holds a string or a list, never both
//! - **Absolute expirations**: deadlines are unix milliseconds
//! - **Lazy expiry**: expired keys vanish the moment they are touched
//! - **Sweep on enumeration**: `KEYS`, `RANDOMKEY` and `DBSIZE` never see expired keys
//!
//! ## Example
//!
//! ```
//! use tidekv::storage::{Keyspace, ListEnd};
//! use bytes::Bytes;
//!
//! let mut db = Keyspace::new(0);
//!
//! db.set_string(Bytes::from("name"), Bytes::from("Ariz"));
//! assert_eq!(db.get_string(b"name").unwrap(), Some(Bytes::from("Ariz")));
//!
//! db.get_or_create_list(&Bytes::from("queue")).unwrap().push_back(Bytes::from("job"));
//! assert_eq!(db.pop_list(b"queue", ListEnd::Head).unwrap(), Some(Bytes::from("job")));
//! assert!(!db.has(b"queue"));
//! ```

pub mod databases;
pub mod expiry;
pub mod glob;
pub mod keyspace;
pub mod value;

// Re-export commonly used types
pub use databases::{Databases, DEFAULT_DATABASES};
pub use expiry::{ExpiryConfig, ExpirySweeper};
pub use glob::GlobPattern;
pub use keyspace::{now_millis, Keyspace, StorageResult};
pub use value::{ListEnd, StorageError, Value};

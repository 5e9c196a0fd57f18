//! Command Layer
//!
//! This module turns a parsed [`Request`](crate::protocol::Request) into a
//! [`Reply`]: it validates the request, looks the command up in the
//! [`CommandTable`], runs the handler and maps its result onto the wire.
//!
//! ## Architecture
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Dispatcher     │  auth gate, lookup, arity
//! └────────┬─────────┘
//!          │
//!    ┌─────┴─────────────────────┐
//!    ▼                           ▼
//! Keyspace handler           Session handler
//! (db locked by dispatcher)  (session + server state)
//!    │                           │
//!    └─────────────┬─────────────┘
//!                  ▼
//!         Output ──ReplyKind──> Reply
//! ```
//!
//! ## Supported Commands
//!
//! ### String Commands
//! - `GET`, `SET key value [NX|XX] [EX s|PX ms]`, `SETNX`, `SETEX`, `PSETEX`
//! - `GETSET`, `MGET`, `MSET`, `MSETNX`, `APPEND`, `STRLEN`
//! - `INCR`, `INCRBY`, `DECR`, `DECRBY`, `GETRANGE`, `SETRANGE`
//!
//! ### List Commands
//! - `LPUSH`, `RPUSH`, `LPUSHX`, `RPUSHX`, `LPOP`, `RPOP`, `RPOPLPUSH`
//! - `LLEN`, `LINDEX`, `LRANGE`, `LSET`, `LREM`
//!
//! ### Key Commands
//! - `KEYS`, `RANDOMKEY`, `EXISTS`, `DEL`, `TYPE`, `RENAME`, `RENAMENX`
//! - `EXPIRE`, `EXPIREAT`, `PEXPIRE`, `PEXPIREAT`, `TTL`, `PTTL`, `PERSIST`
//! - `SORT key [BY pattern] [LIMIT offset count] [GET pattern ...] [ASC|DESC] [ALPHA] [STORE dest]`
//!
//! ### Connection and Server Commands
//! - `PING`, `ECHO`, `SELECT`, `AUTH`, `QUIT`
//! - `CLIENT LIST|KILL|GETNAME|SETNAME`, `CONFIG GET|SET`
//! - `DBSIZE`, `FLUSHDB`, `FLUSHALL`, `TIME`, `INFO`, `COMMAND`, `SHUTDOWN`

mod connection;
pub mod dispatcher;
pub mod error;
mod keys;
mod lists;
mod server;
mod strings;
pub mod table;

pub use dispatcher::Dispatcher;
pub use error::{CommandError, CommandResult};
pub use table::{CommandSpec, CommandTable, Handler, ReplyKind};

use crate::protocol::Reply;
use crate::server::{Server, Session};
use bytes::Bytes;

/// What a handler produced, before it is mapped onto a [`Reply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Nil,
    Bool(bool),
    Int(i64),
    Str(Bytes),
    Array(Vec<Output>),
    /// The handler already wrote its reply (or none is due).
    NoReply,
}

impl Output {
    pub fn str(s: impl Into<Bytes>) -> Self {
        Output::Str(s.into())
    }

    /// Maps the output onto the wire according to the command's [`ReplyKind`].
    pub fn into_reply(self, kind: ReplyKind) -> Option<Reply> {
        match (kind, self) {
            (_, Output::NoReply) => None,
            (ReplyKind::Status, Output::Str(s)) => {
                Some(Reply::Status(String::from_utf8_lossy(&s).into_owned()))
            }
            (ReplyKind::OkOnTrue, Output::Bool(true)) => Some(Reply::ok()),
            (_, other) => Some(other.into_generic()),
        }
    }

    fn into_generic(self) -> Reply {
        match self {
            Output::Nil | Output::NoReply => Reply::Null,
            Output::Bool(b) => Reply::Integer(b as i64),
            Output::Int(n) => Reply::Integer(n),
            Output::Str(s) => Reply::Bulk(s),
            Output::Array(items) => {
                Reply::Array(items.into_iter().map(Output::into_generic).collect())
            }
        }
    }
}

impl From<bool> for Output {
    fn from(b: bool) -> Self {
        Output::Bool(b)
    }
}

impl From<i64> for Output {
    fn from(n: i64) -> Self {
        Output::Int(n)
    }
}

impl From<usize> for Output {
    fn from(n: usize) -> Self {
        Output::Int(n as i64)
    }
}

impl From<Bytes> for Output {
    fn from(s: Bytes) -> Self {
        Output::Str(s)
    }
}

impl From<Option<Bytes>> for Output {
    fn from(s: Option<Bytes>) -> Self {
        s.map_or(Output::Nil, Output::Str)
    }
}

impl From<Vec<Bytes>> for Output {
    fn from(items: Vec<Bytes>) -> Self {
        Output::Array(items.into_iter().map(Output::Str).collect())
    }
}

/// What a session handler gets to work with.
pub struct CommandContext<'a> {
    pub server: &'a Server,
    pub session: &'a mut Session,
}

/// Strict integer coercion: the argument must be the canonical decimal form
/// of an `i64` (no sign prefix `+`, no leading zeros, no whitespace).
pub fn parse_integer(arg: &[u8]) -> CommandResult<i64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok().filter(|n| n.to_string() == s))
        .ok_or(CommandError::NotAnInteger)
}

/// Case-insensitive comparison against an option keyword.
#[inline]
pub(crate) fn is_keyword(arg: &[u8], keyword: &str) -> bool {
    arg.eq_ignore_ascii_case(keyword.as_bytes())
}

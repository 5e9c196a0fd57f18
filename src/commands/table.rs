//! The command table: name → arity, handler and reply mapping.

use super::{CommandContext, CommandResult};
use crate::storage::Keyspace;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

/// Handler that only needs the client's current database.
///
/// The dispatcher locks the database for the whole call, so the handler's
/// reads and writes are atomic with respect to every other client.
pub type KeyspaceHandler = fn(&mut Keyspace, &[Bytes]) -> CommandResult;

/// Handler that needs the session or server state. Locks databases itself.
pub type SessionHandler = fn(&mut CommandContext<'_>, &[Bytes]) -> CommandResult;

#[derive(Clone, Copy)]
pub enum Handler {
    Keyspace(KeyspaceHandler),
    Session(SessionHandler),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Keyspace(_) => f.write_str("Handler::Keyspace"),
            Handler::Session(_) => f.write_str("Handler::Session"),
        }
    }
}

/// How a handler's string or boolean result is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Booleans become `:1`/`:0`, strings become bulk strings.
    Generic,
    /// A string result is sent as a status line (`+PONG`, `+string`).
    Status,
    /// `true` is sent as `+OK`.
    OkOnTrue,
}

/// One command table entry.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    /// Lowercase command name
    pub name: &'static str,
    /// Minimum number of arguments after the name
    pub arity: usize,
    pub handler: Handler,
    pub reply: ReplyKind,
}

impl CommandSpec {
    pub const fn keyspace(name: &'static str, arity: usize, handler: KeyspaceHandler) -> Self {
        Self {
            name,
            arity,
            handler: Handler::Keyspace(handler),
            reply: ReplyKind::Generic,
        }
    }

    pub const fn session(name: &'static str, arity: usize, handler: SessionHandler) -> Self {
        Self {
            name,
            arity,
            handler: Handler::Session(handler),
            reply: ReplyKind::Generic,
        }
    }

    pub const fn replies(mut self, reply: ReplyKind) -> Self {
        self.reply = reply;
        self
    }
}

/// All registered commands, built once at startup.
#[derive(Debug, Default)]
pub struct CommandTable {
    entries: HashMap<&'static str, CommandSpec>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding every command this server implements.
    pub fn with_builtin_commands() -> Self {
        let mut table = Self::new();
        super::strings::register(&mut table);
        super::lists::register(&mut table);
        super::keys::register(&mut table);
        super::connection::register(&mut table);
        super::server::register(&mut table);
        table
    }

    pub fn register(&mut self, spec: CommandSpec) {
        self.entries.insert(spec.name, spec);
    }

    /// Looks up a lowercase command name.
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.entries.get(name)
    }

    /// Every registered name, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let table = CommandTable::with_builtin_commands();
        for name in [
            "get", "set", "incr", "getrange", "lpush", "rpoplpush", "lrem", "sort", "keys",
            "expireat", "select", "auth", "quit", "client", "config", "shutdown", "info",
        ] {
            assert!(table.get(name).is_some(), "missing {}", name);
        }
        assert!(table.get("GET").is_none());
        assert_eq!(table.get("set").unwrap().reply, ReplyKind::OkOnTrue);
        assert_eq!(table.get("type").unwrap().reply, ReplyKind::Status);
        assert_eq!(table.get("lpush").unwrap().arity, 2);

        let names = table.names();
        assert_eq!(names.len(), table.len());
        assert!(names.windows(2).all(|w| w[0] < w[1]));
    }
}

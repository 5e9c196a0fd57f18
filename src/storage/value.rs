//! Stored value types.
//!
//! A key holds exactly one kind of value. The kind is fixed when the key is
//! created and only changes when the whole key is replaced (for example by
//! `SET` over a list).

use bytes::Bytes;
use std::collections::VecDeque;
use thiserror::Error;

/// A value held by a key in a [`Keyspace`](super::Keyspace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Binary-safe string
    String(Bytes),
    /// Ordered list, deque for O(1) push/pop on both ends
    List(VecDeque<Bytes>),
}

impl Value {
    /// The name reported by `TYPE`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }
}

/// Which end of a list an operation works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Head,
    Tail,
}

/// Errors raised by typed keyspace accessors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// A string accessor hit a list, or the other way round.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
}

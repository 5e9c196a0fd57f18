//! RESP (Redis Serialization Protocol) Types
//!
//! Requests arrive as arrays of bulk strings (or as inline text lines) and are
//! decoded into a [`Request`]. Replies are built as [`Reply`] values and
//! serialized back into RESP.
//!
//! ## Reply Format
//!
//! Each reply starts with a type prefix byte:
//! - `+` Status
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk string (`$-1` for null)
//! - `*` Array
//!
//! All lines are terminated with CRLF (`\r\n`).

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const STATUS: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A decoded client request: a command name and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub name: Bytes,
    pub args: Vec<Bytes>,
}

impl Request {
    /// Splits a non-empty list of parts into name and arguments.
    pub fn from_parts(mut parts: Vec<Bytes>) -> Option<Self> {
        if parts.is_empty() {
            return None;
        }
        let args = parts.split_off(1);
        let name = parts.pop()?;
        Some(Self { name, args })
    }

    /// The command name lowercased, which is how the command table is keyed.
    pub fn command_name(&self) -> String {
        String::from_utf8_lossy(&self.name).to_ascii_lowercase()
    }
}

/// A reply to be sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Short status line such as `OK` or `PONG`.
    /// Format: `+<string>\r\n`
    Status(String),

    /// Error line, starting with an uppercase code token such as `ERR`.
    /// Format: `-<message>\r\n`
    Error(String),

    /// Format: `:<integer>\r\n`
    Integer(i64),

    /// Binary-safe string.
    /// Format: `$<length>\r\n<data>\r\n`
    Bulk(Bytes),

    /// Null bulk string: `$-1\r\n`
    Null,

    /// Format: `*<count>\r\n<element1><element2>...`
    Array(Vec<Reply>),
}

impl Reply {
    pub fn status(s: impl Into<String>) -> Self {
        Reply::Status(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(data.into())
    }

    /// Common response for successful operations
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    /// Serializes the reply into a fresh buffer.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.serialize_into(&mut buf);
        buf.freeze()
    }

    /// Serializes the reply onto the end of `buf`.
    pub fn serialize_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Status(s) => write_line(buf, prefix::STATUS, s.as_bytes()),
            Reply::Error(s) => write_line(buf, prefix::ERROR, s.as_bytes()),
            Reply::Integer(n) => write_line(buf, prefix::INTEGER, n.to_string().as_bytes()),
            Reply::Bulk(data) => {
                write_line(buf, prefix::BULK, data.len().to_string().as_bytes());
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            Reply::Null => write_line(buf, prefix::BULK, b"-1"),
            Reply::Array(values) => {
                write_line(buf, prefix::ARRAY, values.len().to_string().as_bytes());
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

#[inline]
fn write_line(buf: &mut BytesMut, prefix: u8, content: &[u8]) {
    buf.reserve(content.len() + 3);
    buf.put_u8(prefix);
    buf.put_slice(content);
    buf.put_slice(CRLF);
}

/// Renders replies the way `redis-cli` prints them; used in debug logs.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "(binary data, {} bytes)", data.len()),
            },
            Reply::Null => write!(f, "(nil)"),
            Reply::Array(values) if values.is_empty() => write!(f, "(empty array)"),
            Reply::Array(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}

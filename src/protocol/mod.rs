//! RESP Protocol Implementation
//!
//! This is the wire layer around the command core: it turns bytes from the
//! socket into [`Request`]s and [`Reply`] values back into bytes.
//!
//! ## Modules
//!
//! - `types`: `Request`, `Reply` and reply serialization
//! - `parser`: incremental request parser (multibulk and inline)
//!
//! ## Example
//!
//! ```
//! use tidekv::protocol::{Reply, RequestParser};
//! use bytes::BytesMut;
//!
//! let mut parser = RequestParser::new();
//! let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n"[..]);
//! let request = parser.parse(&mut buf).unwrap().unwrap();
//! assert_eq!(request.command_name(), "get");
//!
//! let bytes = Reply::bulk("Ariz").serialize();
//! assert_eq!(&bytes[..], b"$4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{ParseError, ParseResult, RequestParser};
pub use types::{Reply, Request};

//! Incremental RESP Request Parser
//!
//! Clients send commands either as a RESP array of bulk strings
//! (`*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`) or as an inline line of
//! space-separated words (`GET name\r\n`, what `telnet` users type).
//!
//! ## How the Parser Works
//!
//! The parser looks at the connection's read buffer and either:
//! - finds a complete request, splits it off the buffer and returns it,
//! - finds an incomplete request and leaves the buffer untouched (`Ok(None)`),
//! - finds invalid data and returns a [`ParseError`].
//!
//! Arguments are returned as `Bytes` slices of the split-off frame, so no
//! argument is copied on its way to the command handlers.

use crate::protocol::types::{prefix, Request, CRLF};
use bytes::BytesMut;
use thiserror::Error;

/// Errors that can occur while parsing a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A length or count line was not an integer
    #[error("invalid {kind} length '{text}'")]
    InvalidLength { kind: &'static str, text: String },

    /// Bulk string length is negative
    #[error("invalid bulk length: {0}")]
    InvalidBulkLength(i64),

    /// Too many arguments in one request
    #[error("invalid multibulk length: {0}")]
    InvalidMultibulkLength(i64),

    /// Protocol violation (missing CRLF, unexpected byte, etc.)
    #[error("{0}")]
    Protocol(String),

    /// A single argument exceeds the allowed size
    #[error("bulk too large: {size} bytes (max: {max})")]
    BulkTooLarge { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size of a single argument (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of arguments in one request
pub const MAX_MULTIBULK_LENGTH: i64 = 1024 * 1024;

/// Maximum length of an inline request line
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// A complete frame found in the buffer: its total length and the byte
/// ranges of each part within it.
struct Frame {
    len: usize,
    spans: Vec<(usize, usize)>,
}

/// Incremental request parser, one per connection.
#[derive(Debug, Default)]
pub struct RequestParser {
    /// Requests parsed so far (for trace logging)
    parsed: u64,
}

impl RequestParser {
    pub fn new() -> Self {
        Self { parsed: 0 }
    }

    /// Number of requests this parser has produced.
    pub fn parsed(&self) -> u64 {
        self.parsed
    }

    /// Splits the next complete request off the front of `buf`.
    ///
    /// Empty requests (`*0\r\n`, blank inline lines) are consumed and skipped.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(request))` - a complete request was consumed from `buf`
    /// - `Ok(None)` - `buf` holds no complete request yet
    /// - `Err(e)` - protocol violation; the connection should be closed
    pub fn parse(&mut self, buf: &mut BytesMut) -> ParseResult<Option<Request>> {
        loop {
            let Some(&first) = buf.first() else {
                return Ok(None);
            };

            let frame = if first == prefix::ARRAY {
                scan_multibulk(buf)?
            } else {
                scan_inline(buf)?
            };
            let Some(frame) = frame else {
                return Ok(None);
            };

            let data = buf.split_to(frame.len).freeze();
            let parts = frame
                .spans
                .iter()
                .map(|&(start, end)| data.slice(start..end))
                .collect();

            if let Some(request) = Request::from_parts(parts) {
                self.parsed += 1;
                return Ok(Some(request));
            }
        }
    }
}

/// Scans `*<count>\r\n` followed by `count` bulk strings.
fn scan_multibulk(buf: &[u8]) -> ParseResult<Option<Frame>> {
    debug_assert!(buf[0] == prefix::ARRAY);

    let Some(line_len) = find_crlf(&buf[1..]) else {
        return Ok(None);
    };
    let count = parse_length(&buf[1..1 + line_len], "multibulk")?;
    if count > MAX_MULTIBULK_LENGTH {
        return Err(ParseError::InvalidMultibulkLength(count));
    }

    let mut pos = 1 + line_len + 2;
    if count <= 0 {
        return Ok(Some(Frame {
            len: pos,
            spans: Vec::new(),
        }));
    }

    let mut spans = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let Some(&marker) = buf.get(pos) else {
            return Ok(None);
        };
        if marker != prefix::BULK {
            return Err(ParseError::Protocol(format!(
                "expected '$', got '{}'",
                marker as char
            )));
        }

        let Some(line_len) = find_crlf(&buf[pos + 1..]) else {
            return Ok(None);
        };
        let len = parse_length(&buf[pos + 1..pos + 1 + line_len], "bulk")?;
        if len < 0 {
            return Err(ParseError::InvalidBulkLength(len));
        }
        let len = len as usize;
        if len > MAX_BULK_SIZE {
            return Err(ParseError::BulkTooLarge {
                size: len,
                max: MAX_BULK_SIZE,
            });
        }

        let start = pos + 1 + line_len + 2;
        let end = start + len;
        if buf.len() < end + 2 {
            return Ok(None);
        }
        if &buf[end..end + 2] != CRLF {
            return Err(ParseError::Protocol(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        spans.push((start, end));
        pos = end + 2;
    }

    Ok(Some(Frame { len: pos, spans }))
}

/// Scans one inline line, splitting it on spaces and tabs.
fn scan_inline(buf: &[u8]) -> ParseResult<Option<Frame>> {
    let Some(newline) = buf.iter().position(|&b| b == b'\n') else {
        if buf.len() > MAX_INLINE_SIZE {
            return Err(ParseError::Protocol("too big inline request".to_string()));
        }
        return Ok(None);
    };

    let line_end = if newline > 0 && buf[newline - 1] == b'\r' {
        newline - 1
    } else {
        newline
    };

    let mut spans = Vec::new();
    let mut start = None;
    for (i, &b) in buf[..line_end].iter().enumerate() {
        let blank = b == b' ' || b == b'\t';
        match (start, blank) {
            (None, false) => start = Some(i),
            (Some(s), true) => {
                spans.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, line_end));
    }

    Ok(Some(Frame {
        len: newline + 1,
        spans,
    }))
}

fn parse_length(line: &[u8], kind: &'static str) -> ParseResult<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::InvalidLength {
            kind,
            text: String::from_utf8_lossy(line).into_owned(),
        })
}

/// Position of the first CRLF in `buf`, if any.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn parse_all(input: &[u8]) -> (Vec<Request>, BytesMut) {
        let mut parser = RequestParser::new();
        let mut buf = BytesMut::from(input);
        let mut requests = Vec::new();
        while let Some(request) = parser.parse(&mut buf).unwrap() {
            requests.push(request);
        }
        (requests, buf)
    }

    fn parts(request: &Request) -> Vec<&[u8]> {
        std::iter::once(&request.name)
            .chain(request.args.iter())
            .map(|b| b.as_ref())
            .collect()
    }

    #[test]
    fn test_parse_multibulk() {
        let (requests, rest) = parse_all(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
        assert_eq!(requests.len(), 1);
        assert_eq!(parts(&requests[0]), vec![&b"GET"[..], b"name"]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_parse_incomplete_leaves_buffer() {
        let input = b"*2\r\n$3\r\nGET\r\n$4\r\nna";
        let (requests, rest) = parse_all(input);
        assert!(requests.is_empty());
        assert_eq!(&rest[..], &input[..]);

        let (requests, _) = parse_all(b"*2\r\n$3\r\nGET\r\n");
        assert!(requests.is_empty());
        let (requests, _) = parse_all(b"*2");
        assert!(requests.is_empty());
    }

    #[test]
    fn test_parse_pipelined() {
        let (requests, rest) =
            parse_all(b"*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n*1\r\n$4\r\nPI");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].args, vec![Bytes::from("hi")]);
        assert_eq!(&rest[..], b"*1\r\n$4\r\nPI");
    }

    #[test]
    fn test_parse_binary_and_empty_args() {
        let (requests, _) = parse_all(b"*3\r\n$3\r\nSET\r\n$0\r\n\r\n$5\r\nhel\x00o\r\n");
        assert_eq!(requests[0].args[0], Bytes::new());
        assert_eq!(requests[0].args[1], Bytes::from_static(b"hel\x00o"));
    }

    #[test]
    fn test_parse_inline() {
        let (requests, rest) = parse_all(b"SET  name\tAriz\r\nPING\n\r\n  \n");
        assert_eq!(requests.len(), 2);
        assert_eq!(parts(&requests[0]), vec![&b"SET"[..], b"name", b"Ariz"]);
        assert_eq!(parts(&requests[1]), vec![&b"PING"[..]]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_empty_multibulk_is_skipped() {
        let (requests, rest) = parse_all(b"*0\r\n*1\r\n$4\r\nPING\r\n");
        assert_eq!(requests.len(), 1);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        let mut parser = RequestParser::new();

        let mut buf = BytesMut::from(&b"*x\r\n"[..]);
        assert!(matches!(
            parser.parse(&mut buf),
            Err(ParseError::InvalidLength { kind: "multibulk", .. })
        ));

        let mut buf = BytesMut::from(&b"*1\r\n:1\r\n"[..]);
        assert!(matches!(parser.parse(&mut buf), Err(ParseError::Protocol(_))));

        let mut buf = BytesMut::from(&b"*1\r\n$-5\r\n"[..]);
        assert_eq!(parser.parse(&mut buf), Err(ParseError::InvalidBulkLength(-5)));

        let mut buf = BytesMut::from(&b"*1\r\n$3\r\nabcXY"[..]);
        assert!(matches!(parser.parse(&mut buf), Err(ParseError::Protocol(_))));
    }

    #[test]
    fn test_parsed_counter() {
        let mut parser = RequestParser::new();
        let mut buf = BytesMut::from(&b"PING\r\nPING\r\n"[..]);
        while parser.parse(&mut buf).unwrap().is_some() {}
        assert_eq!(parser.parsed(), 2);
    }
}

//! Connection Handler Module
//!
//! Each client gets its own handler task that reads requests, runs them
//! through the [`Server`] and writes the replies back.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned, client registered (id, addr)
//!        │
//!        ▼
//! 3. ┌──────────────────────────────────────┐
//!    │      Main Loop                       │
//!    │                                      │
//!    │  Parse every complete request        │
//!    │  Execute each, collect replies       │
//!    │  Flush replies in one write          │
//!    │              │                       │
//!    │              ▼                       │
//!    │  Wait for: more bytes | kill signal  │
//!    │              │                       │
//!    │         [Loop back]                  │
//!    └──────────────────────────────────────┘
//!        │
//!        ▼
//! 4. QUIT, CLIENT KILL, SHUTDOWN, protocol error or disconnect
//!        │
//!        ▼
//! 5. Client unregistered, handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! Incoming bytes accumulate in a `BytesMut`. TCP is a stream, so one read may
//! hold half a request or several pipelined ones; the parser only consumes
//! complete requests and leaves the rest for the next read.

use crate::protocol::{ParseError, Reply, Request, RequestParser};
use crate::server::{Server, Session};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Maximum size for the read buffer (1 GB, the largest query Redis accepts)
const MAX_BUFFER_SIZE: usize = 1024 * 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    parser: RequestParser,

    server: Arc<Server>,

    session: Session,

    /// Flips when another client runs `CLIENT KILL` on us, or on `SHUTDOWN`
    kill_rx: watch::Receiver<bool>,
}

impl ConnectionHandler {
    /// Creates a handler and registers the client with the server.
    pub fn new(stream: TcpStream, addr: SocketAddr, server: Arc<Server>) -> Self {
        let session = server.open_session(addr, raw_fd(&stream));
        let kill_rx = session.client().subscribe_kill();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: RequestParser::new(),
            server,
            session,
            kill_rx,
        }
    }

    /// Runs the connection until the client leaves or is closed.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, id = self.session.client().id(), "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.server.close_session(&self.session);
        debug!(client = %self.addr, parsed = self.parser.parsed(), "Session closed");
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        let mut out = BytesMut::new();
        loop {
            if self.session.client().is_killed() {
                return Ok(());
            }

            while let Some(request) = self.try_parse_request(&mut out).await? {
                self.execute(&request, &mut out);
                if self.session.is_closing() || self.session.client().is_killed() {
                    self.send(&mut out).await?;
                    return Ok(());
                }
            }
            self.send(&mut out).await?;

            tokio::select! {
                read = read_more_data(&mut self.stream, &mut self.buffer) => {
                    let n = read?;
                    self.server.stats().bytes_read(n);
                    trace!(client = %self.addr, bytes = n, "Read data");
                }
                _ = self.kill_rx.changed() => {
                    debug!(client = %self.addr, "Connection killed");
                    return Ok(());
                }
            }
        }
    }

    /// Runs one request and queues everything it produced.
    fn execute(&mut self, request: &Request, out: &mut BytesMut) {
        let reply = self.server.execute(&mut self.session, request);

        for queued in self.session.take_outbox() {
            queued.serialize_into(out);
        }
        if let Some(reply) = reply {
            trace!(client = %self.addr, reply = %reply, "Reply");
            reply.serialize_into(out);
        }
    }

    /// Attempts to parse a request from the buffer.
    ///
    /// On a protocol error the client is told why before the error is returned.
    async fn try_parse_request(
        &mut self,
        out: &mut BytesMut,
    ) -> Result<Option<Request>, ConnectionError> {
        match self.parser.parse(&mut self.buffer) {
            Ok(Some(request)) => {
                trace!(
                    client = %self.addr,
                    remaining = self.buffer.len(),
                    "Parsed request"
                );
                Ok(Some(request))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Parse error");
                Reply::error(format!("ERR Protocol error: {}", e)).serialize_into(out);
                self.send(out).await?;
                Err(ConnectionError::ParseError(e))
            }
        }
    }

    /// Writes and flushes everything queued in `out`.
    async fn send(&mut self, out: &mut BytesMut) -> Result<(), ConnectionError> {
        if out.is_empty() {
            return Ok(());
        }
        let bytes = out.split().freeze();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.server.stats().bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Sent replies");
        Ok(())
    }
}

/// Reads more data from the socket into the buffer.
async fn read_more_data(
    stream: &mut BufWriter<TcpStream>,
    buffer: &mut BytesMut,
) -> Result<usize, ConnectionError> {
    if buffer.len() >= MAX_BUFFER_SIZE {
        error!(size = buffer.len(), "Buffer size limit exceeded");
        return Err(ConnectionError::BufferFull);
    }

    if buffer.capacity() - buffer.len() < 1024 {
        buffer.reserve(4096);
    }

    let n = stream.get_mut().read_buf(buffer).await?;
    if n == 0 {
        return if buffer.is_empty() {
            Err(ConnectionError::ClientDisconnected)
        } else {
            Err(ConnectionError::UnexpectedEof)
        };
    }
    Ok(n)
}

#[cfg(unix)]
fn raw_fd(stream: &TcpStream) -> i64 {
    use std::os::unix::io::AsRawFd;
    stream.as_raw_fd() as i64
}

#[cfg(not(unix))]
fn raw_fd(_stream: &TcpStream) -> i64 {
    -1
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed request; the client has been sent an error and is dropped
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial request)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection to completion.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, server: Arc<Server>) {
    let handler = ConnectionHandler::new(stream, addr, server);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerOptions;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn create_test_server(options: ServerOptions) -> (SocketAddr, Arc<Server>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(Server::new(options));

        let server_clone = Arc::clone(&server);
        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                tokio::spawn(handle_connection(stream, client_addr, Arc::clone(&server_clone)));
            }
        });

        (addr, server)
    }

    /// Reads exactly `expected.len()` bytes and compares them.
    async fn expect_reply(client: &mut TcpStream, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        assert_eq!(
            String::from_utf8_lossy(&buf),
            String::from_utf8_lossy(expected)
        );
    }

    async fn expect_closed(client: &mut TcpStream) {
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("timed out waiting for close")
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (addr, _) = create_test_server(ServerOptions::default()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        expect_reply(&mut client, b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn test_set_get() {
        let (addr, _) = create_test_server(ServerOptions::default()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$4\r\nname\r\n$4\r\nAriz\r\n")
            .await
            .unwrap();
        expect_reply(&mut client, b"+OK\r\n").await;

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
            .await
            .unwrap();
        expect_reply(&mut client, b"$4\r\nAriz\r\n").await;
    }

    #[tokio::test]
    async fn test_pipelined_requests() {
        let (addr, _) = create_test_server(ServerOptions::default()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv1\r\n*3\r\n$3\r\nSET\r\n$2\r\nk2\r\n$2\r\nv2\r\n*2\r\n$3\r\nGET\r\n$2\r\nk1\r\n*2\r\n$3\r\nGET\r\n$2\r\nk2\r\n")
            .await
            .unwrap();
        expect_reply(&mut client, b"+OK\r\n+OK\r\n$2\r\nv1\r\n$2\r\nv2\r\n").await;
    }

    #[tokio::test]
    async fn test_request_split_across_writes() {
        let (addr, _) = create_test_server(ServerOptions::default()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*2\r\n$4\r\nECHO\r\n$5\r\nhel").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.write_all(b"lo\r\n").await.unwrap();
        expect_reply(&mut client, b"$5\r\nhello\r\n").await;
    }

    #[tokio::test]
    async fn test_inline_requests() {
        let (addr, _) = create_test_server(ServerOptions::default()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"SET greeting hi\r\nGET greeting\r\n").await.unwrap();
        expect_reply(&mut client, b"+OK\r\n$2\r\nhi\r\n").await;
    }

    #[tokio::test]
    async fn test_errors_keep_connection_open() {
        let (addr, _) = create_test_server(ServerOptions::default()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"RPUSH l a\r\nGET l\r\nNOPE\r\nLLEN l\r\n").await.unwrap();
        expect_reply(
            &mut client,
            b":1\r\n-WRONGTYPE Operation against a key holding the wrong kind of value\r\n-ERR unknown command 'nope'\r\n:1\r\n",
        )
        .await;
    }

    #[tokio::test]
    async fn test_quit_replies_then_closes() {
        let (addr, _) = create_test_server(ServerOptions::default()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"QUIT\r\nPING\r\n").await.unwrap();
        expect_reply(&mut client, b"+OK\r\n").await;
        expect_closed(&mut client).await;
    }

    #[tokio::test]
    async fn test_protocol_error_closes() {
        let (addr, _) = create_test_server(ServerOptions::default()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$x\r\n").await.unwrap();
        expect_reply(&mut client, b"-ERR Protocol error: invalid bulk length 'x'\r\n").await;
        expect_closed(&mut client).await;
    }

    #[tokio::test]
    async fn test_client_kill_closes_other_connection() {
        let (addr, server) = create_test_server(ServerOptions::default()).await;
        let mut victim = TcpStream::connect(addr).await.unwrap();
        victim.write_all(b"PING\r\n").await.unwrap();
        expect_reply(&mut victim, b"+PONG\r\n").await;

        let victim_addr = victim.local_addr().unwrap().to_string();
        let mut admin = TcpStream::connect(addr).await.unwrap();
        let kill = format!("CLIENT KILL {}\r\n", victim_addr);
        admin.write_all(kill.as_bytes()).await.unwrap();
        expect_reply(&mut admin, b"+OK\r\n").await;

        expect_closed(&mut victim).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(server.clients().len(), 1);
    }

    #[tokio::test]
    async fn test_auth_required() {
        let (addr, _) = create_test_server(ServerOptions {
            requirepass: "secret".to_string(),
            ..Default::default()
        })
        .await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"GET k\r\nAUTH secret\r\nGET k\r\n").await.unwrap();
        expect_reply(&mut client, b"-ERR operation not permitted\r\n+OK\r\n$-1\r\n").await;
    }

    #[tokio::test]
    async fn test_expiry_over_the_wire() {
        let (addr, _) = create_test_server(ServerOptions::default()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"SET k v PX 50\r\nGET k\r\n").await.unwrap();
        expect_reply(&mut client, b"+OK\r\n$1\r\nv\r\n").await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        client.write_all(b"GET k\r\nTTL k\r\n").await.unwrap();
        expect_reply(&mut client, b"$-1\r\n:-2\r\n").await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_everyone() {
        let (addr, server) = create_test_server(ServerOptions::default()).await;
        let mut other = TcpStream::connect(addr).await.unwrap();
        other.write_all(b"PING\r\n").await.unwrap();
        expect_reply(&mut other, b"+PONG\r\n").await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"SHUTDOWN\r\n").await.unwrap();
        expect_closed(&mut client).await;
        expect_closed(&mut other).await;
        assert!(server.is_shutting_down());
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, server) = create_test_server(ServerOptions::default()).await;
        let stats = server.stats();
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        expect_reply(&mut client, b"+PONG\r\n").await;

        assert_eq!(stats.total_connections(), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert!(stats.total_commands() >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(client);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}

//! Connected clients: per-connection metadata and the server-wide registry.
//!
//! A [`ClientHandle`] is shared between the connection task that owns the
//! socket and the registry, so `CLIENT LIST` and `CLIENT KILL` issued on one
//! connection can observe and close any other.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;

/// Mutable state of one client, guarded by the handle's mutex.
#[derive(Debug)]
struct ClientMeta {
    db: usize,
    name: Option<Bytes>,
    last_active: Instant,
    last_command: Option<String>,
}

/// One connected client.
#[derive(Debug)]
pub struct ClientHandle {
    id: u64,
    addr: SocketAddr,
    /// Raw socket descriptor, -1 when unknown
    fd: i64,
    connected_at: Instant,
    meta: Mutex<ClientMeta>,
    kill_tx: watch::Sender<bool>,
}

impl ClientHandle {
    pub fn new(id: u64, addr: SocketAddr, fd: i64) -> Self {
        let now = Instant::now();
        let (kill_tx, _) = watch::channel(false);
        Self {
            id,
            addr,
            fd,
            connected_at: now,
            meta: Mutex::new(ClientMeta {
                db: 0,
                name: None,
                last_active: now,
                last_command: None,
            }),
            kill_tx,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn meta(&self) -> MutexGuard<'_, ClientMeta> {
        self.meta.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Index of the currently selected database.
    pub fn db(&self) -> usize {
        self.meta().db
    }

    pub fn set_db(&self, db: usize) {
        self.meta().db = db;
    }

    pub fn name(&self) -> Option<Bytes> {
        self.meta().name.clone()
    }

    /// Sets the connection name; an empty name clears it.
    pub fn set_name(&self, name: Bytes) {
        self.meta().name = if name.is_empty() { None } else { Some(name) };
    }

    /// Records activity: called once per request before it executes.
    pub fn touch(&self, command: &str) {
        let mut meta = self.meta();
        meta.last_active = Instant::now();
        meta.last_command = Some(command.to_string());
    }

    /// Seconds since the last request.
    pub fn idle_secs(&self) -> u64 {
        self.meta().last_active.elapsed().as_secs()
    }

    /// Asks the owning connection task to close the socket.
    pub fn kill(&self) {
        self.kill_tx.send_replace(true);
    }

    pub fn is_killed(&self) -> bool {
        *self.kill_tx.borrow()
    }

    /// Receiver that flips to `true` once [`kill`](Self::kill) is called.
    pub fn subscribe_kill(&self) -> watch::Receiver<bool> {
        self.kill_tx.subscribe()
    }

    /// One `CLIENT LIST` line, without the trailing newline.
    pub fn describe(&self) -> String {
        let meta = self.meta();
        let name = meta
            .name
            .as_ref()
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        let closing = self.is_killed();

        let mut line = String::with_capacity(192);
        let _ = write!(
            line,
            "id={} addr={} fd={} name={} age={} idle={} flags={} db={} \
             sub=0 psub=0 multi=-1 qbuf=0 qbuf-free=0 obl=0 oll=0 omem=0 events={} cmd={}",
            self.id,
            self.addr,
            self.fd,
            name,
            self.connected_at.elapsed().as_secs(),
            meta.last_active.elapsed().as_secs(),
            if closing { "c" } else { "N" },
            meta.db,
            if closing { "" } else { "r" },
            meta.last_command.as_deref().unwrap_or("NULL"),
        );
        line
    }
}

/// Connection names must be non-empty runs of printable, non-space ASCII.
pub fn is_valid_client_name(name: &[u8]) -> bool {
    name.iter().all(|&b| (b'!'..=b'~').contains(&b))
}

/// All connected clients, keyed by id.
#[derive(Debug)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: Mutex<BTreeMap<u64, Arc<ClientHandle>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            clients: Mutex::new(BTreeMap::new()),
        }
    }

    fn clients(&self) -> MutexGuard<'_, BTreeMap<u64, Arc<ClientHandle>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new connection and assigns it the next id.
    pub fn register(&self, addr: SocketAddr, fd: i64) -> Arc<ClientHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = Arc::new(ClientHandle::new(id, addr, fd));
        self.clients().insert(id, Arc::clone(&handle));
        handle
    }

    pub fn unregister(&self, id: u64) {
        self.clients().remove(&id);
    }

    /// Snapshot of every registered client in id order.
    pub fn list(&self) -> Vec<Arc<ClientHandle>> {
        self.clients().values().cloned().collect()
    }

    /// Finds a client by its `ip:port` string.
    pub fn find_by_addr(&self, addr: &[u8]) -> Option<Arc<ClientHandle>> {
        self.clients()
            .values()
            .find(|client| client.addr().to_string().as_bytes() == addr)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kill_all(&self) {
        for client in self.clients().values() {
            client.kill();
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_register_assigns_increasing_ids() {
        let registry = ClientRegistry::new();
        let a = registry.register(addr(5000), 7);
        let b = registry.register(addr(5001), 8);
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(registry.len(), 2);

        registry.unregister(a.id());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].id(), 2);
    }

    #[test]
    fn test_find_by_addr() {
        let registry = ClientRegistry::new();
        let client = registry.register(addr(5000), -1);
        let found = registry.find_by_addr(b"127.0.0.1:5000").unwrap();
        assert_eq!(found.id(), client.id());
        assert!(registry.find_by_addr(b"127.0.0.1:5999").is_none());
    }

    #[test]
    fn test_describe_line() {
        let client = ClientHandle::new(3, addr(6000), 9);
        client.set_db(2);
        client.set_name(Bytes::from("worker"));
        client.touch("get");

        let line = client.describe();
        assert!(line.starts_with(
            "id=3 addr=127.0.0.1:6000 fd=9 name=worker age=0 idle=0 flags=N db=2 "
        ));
        assert!(line.ends_with("events=r cmd=get"));

        let fresh = ClientHandle::new(4, addr(6001), -1);
        assert!(fresh.describe().contains("name= "));
        assert!(fresh.describe().ends_with("cmd=NULL"));
    }

    #[test]
    fn test_empty_name_clears() {
        let client = ClientHandle::new(1, addr(6000), -1);
        client.set_name(Bytes::from("a"));
        client.set_name(Bytes::new());
        assert_eq!(client.name(), None);
    }

    #[test]
    fn test_client_name_validation() {
        assert!(is_valid_client_name(b"worker-1"));
        assert!(!is_valid_client_name(b"two words"));
        assert!(!is_valid_client_name(b"line\n"));
        assert!(!is_valid_client_name("caf\u{e9}".as_bytes()));
    }

    #[tokio::test]
    async fn test_kill_notifies_subscribers() {
        let registry = ClientRegistry::new();
        let client = registry.register(addr(5000), -1);
        let mut rx = client.subscribe_kill();

        registry.kill_all();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(client.is_killed());
        assert!(client.describe().contains("flags=c"));
    }
}

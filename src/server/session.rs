//! Per-connection command state.

use super::client::ClientHandle;
use crate::protocol::Reply;
use std::sync::Arc;

/// The state a command handler sees for the connection it runs on.
///
/// Owned by the connection task; shared state (db index, name) lives on the
/// [`ClientHandle`] so other connections can read it.
#[derive(Debug)]
pub struct Session {
    client: Arc<ClientHandle>,
    authenticated: bool,
    /// Replies written directly by a handler, flushed before the handler's own reply
    outbox: Vec<Reply>,
    closing: bool,
}

impl Session {
    pub fn new(client: Arc<ClientHandle>, authenticated: bool) -> Self {
        Self {
            client,
            authenticated,
            outbox: Vec::new(),
            closing: false,
        }
    }

    pub fn client(&self) -> &Arc<ClientHandle> {
        &self.client
    }

    pub fn db(&self) -> usize {
        self.client.db()
    }

    pub fn select(&mut self, db: usize) {
        self.client.set_db(db);
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn authenticate(&mut self) {
        self.authenticated = true;
    }

    /// Queues a reply for the socket outside the normal reply path.
    pub fn write(&mut self, reply: Reply) {
        self.outbox.push(reply);
    }

    pub fn take_outbox(&mut self) -> Vec<Reply> {
        std::mem::take(&mut self.outbox)
    }

    /// Marks the connection to be closed once pending output is flushed.
    pub fn close(&mut self) {
        self.closing = true;
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }
}

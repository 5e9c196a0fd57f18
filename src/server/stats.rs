use std::sync::atomic::{AtomicU64, Ordering};

/// Server-wide counters reported by `INFO`.
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Total number of connections accepted
    pub connections_received: AtomicU64,
    /// Currently open connections
    pub active_connections: AtomicU64,
    /// Total requests dispatched, including rejected ones
    pub commands_processed: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_received.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn total_connections(&self) -> u64 {
        self.connections_received.load(Ordering::Relaxed)
    }

    pub fn total_commands(&self) -> u64 {
        self.commands_processed.load(Ordering::Relaxed)
    }
}

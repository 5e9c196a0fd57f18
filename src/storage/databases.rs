//! The fixed set of logical databases shared by every client.

use super::keyspace::Keyspace;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of databases, as in Redis.
pub const DEFAULT_DATABASES: usize = 16;

/// Databases `0..N`, each behind its own lock.
///
/// Commands lock exactly one database at a time, so there is no lock ordering
/// to worry about.
#[derive(Debug)]
pub struct Databases {
    dbs: Vec<Mutex<Keyspace>>,
}

impl Databases {
    /// Creates `count` empty databases. At least one is always created.
    pub fn new(count: usize) -> Self {
        let dbs = (0..count.max(1)).map(|id| Mutex::new(Keyspace::new(id))).collect();
        Self { dbs }
    }

    pub fn len(&self) -> usize {
        self.dbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dbs.is_empty()
    }

    /// Locks database `index`, or returns `None` if there is no such database.
    ///
    /// A lock poisoned by a panicking command is recovered; every keyspace
    /// method leaves the maps consistent before it can panic.
    pub fn lock(&self, index: usize) -> Option<MutexGuard<'_, Keyspace>> {
        self.dbs
            .get(index)
            .map(|db| db.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Runs `f` against every database in index order, one lock at a time.
    pub fn for_each(&self, mut f: impl FnMut(&mut Keyspace)) {
        for db in &self.dbs {
            let mut guard = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard);
        }
    }

    /// Removes expired keys from every database. Returns how many were removed.
    pub fn remove_expired(&self) -> usize {
        let mut removed = 0;
        self.for_each(|db| removed += db.remove_expired());
        removed
    }

    /// Stored keys across all databases, without sweeping expired ones.
    pub fn stored_keys(&self) -> usize {
        let mut total = 0;
        self.for_each(|db| total += db.stored_len());
        total
    }

    /// Live keys across all databases.
    pub fn total_keys(&self) -> usize {
        let mut total = 0;
        self.for_each(|db| total += db.count());
        total
    }
}

impl Default for Databases {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASES)
    }
}

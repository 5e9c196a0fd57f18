//! One logical database: keys, typed values, and absolute expirations.
//!
//! ## Expiration
//!
//! Expirations are absolute unix timestamps in milliseconds, stored in a map
//! next to the values. A key whose deadline is at or before "now" is treated as
//! absent by every accessor and is physically removed on the spot (lazy expiry).
//! Enumerating operations (`all_keys`, `random_key`, `count`) sweep every
//! expired key first.
//!
//! A key without an entry in `expirations` lives forever. Removing a key always
//! removes its expiration too, so the expiration map never outlives its value.
//!
//! ## Concurrency
//!
//! `Keyspace` itself is a plain single-threaded structure. The server wraps each
//! database in a `Mutex` and a command runs to completion while holding it, so
//! no command ever observes another command's partial mutation.

use super::value::{ListEnd, StorageError, Value};
use bytes::Bytes;
use rand::seq::IteratorRandom;
use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

/// Result type for typed keyspace accessors.
pub type StorageResult<T> = Result<T, StorageError>;

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// The set of key → value mappings of one logical database.
#[derive(Debug, Default)]
pub struct Keyspace {
    /// Index of this database (`SELECT` target)
    id: usize,
    entries: HashMap<Bytes, Value>,
    /// Absolute deadline per key, unix milliseconds
    expirations: HashMap<Bytes, i64>,
}

impl Keyspace {
    /// Creates an empty database with the given index.
    pub fn new(id: usize) -> Self {
        Self {
            id,
            entries: HashMap::new(),
            expirations: HashMap::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Drops `key` if its deadline has passed. Returns true if it was removed.
    fn expire_if_due(&mut self, key: &[u8], now: i64) -> bool {
        match self.expirations.get(key) {
            Some(&deadline) if deadline <= now => {
                self.entries.remove(key);
                self.expirations.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Returns the live value of `key`, applying lazy expiry first.
    pub fn get(&mut self, key: &[u8]) -> Option<&Value> {
        self.expire_if_due(key, now_millis());
        self.entries.get(key)
    }

    fn get_mut(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.expire_if_due(key, now_millis());
        self.entries.get_mut(key)
    }

    /// True iff `key` exists and has not expired.
    pub fn has(&mut self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// `"string"`, `"list"` or `"none"`.
    pub fn key_type(&mut self, key: &[u8]) -> &'static str {
        self.get(key).map_or("none", Value::type_name)
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// Returns the string stored at `key`, `None` if absent.
    pub fn get_string(&mut self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::List(_)) => Err(StorageError::WrongType),
        }
    }

    /// Stores a string unconditionally, replacing any previous value or type
    /// and clearing any expiration.
    pub fn set_string(&mut self, key: Bytes, value: Bytes) {
        self.expirations.remove(&key);
        self.entries.insert(key, Value::String(value));
    }

    /// Writes back a string that was read from `key`, keeping its expiration.
    ///
    /// This is the "put" half of read-modify-write commands like `APPEND`.
    /// The caller must have checked the key's type first.
    pub fn replace_string(&mut self, key: Bytes, value: Bytes) {
        self.entries.insert(key, Value::String(value));
    }

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------

    /// Read access to the list at `key`, `None` if absent.
    pub fn list(&mut self, key: &[u8]) -> StorageResult<Option<&VecDeque<Bytes>>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::List(list)) => Ok(Some(list)),
            Some(Value::String(_)) => Err(StorageError::WrongType),
        }
    }

    /// Mutable access to an existing list at `key`, `None` if absent.
    ///
    /// Callers that may empty the list must go through [`Keyspace::pop_list`] or
    /// call [`Keyspace::unset`] themselves afterwards.
    pub fn list_mut(&mut self, key: &[u8]) -> StorageResult<Option<&mut VecDeque<Bytes>>> {
        match self.get_mut(key) {
            None => Ok(None),
            Some(Value::List(list)) => Ok(Some(list)),
            Some(Value::String(_)) => Err(StorageError::WrongType),
        }
    }

    /// Returns the list at `key`, creating an empty one if the key is absent.
    ///
    /// The caller is expected to push at least one element; an empty list is
    /// never left behind by a successful command.
    pub fn get_or_create_list(&mut self, key: &Bytes) -> StorageResult<&mut VecDeque<Bytes>> {
        self.expire_if_due(key, now_millis());
        let value = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Value::List(VecDeque::new()));

        match value {
            Value::List(list) => Ok(list),
            Value::String(_) => Err(StorageError::WrongType),
        }
    }

    /// Pops one element from `end` of the list at `key`.
    ///
    /// A list that becomes empty is deleted along with its expiration.
    pub fn pop_list(&mut self, key: &[u8], end: ListEnd) -> StorageResult<Option<Bytes>> {
        let Some(list) = self.list_mut(key)? else {
            return Ok(None);
        };

        let popped = match end {
            ListEnd::Head => list.pop_front(),
            ListEnd::Tail => list.pop_back(),
        };
        if list.is_empty() {
            self.unset(key);
        }
        Ok(popped)
    }

    // ------------------------------------------------------------------
    // Key management
    // ------------------------------------------------------------------

    /// Removes a key with its value and expiration. Returns true if a value
    /// was stored under it.
    pub fn unset(&mut self, key: &[u8]) -> bool {
        self.expirations.remove(key);
        self.entries.remove(key).is_some()
    }

    /// Moves the value and expiration of `old` to `new`.
    ///
    /// No-op when the names are equal or `old` holds nothing. Whatever `new`
    /// held is overwritten; callers implementing NX semantics check first.
    pub fn rename(&mut self, old: &[u8], new: Bytes) {
        if old == new.as_ref() {
            return;
        }
        let Some(value) = self.entries.remove(old) else {
            return;
        };

        match self.expirations.remove(old) {
            Some(deadline) => self.expirations.insert(new.clone(), deadline),
            None => self.expirations.remove(&new),
        };
        self.entries.insert(new, value);
    }

    /// Absolute deadline of `key` in unix milliseconds, if one is set.
    pub fn timeout(&mut self, key: &[u8]) -> Option<i64> {
        self.expire_if_due(key, now_millis());
        self.expirations.get(key).copied()
    }

    /// Sets or clears the absolute deadline of `key`.
    ///
    /// Has no effect on a key that holds no value; the store never materializes
    /// a key just to attach a deadline to it.
    pub fn set_timeout(&mut self, key: &[u8], deadline: Option<i64>) {
        match deadline {
            Some(deadline) if self.entries.contains_key(key) => {
                self.expirations.insert(Bytes::copy_from_slice(key), deadline);
            }
            _ => {
                self.expirations.remove(key);
            }
        }
    }

    /// Removes every expired key. Returns how many were removed.
    pub fn remove_expired(&mut self) -> usize {
        let now = now_millis();
        let due: Vec<Bytes> = self
            .expirations
            .iter()
            .filter(|(_, &deadline)| deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &due {
            self.entries.remove(key);
            self.expirations.remove(key);
        }
        due.len()
    }

    /// All live keys. Order is unspecified.
    pub fn all_keys(&mut self) -> Vec<Bytes> {
        self.remove_expired();
        self.entries.keys().cloned().collect()
    }

    /// An arbitrary live key, `None` if the database is empty.
    pub fn random_key(&mut self) -> Option<Bytes> {
        self.remove_expired();
        self.entries.keys().choose(&mut rand::thread_rng()).cloned()
    }

    /// Number of live keys.
    pub fn count(&mut self) -> usize {
        self.remove_expired();
        self.entries.len()
    }

    /// Number of live keys that carry an expiration.
    pub fn expires_count(&mut self) -> usize {
        self.remove_expired();
        self.expirations.len()
    }

    /// Number of stored entries, counting expired ones not yet removed.
    pub fn stored_len(&self) -> usize {
        self.entries.len()
    }

    /// Clears every key and expiration.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.expirations.clear();
    }
}

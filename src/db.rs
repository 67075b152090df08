use std::{collections::{HashMap, VecDeque}, sync::Mutex, time::{Duration, Instant}};
use thiserror::Error;


///
/// The data engine: one keyspace of tagged values plus the expiry index,
/// everything behind a single mutex. Every public operation takes the lock
/// for its whole duration, so each command is atomic and isolated.
///


/// A stored value. One key holds exactly one shape at a time; writing a
/// scalar over a list replaces it, and a list operation against a scalar
/// reports a type mismatch instead of shadowing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    String(String),
    List(VecDeque<String>),
    Hash(HashMap<String, String>),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::String(_) => "string",
            Object::List(_) => "list",
            Object::Hash(_) => "hash",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbError {
    #[error("Operation against a key holding the wrong kind of value")]
    WrongType,
}

pub type DbResult<T> = Result<T, DbError>;

/// Keyspace plus the expiry side table. Only ever touched under the
/// database mutex.
#[derive(Default)]
pub(crate) struct Store {
    pub(crate) dict: HashMap<String, Object>,
    pub(crate) expires: HashMap<String, Instant>,
}

impl Store {
    /// Drops the key if its deadline has passed. True when the key expired
    /// on this touch.
    pub(crate) fn expire_if_needed(&mut self, key: &str) -> bool {
        match self.expires.get(key) {
            Some(deadline) if Instant::now() >= *deadline => {
                self.dict.remove(key);
                self.expires.remove(key);
                true
            },
            _ => false,
        }
    }
}

pub struct Database {
    pub(crate) store: Mutex<Store>,
}

impl Database {
    pub fn new() -> Database {
        Database { store: Mutex::new(Store::default()) }
    }

    // ---- scalar operations ----

    /// Unconditional overwrite, whatever shape the key held before.
    pub fn set(&self, key: &str, value: &str) {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        store.dict.insert(key.to_string(), Object::String(value.to_string()));
    }

    pub fn get(&self, key: &str) -> DbResult<Option<String>> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(Object::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(DbError::WrongType),
            None => Ok(None),
        }
    }

    /// Every live key, in no particular order. Entries past their deadline
    /// are skipped, not returned stale.
    pub fn keys(&self) -> Vec<String> {
        let store = self.store.lock().unwrap();
        let now = Instant::now();
        let Store { dict, expires } = &*store;
        dict.keys()
            .filter(|k| match expires.get(*k) {
                Some(deadline) => now < *deadline,
                None => true,
            })
            .cloned()
            .collect()
    }

    pub fn key_type(&self, key: &str) -> &'static str {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(obj) => obj.type_name(),
            None => "none",
        }
    }

    /// Removes the key and its expiry entry in one step. True when
    /// anything was removed.
    pub fn del(&self, key: &str) -> bool {
        let mut store = self.store.lock().unwrap();
        if store.expire_if_needed(key) {
            return false;
        }
        let removed = store.dict.remove(key).is_some();
        store.expires.remove(key);
        removed
    }

    /// Records `now + seconds` against an existing key. A negative deadline
    /// is already in the past, so the key is removed right away.
    pub fn expire(&self, key: &str, seconds: i64) -> bool {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        if !store.dict.contains_key(key) {
            return false;
        }
        if seconds < 0 {
            store.dict.remove(key);
            store.expires.remove(key);
            return true;
        }
        // a deadline too far out to represent is as good as no deadline
        if let Some(deadline) = Instant::now().checked_add(Duration::from_secs(seconds as u64)) {
            store.expires.insert(key.to_string(), deadline);
        }
        true
    }

    /// Moves the value and any expiry entry from `src` to `dst`. Fails when
    /// `src` is missing, `dst` already exists, or the two names are equal.
    pub fn rename(&self, src: &str, dst: &str) -> bool {
        let mut store = self.store.lock().unwrap();
        if src == dst {
            return false;
        }
        store.expire_if_needed(src);
        store.expire_if_needed(dst);
        if store.dict.contains_key(dst) {
            return false;
        }
        let obj = match store.dict.remove(src) {
            Some(obj) => obj,
            None => return false,
        };
        store.dict.insert(dst.to_string(), obj);
        if let Some(deadline) = store.expires.remove(src) {
            store.expires.insert(dst.to_string(), deadline);
        }
        true
    }

    // ---- list operations ----

    /// The pushed slice becomes the new prefix in the given order:
    /// `lpush(k, [a, b, c])` yields head order a, b, c.
    pub fn lpush(&self, key: &str, values: &[String]) -> DbResult<usize> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.entry(key.to_string()).or_insert_with(|| Object::List(VecDeque::new())) {
            Object::List(list) => {
                for v in values.iter().rev() {
                    list.push_front(v.clone());
                }
                Ok(list.len())
            },
            _ => Err(DbError::WrongType),
        }
    }

    pub fn rpush(&self, key: &str, values: &[String]) -> DbResult<usize> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.entry(key.to_string()).or_insert_with(|| Object::List(VecDeque::new())) {
            Object::List(list) => {
                list.extend(values.iter().cloned());
                Ok(list.len())
            },
            _ => Err(DbError::WrongType),
        }
    }

    pub fn lpop(&self, key: &str) -> DbResult<Option<String>> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get_mut(key) {
            Some(Object::List(list)) => Ok(list.pop_front()),
            Some(_) => Err(DbError::WrongType),
            None => Ok(None),
        }
    }

    pub fn rpop(&self, key: &str) -> DbResult<Option<String>> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get_mut(key) {
            Some(Object::List(list)) => Ok(list.pop_back()),
            Some(_) => Err(DbError::WrongType),
            None => Ok(None),
        }
    }

    /// None when the key is absent; an existing empty list reports 0.
    pub fn llen(&self, key: &str) -> DbResult<Option<usize>> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(Object::List(list)) => Ok(Some(list.len())),
            Some(_) => Err(DbError::WrongType),
            None => Ok(None),
        }
    }

    pub fn lindex(&self, key: &str, index: i64) -> DbResult<Option<String>> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(Object::List(list)) => {
                Ok(resolve_index(index, list.len()).and_then(|i| list.get(i).cloned()))
            },
            Some(_) => Err(DbError::WrongType),
            None => Ok(None),
        }
    }

    pub fn lset(&self, key: &str, index: i64, value: &str) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get_mut(key) {
            Some(Object::List(list)) => match resolve_index(index, list.len()) {
                Some(i) => {
                    list[i] = value.to_string();
                    Ok(true)
                },
                None => Ok(false),
            },
            Some(_) => Err(DbError::WrongType),
            None => Ok(false),
        }
    }

    /// Inclusive range with negative indexing. An absent key or a range
    /// that clamps empty reads as absence, not as an empty list.
    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> DbResult<Option<Vec<String>>> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(Object::List(list)) => {
                let len = list.len() as i64;
                let mut start = if start < 0 { start + len } else { start };
                let mut stop = if stop < 0 { stop + len } else { stop };
                start = start.max(0);
                stop = stop.min(len - 1);
                if start > stop {
                    return Ok(None);
                }
                let range = list.iter()
                    .skip(start as usize)
                    .take((stop - start + 1) as usize)
                    .cloned()
                    .collect();
                Ok(Some(range))
            },
            Some(_) => Err(DbError::WrongType),
            None => Ok(None),
        }
    }

    /// count > 0 removes the first `count` matches head to tail, count < 0
    /// the first `|count|` matches tail to head, count == 0 all matches.
    /// Returns how many elements actually went.
    pub fn lrem(&self, key: &str, value: &str, count: i64) -> DbResult<i64> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get_mut(key) {
            Some(Object::List(list)) => {
                let mut removed = 0usize;
                if count == 0 {
                    let before = list.len();
                    list.retain(|e| e != value);
                    removed = before - list.len();
                } else if count > 0 {
                    let want = count as usize;
                    let mut i = 0;
                    while i < list.len() && removed < want {
                        if list[i] == value {
                            list.remove(i);
                            removed += 1;
                        } else {
                            i += 1;
                        }
                    }
                } else {
                    let want = count.unsigned_abs() as usize;
                    let mut i = list.len();
                    while i > 0 && removed < want {
                        i -= 1;
                        if list[i] == value {
                            list.remove(i);
                            removed += 1;
                        }
                    }
                }
                Ok(removed as i64)
            },
            Some(_) => Err(DbError::WrongType),
            None => Ok(0),
        }
    }

    // ---- hash operations ----

    pub fn hset(&self, key: &str, field: &str, value: &str) -> DbResult<()> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.entry(key.to_string()).or_insert_with(|| Object::Hash(HashMap::new())) {
            Object::Hash(hash) => {
                hash.insert(field.to_string(), value.to_string());
                Ok(())
            },
            _ => Err(DbError::WrongType),
        }
    }

    pub fn hget(&self, key: &str, field: &str) -> DbResult<Option<String>> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(Object::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(DbError::WrongType),
            None => Ok(None),
        }
    }

    pub fn hdel(&self, key: &str, field: &str) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get_mut(key) {
            Some(Object::Hash(hash)) => Ok(hash.remove(field).is_some()),
            Some(_) => Err(DbError::WrongType),
            None => Ok(false),
        }
    }

    pub fn hexists(&self, key: &str, field: &str) -> DbResult<bool> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(Object::Hash(hash)) => Ok(hash.contains_key(field)),
            Some(_) => Err(DbError::WrongType),
            None => Ok(false),
        }
    }

    /// 0 when the hash is absent.
    pub fn hlen(&self, key: &str) -> DbResult<usize> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(Object::Hash(hash)) => Ok(hash.len()),
            Some(_) => Err(DbError::WrongType),
            None => Ok(0),
        }
    }

    pub fn hkeys(&self, key: &str) -> DbResult<Vec<String>> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(Object::Hash(hash)) => Ok(hash.keys().cloned().collect()),
            Some(_) => Err(DbError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    pub fn hvals(&self, key: &str) -> DbResult<Vec<String>> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(Object::Hash(hash)) => Ok(hash.values().cloned().collect()),
            Some(_) => Err(DbError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    /// Field iteration order is unspecified; each pair stays paired.
    pub fn hgetall(&self, key: &str) -> DbResult<Vec<(String, String)>> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.get(key) {
            Some(Object::Hash(hash)) => {
                Ok(hash.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            },
            Some(_) => Err(DbError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    /// All pairs land under one lock acquisition, so the whole call is
    /// atomic with respect to other commands.
    pub fn hmset(&self, key: &str, pairs: &[(String, String)]) -> DbResult<()> {
        let mut store = self.store.lock().unwrap();
        store.expire_if_needed(key);
        match store.dict.entry(key.to_string()).or_insert_with(|| Object::Hash(HashMap::new())) {
            Object::Hash(hash) => {
                for (field, value) in pairs {
                    hash.insert(field.clone(), value.clone());
                }
                Ok(())
            },
            _ => Err(DbError::WrongType),
        }
    }

    // ---- whole-store operations ----

    /// Empties the keyspace and the expiry index.
    pub fn flush_all(&self) {
        let mut store = self.store.lock().unwrap();
        store.dict.clear();
        store.expires.clear();
    }

    /// Active expiration cycle: sweeps every entry past its deadline.
    /// Returns how many keys went.
    pub fn purge_expired(&self) -> usize {
        let mut store = self.store.lock().unwrap();
        let now = Instant::now();
        let dead: Vec<String> = store.expires.iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &dead {
            store.dict.remove(key);
            store.expires.remove(key);
        }
        dead.len()
    }

    /// (keys, keys with a deadline) — for the cron status line.
    pub fn counts(&self) -> (usize, usize) {
        let store = self.store.lock().unwrap();
        (store.dict.len(), store.expires.len())
    }
}

// negative indexes count from the tail, -1 being the last element
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let index = if index < 0 { index + len as i64 } else { index };
    if index >= 0 && (index as usize) < len {
        Some(index as usize)
    } else {
        None
    }
}

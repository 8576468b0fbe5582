use std::collections::HashMap;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{Error, Result};

/// Reserved key for the default flash queue. Named queues live under
/// `_flash_<name>`.
const FLASH_KEY: &str = "_flash";

/// A single request's view of one session.
///
/// A `Session` is constructed per incoming request by
/// [`SessionStore::load_session`](crate::SessionStore::load_session), mutated
/// by handler logic, and persisted at most once per request via an explicit
/// [`SessionStore::save`](crate::SessionStore::save) call. It is never shared
/// across requests; all cross-request state lives in the backend.
///
/// Values are stored as raw JSON; the typed view is built at this boundary
/// with [`get`](Session::get) and [`insert`](Session::insert) rather than by
/// callers downcasting stored values.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    values: HashMap<String, Value>,
    max_age: i64,
    is_new: bool,
}

impl Session {
    /// A brand-new session: no cookie was presented, or the cookie could not
    /// be authenticated.
    pub(crate) fn fresh(max_age: i64) -> Self {
        Self {
            id: String::new(),
            values: HashMap::new(),
            max_age,
            is_new: true,
        }
    }

    /// The cookie authenticated but the backend had no entry (expired or
    /// never written). The identifier is kept so the next save re-uses it.
    pub(crate) fn unbacked(id: &str, max_age: i64) -> Self {
        Self {
            id: id.to_string(),
            values: HashMap::new(),
            max_age,
            is_new: true,
        }
    }

    /// Restored from an authenticated cookie and a live backend entry.
    pub(crate) fn restored(id: &str, values: HashMap<String, Value>, max_age: i64) -> Self {
        Self {
            id: id.to_string(),
            values,
            max_age,
            is_new: false,
        }
    }

    /// The session identifier. Empty until the session has been persisted at
    /// least once.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// True until the identifier was authenticated against a cookie and its
    /// entry was loaded from the backend.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// TTL control for the next save, in seconds: `0` uses the store's
    /// default TTL, `> 0` sets this session's TTL, `< 0` deletes the session
    /// on save.
    pub fn max_age(&self) -> i64 {
        self.max_age
    }

    /// See [`max_age`](Session::max_age). Note that `0` means "store default
    /// TTL", not "no expiry".
    pub fn set_max_age(&mut self, max_age: i64) {
        self.max_age = max_age;
    }

    /// Reads a typed value. Returns `Ok(None)` if the key is absent and
    /// `Error::Deserialize` if the stored value does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.values
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(|err| Error::Deserialize(err.to_string()))
    }

    /// Reads the raw stored value, if any.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Stores a value under `key`. Unsupported value shapes (for example
    /// maps with non-string keys) are rejected here, before save time.
    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|err| Error::Serialize(err.to_string()))?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Removes a value, returning it if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Appends a one-shot message to the default flash queue.
    pub fn add_flash<T: Serialize>(&mut self, value: T) -> Result<()> {
        self.push_flash(FLASH_KEY.to_string(), value)
    }

    /// Appends a one-shot message to a named flash queue.
    pub fn add_flash_to<T: Serialize>(&mut self, queue: &str, value: T) -> Result<()> {
        self.push_flash(flash_key(queue), value)
    }

    /// Drains the default flash queue.
    ///
    /// Flashes are single-read: a second call before any new add returns
    /// empty, and the drained state is persisted by the next save.
    pub fn take_flashes(&mut self) -> Vec<Value> {
        self.drain_flashes(FLASH_KEY)
    }

    /// Drains a named flash queue. See [`take_flashes`](Session::take_flashes).
    pub fn take_flashes_from(&mut self, queue: &str) -> Vec<Value> {
        self.drain_flashes(&flash_key(queue))
    }

    pub(crate) fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    fn push_flash<T: Serialize>(&mut self, key: String, value: T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|err| Error::Serialize(err.to_string()))?;
        match self
            .values
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(queue) => queue.push(value),
            other => *other = Value::Array(vec![value]),
        }
        Ok(())
    }

    fn drain_flashes(&mut self, key: &str) -> Vec<Value> {
        match self.values.remove(key) {
            Some(Value::Array(queue)) => queue,
            Some(other) => vec![other],
            None => Vec::new(),
        }
    }
}

fn flash_key(queue: &str) -> String {
    format!("{FLASH_KEY}_{queue}")
}

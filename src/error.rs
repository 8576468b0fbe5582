use thiserror::Error as ThisError;

/// Errors surfaced by session store operations.
///
/// A backend entry that is simply missing is not represented here: lookups
/// that authenticate a cookie but find no entry yield a new session, never
/// an error. Everything else propagates to the caller unmasked — the store
/// performs no retries and keeps no fallback state.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A session cookie was present but failed authentication or carried a
    /// malformed identifier. The accompanying session is still usable as a
    /// fresh one.
    #[error("session cookie failed to decode: {0}")]
    CookieDecode(String),

    /// The backend could not be reached or refused the operation. Includes
    /// connection failures, timeouts, and failover-resolution errors.
    #[error("session backend error: {0}")]
    Backend(String),

    /// The session's values could not be encoded into a storable payload.
    #[error("session payload failed to serialize: {0}")]
    Serialize(String),

    /// A stored payload could not be decoded. Fatal for the request that
    /// hit it; callers must not treat the session as cleanly new.
    #[error("session payload failed to deserialize: {0}")]
    Deserialize(String),

    /// The serialized payload exceeded the configured maximum. Nothing was
    /// written; cookie and backend state are unchanged.
    #[error("serialized session is too large ({size} bytes, limit {limit})")]
    SizeLimit { size: usize, limit: usize },
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Backend(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

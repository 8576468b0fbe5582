//! Conversion between a session's value map and the opaque payload stored
//! in the backend.
//!
//! Note: the stored format is versioned, but it is still considered an
//! implementation detail and may evolve.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

const VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u8,
    values: HashMap<String, Value>,
}

/// Converts a session's values to and from bytes.
///
/// Implementations must be total and deterministic for any value map that
/// made it into a [`Session`](crate::Session): `deserialize(serialize(v))`
/// yields `v`. Unsupported value types are rejected when they are inserted
/// into the session, not here.
pub trait SessionSerializer: Send + Sync + 'static {
    fn serialize(&self, values: &HashMap<String, Value>) -> Result<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8]) -> Result<HashMap<String, Value>>;
}

/// The default serializer: a version-tagged JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl SessionSerializer for JsonSerializer {
    fn serialize(&self, values: &HashMap<String, Value>) -> Result<Vec<u8>> {
        let envelope = Envelope {
            v: VERSION,
            values: values.clone(),
        };

        serde_json::to_vec(&envelope).map_err(|err| Error::Serialize(err.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<HashMap<String, Value>> {
        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|err| Error::Deserialize(err.to_string()))?;

        if envelope.v != VERSION {
            return Err(Error::Deserialize(format!(
                "unsupported session payload version: {}",
                envelope.v
            )));
        }

        Ok(envelope.values)
    }
}

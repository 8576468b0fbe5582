//! Session identifier generation and validation.
//!
//! Identifiers are 32 random bytes encoded as unpadded base32, giving a
//! 52-character cookie-safe string that is used verbatim as the backend key
//! suffix. 256 bits of OS-seeded entropy makes collisions cryptographically
//! negligible rather than merely unlikely.

use data_encoding::BASE32_NOPAD;
use rand::RngCore as _;

const ID_BYTES: usize = 32;

/// Length of an encoded identifier: ceil(32 * 8 / 5) base32 characters.
pub(crate) const ID_LEN: usize = 52;

pub(crate) fn generate() -> String {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE32_NOPAD.encode(&bytes)
}

/// Checks that a cookie-derived identifier has the expected shape before it
/// is spliced into a backend key.
pub(crate) fn is_valid(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| matches!(b, b'A'..=b'Z' | b'2'..=b'7'))
}

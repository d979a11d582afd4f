//! Component E — key encoders.
//!
//! External-collaborator contract (spec §4.E / §6): pure, infallible,
//! byte-producing adapters from a user key domain to an `EncodedKey` whose
//! lexicographic byte order matches the domain's natural sort order.
//!
//! Implementations must preserve order: text keys use their natural bytes,
//! fixed-width signed integers flip the sign bit and store big-endian so
//! that unsigned lexicographic comparison matches numeric comparison.

use crate::key::EncodedKey;

/// Implemented by every type usable as a `Wormhole` key.
pub trait KeyEncoding {
    fn encode_key(&self) -> EncodedKey;
}

impl KeyEncoding for str {
    fn encode_key(&self) -> EncodedKey {
        EncodedKey::from_bytes(self.as_bytes().to_vec())
    }
}

impl KeyEncoding for String {
    fn encode_key(&self) -> EncodedKey {
        self.as_str().encode_key()
    }
}

impl KeyEncoding for i32 {
    /// 4 big-endian bytes of `key XOR 0x80000000`.
    fn encode_key(&self) -> EncodedKey {
        let flipped = (*self as u32) ^ 0x8000_0000;
        EncodedKey::from_bytes(flipped.to_be_bytes().to_vec())
    }
}

impl KeyEncoding for i64 {
    /// 8 big-endian bytes of `key XOR 0x8000000000000000`.
    fn encode_key(&self) -> EncodedKey {
        let flipped = (*self as u64) ^ 0x8000_0000_0000_0000;
        EncodedKey::from_bytes(flipped.to_be_bytes().to_vec())
    }
}

//! Wormhole — single-threaded ordered in-memory index.
//!
//! A leaf chain (sorted runs of records) located by a meta-trie hash table
//! (a flat prefix-to-metadata map standing in for an explicit trie). No
//! networking, no I/O, no async, no threading: a `Wormhole<K, V>` is a plain
//! in-process value.
//!
//! INVARIANTS:
//! 1. The leaf chain is always sorted: every key in a leaf is `>=` its
//!    anchor and `<` the next leaf's anchor (spec §3 / §8).
//! 2. No live leaf ever exceeds `capacity` records; no two adjacent leaves
//!    ever together hold fewer than `⌊3*capacity/4⌋` (spec §4.B).
//! 3. Every entry in the meta-trie hash table is reachable from the empty
//!    prefix by following internal-meta bitmaps, and every reachable leaf
//!    meta names a live arena slot (spec §4.C / §4.D).
//! 4. `LeafId` handles never dangle while referenced from the chain or the
//!    table; they are never part of the public API.
//! 5. Internal-consistency violations (points 1-4) are not recoverable —
//!    they `panic!` with diagnostic context rather than return a `Result`.
//!    Only caller-input contract errors use `WormholeError` (spec §7).

mod arena;
mod encode;
mod key;
mod leaf;
mod mtht;
mod validate;
mod wormhole;

pub use encode::KeyEncoding;
pub use wormhole::{Wormhole, WormholeConfig, WormholeError};

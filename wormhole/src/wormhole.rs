//! Component D — the coordinator.
//!
//! Routes `get`/`put`/`delete`/`scan` to the correct leaf via the MTHT,
//! drives leaf split (on overflow) and merge (on underflow), and
//! incrementally maintains MTHT invariants across structural changes
//! (spec §4.D).

use tracing::trace;

use crate::arena::{Arena, LeafId};
use crate::encode::KeyEncoding;
use crate::key::EncodedKey;
use crate::leaf::{LeafNode, Record};
use crate::mtht::{Mtht, NodeMeta};
use crate::validate;

/// Constructor parameters (spec §6).
#[derive(Clone, Copy, Debug)]
pub struct WormholeConfig {
    /// Maximum records per leaf before it must split. Default 128; the
    /// minimum practical value is 8, though 3 is permitted for tests
    /// (spec §3).
    pub capacity: usize,
    /// When `true`, the full invariant validator runs after every mutation.
    pub debug_mode: bool,
}

impl Default for WormholeConfig {
    fn default() -> Self {
        WormholeConfig {
            capacity: 128,
            debug_mode: false,
        }
    }
}

/// Contract-error surface (spec §7). Internal consistency failures are not
/// part of this enum — they `panic!` with diagnostic context, since spec §7
/// requires them to abort rather than be recoverable.
///
/// `NullKey` is unreachable through `Wormhole<K, V>`'s safe API: Rust's type
/// system already rejects a missing key at compile time (`K`, not
/// `Option<K>`), so there is no runtime check to perform. The variant is
/// kept for a hypothetical FFI/dynamic adapter wrapping this crate for
/// non-Rust callers, where a null pointer is a runtime value, not a type
/// error — see DESIGN.md.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WormholeError {
    /// A null user key was passed where one is not permitted (FFI boundary
    /// only; unreachable through the safe API).
    NullKey,
    /// `scan_with_count` was called with a negative count.
    NegativeCount,
}

impl std::fmt::Display for WormholeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WormholeError::NullKey => write!(f, "null key passed where a key is required"),
            WormholeError::NegativeCount => write!(f, "scan count must not be negative"),
        }
    }
}

impl std::error::Error for WormholeError {}

/// The Wormhole ordered in-memory index.
pub struct Wormhole<K, V> {
    arena: Arena<K, V>,
    mtht: Mtht,
    pub(crate) config: WormholeConfig,
    leftmost: LeafId,
    rightmost: LeafId,
    len: usize,
}

impl<K: KeyEncoding, V> Wormhole<K, V> {
    pub fn new(config: WormholeConfig) -> Self {
        assert!(config.capacity >= 1, "capacity must be positive");
        let mut arena = Arena::new();
        let root = arena.insert(LeafNode::new(EncodedKey::empty(), config.capacity));
        let mtht = Mtht::new(root);
        Wormhole {
            arena,
            mtht,
            config,
            leftmost: root,
            rightmost: root,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Component C/D's leaf-resolution algorithm (spec §4.C).
    fn resolve_leaf(&self, key: &EncodedKey) -> LeafId {
        let (match_len, meta) = self.mtht.longest_prefix_match(key);
        match meta {
            NodeMeta::Leaf(id) => *id,
            NodeMeta::Internal {
                leftmost,
                rightmost,
                bitmap,
            } => {
                if match_len == key.len() {
                    let leftmost_anchor = &self.arena.get(*leftmost).anchor;
                    if key < leftmost_anchor {
                        self.arena.get(*leftmost).left.expect(
                            "mtht invariant violated: leftmost leaf below the search key has no left neighbor",
                        )
                    } else {
                        *leftmost
                    }
                } else {
                    let m = key.byte_at(match_len);
                    let sibling = bitmap
                        .highest_at_or_below(m)
                        .or_else(|| bitmap.lowest_above(m));
                    match sibling {
                        None => *leftmost,
                        Some(sibling_byte) => {
                            let prefix = key.slice(match_len);
                            let child_prefix = prefix.append_byte(sibling_byte);
                            let child = self.mtht.get(&child_prefix).expect(
                                "mtht invariant violated: bitmap bit set but child meta missing",
                            );
                            match child {
                                NodeMeta::Leaf(leaf_id) => {
                                    if m < sibling_byte {
                                        self.arena.get(*leaf_id).left.expect(
                                            "mtht invariant violated: leftmost-in-subtree leaf has no left neighbor",
                                        )
                                    } else {
                                        *leaf_id
                                    }
                                }
                                NodeMeta::Internal {
                                    leftmost: child_leftmost,
                                    rightmost: child_rightmost,
                                    ..
                                } => {
                                    if m < sibling_byte {
                                        self.arena.get(*child_leftmost).left.expect(
                                            "mtht invariant violated: leftmost-in-subtree leaf has no left neighbor",
                                        )
                                    } else {
                                        *child_rightmost
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn get(&self, user_key: &K) -> Option<&V> {
        let ek = user_key.encode_key();
        let leaf_id = self.resolve_leaf(&ek);
        self.arena.get(leaf_id).point_lookup(&ek).map(|r| &r.value)
    }

    /// Returns the previous value, if the key was already present.
    pub fn put(&mut self, user_key: K, value: V) -> Option<V> {
        let ek = user_key.encode_key();
        let mut leaf_id = self.resolve_leaf(&ek);

        if let Some(idx) = self.arena.get(leaf_id).point_lookup_index(&ek) {
            let old = std::mem::replace(self.arena.get_mut(leaf_id).value_mut(idx), value);
            if self.config.debug_mode {
                self.validate();
            }
            return Some(old);
        }

        if self.arena.get(leaf_id).is_full() {
            let new_anchor = self.split_leaf(leaf_id);
            if ek >= new_anchor {
                let new_leaf_id = match self.mtht.get(&new_anchor) {
                    Some(NodeMeta::Leaf(id)) => *id,
                    _ => unreachable!("split_leaf always installs a leaf-meta at the new anchor"),
                };
                leaf_id = new_leaf_id;
            }
        }

        self.arena.get_mut(leaf_id).add(Record {
            encoded: ek,
            user_key,
            value,
        });
        self.len += 1;
        if self.config.debug_mode {
            self.validate();
        }
        None
    }

    pub fn delete(&mut self, user_key: &K) -> bool {
        let ek = user_key.encode_key();
        let leaf_id = self.resolve_leaf(&ek);
        let removed = self.arena.get_mut(leaf_id).delete(&ek);
        if removed {
            self.len -= 1;
            self.maybe_merge(leaf_id);
            if self.config.debug_mode {
                self.validate();
            }
        }
        removed
    }

    /// Walks the leaf chain from the starting leaf, invoking `visit` on
    /// every `(user_key, value)` in `[start, end]`/`[start, end)`. Stops
    /// early if `visit` returns `false`.
    ///
    /// Takes `&mut self` because each visited leaf lazily sorts its
    /// key-reference array on first scan (spec §4.B); no record is ever
    /// added, removed, or changed by a scan.
    pub fn scan<F>(&mut self, start: Option<&K>, end: Option<&K>, end_exclusive: bool, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let start_ek = start.map(|k| k.encode_key());
        let end_ek = end.map(|k| k.encode_key());
        let mut leaf_id = match &start_ek {
            Some(ek) => self.resolve_leaf(ek),
            None => self.leftmost,
        };
        loop {
            let leaf = self.arena.get_mut(leaf_id);
            let mut stop = false;
            let exhausted = leaf.iterate(start_ek.as_ref(), end_ek.as_ref(), end_exclusive, |r| {
                if !visit(&r.user_key, &r.value) {
                    stop = true;
                    false
                } else {
                    true
                }
            });
            let next = leaf.right;
            if stop || !exhausted {
                return;
            }
            match next {
                Some(next) => leaf_id = next,
                None => return,
            }
        }
    }

    /// Returns the first `min(count, |{k >= start}|)` entries starting at
    /// `start` (or the beginning of the index, if `start` is `None`).
    /// Rejects a negative `count` (spec §7, "Contract errors").
    pub fn scan_with_count(&mut self, start: Option<&K>, count: i64) -> Result<Vec<(K, V)>, WormholeError>
    where
        K: Clone,
        V: Clone,
    {
        if count < 0 {
            return Err(WormholeError::NegativeCount);
        }
        let mut out = Vec::with_capacity(count as usize);
        let mut remaining = count as u64;
        self.scan(start, None, false, |k, v| {
            if remaining == 0 {
                return false;
            }
            out.push((k.clone(), v.clone()));
            remaining -= 1;
            remaining > 0
        });
        Ok(out)
    }

    /// Splits the full leaf at `leaf_id`, updates the chain and the MTHT,
    /// and returns the new anchor.
    fn split_leaf(&mut self, leaf_id: LeafId) -> EncodedKey {
        let Wormhole { arena, mtht, .. } = self;
        let leaf = arena.get_mut(leaf_id);
        let (new_anchor, new_leaf) = leaf.split(|candidate| !mtht.contains(candidate));
        trace!(anchor = ?new_anchor, "leaf split");

        let old_right = leaf.right;
        let new_leaf_id = arena.insert(new_leaf);
        {
            let new_leaf_mut = arena.get_mut(new_leaf_id);
            new_leaf_mut.left = Some(leaf_id);
            new_leaf_mut.right = old_right;
        }
        arena.get_mut(leaf_id).right = Some(new_leaf_id);
        if let Some(right_id) = old_right {
            arena.get_mut(right_id).left = Some(new_leaf_id);
        }
        if self.rightmost == leaf_id {
            self.rightmost = new_leaf_id;
        }

        self.mtht
            .handle_split(&new_anchor, new_leaf_id, leaf_id, old_right);
        new_anchor
    }

    /// At most one merge is attempted after a successful delete. The left
    /// neighbor is preferred over the right when both would qualify.
    fn maybe_merge(&mut self, leaf_id: LeafId) {
        let threshold = (3 * self.config.capacity) / 4;
        let size = self.arena.get(leaf_id).size();
        let left = self.arena.get(leaf_id).left;
        let right = self.arena.get(leaf_id).right;

        if let Some(left_id) = left {
            if self.arena.get(left_id).size() + size < threshold {
                self.merge_leaves(left_id, leaf_id);
                return;
            }
        }
        if let Some(right_id) = right {
            if self.arena.get(right_id).size() + size < threshold {
                self.merge_leaves(leaf_id, right_id);
            }
        }
    }

    /// `survivor.merge_from(victim)`; `victim` is removed from the arena.
    fn merge_leaves(&mut self, survivor_id: LeafId, victim_id: LeafId) {
        trace!("leaf merge");
        let victim = self.arena.remove(victim_id);
        let victim_anchor = victim.anchor.clone();
        let victim_old_left = victim.left;
        let victim_old_right = victim.right;

        self.arena.get_mut(survivor_id).merge_from(victim);
        self.arena.get_mut(survivor_id).right = victim_old_right;
        if let Some(right_id) = victim_old_right {
            self.arena.get_mut(right_id).left = Some(survivor_id);
        }
        if self.rightmost == victim_id {
            self.rightmost = survivor_id;
        }
        if self.leftmost == victim_id {
            self.leftmost = survivor_id;
        }

        self.mtht
            .handle_merge(victim_id, &victim_anchor, victim_old_left, victim_old_right);
    }

    /// Runs the full invariant validator (spec §4.D / §8), panicking with
    /// diagnostic context on the first violation found. Exposed as a
    /// regular method (not only a `debug_mode` side effect) so embedders
    /// and tests can assert consistency at a checkpoint.
    pub fn validate(&self) {
        if let Err(msg) = validate::validate(&self.arena, &self.mtht, self.leftmost, self.rightmost, self.len, self.config.capacity) {
            panic!("wormhole invariant violated: {msg}");
        }
    }
}

//! Component C — the meta-trie hash table (MTHT).
//!
//! A flat map from anchor-prefix to node metadata, plus the longest-prefix-
//! match search and the split/merge maintenance routines that keep its
//! invariants intact (spec §4.C).

use std::collections::HashMap;

use crate::arena::LeafId;
use crate::key::EncodedKey;

/// A 256-bit set, one bit per possible next byte below a trie prefix.
#[derive(Clone, Copy, Default)]
pub(crate) struct ChildBitmap([u64; 4]);

impl ChildBitmap {
    pub(crate) fn empty() -> Self {
        ChildBitmap([0; 4])
    }

    fn word_and_bit(b: u8) -> (usize, u32) {
        ((b as usize) / 64, (b as u32) % 64)
    }

    pub(crate) fn set(&mut self, b: u8) {
        let (w, bit) = Self::word_and_bit(b);
        self.0[w] |= 1u64 << bit;
    }

    pub(crate) fn clear(&mut self, b: u8) {
        let (w, bit) = Self::word_and_bit(b);
        self.0[w] &= !(1u64 << bit);
    }

    pub(crate) fn get(&self, b: u8) -> bool {
        let (w, bit) = Self::word_and_bit(b);
        self.0[w] & (1u64 << bit) != 0
    }

    pub(crate) fn iter_set_bits(&self) -> impl Iterator<Item = u8> + '_ {
        (0u16..256).filter_map(move |b| {
            let b = b as u8;
            self.get(b).then_some(b)
        })
    }

    /// Highest set bit `<= start`, if any.
    pub(crate) fn highest_at_or_below(&self, start: u8) -> Option<u8> {
        self.iter_set_bits().filter(|&b| b <= start).last()
    }

    /// Lowest set bit `> start`, if any.
    pub(crate) fn lowest_above(&self, start: u8) -> Option<u8> {
        self.iter_set_bits().find(|&b| b > start)
    }
}

#[derive(Clone)]
pub(crate) enum NodeMeta {
    Leaf(LeafId),
    Internal {
        leftmost: LeafId,
        rightmost: LeafId,
        bitmap: ChildBitmap,
    },
}

pub(crate) struct Mtht {
    table: HashMap<EncodedKey, NodeMeta>,
    max_len: usize,
}

impl Mtht {
    pub(crate) fn new(root: LeafId) -> Self {
        let mut table = HashMap::new();
        table.insert(EncodedKey::empty(), NodeMeta::Leaf(root));
        Mtht { table, max_len: 0 }
    }

    pub(crate) fn get(&self, prefix: &EncodedKey) -> Option<&NodeMeta> {
        self.table.get(prefix)
    }

    pub(crate) fn get_mut(&mut self, prefix: &EncodedKey) -> Option<&mut NodeMeta> {
        self.table.get_mut(prefix)
    }

    pub(crate) fn contains(&self, prefix: &EncodedKey) -> bool {
        self.table.contains_key(prefix)
    }

    pub(crate) fn put(&mut self, prefix: EncodedKey, meta: NodeMeta) {
        let len = prefix.len();
        self.table.insert(prefix, meta);
        if len > self.max_len {
            self.max_len = len;
        }
    }

    /// The root empty-prefix entry is never removed (Design Notes §9's
    /// open-question resolution) — callers must not pass an empty prefix.
    pub(crate) fn remove(&mut self, prefix: &EncodedKey) {
        if prefix.is_empty() {
            return;
        }
        let removed = self.table.remove(prefix);
        if removed.is_some() && prefix.len() == self.max_len {
            self.max_len = self.table.keys().map(|k| k.len()).max().unwrap_or(0);
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&EncodedKey, &NodeMeta)> {
        self.table.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `(match_len, meta)` for the longest prefix of `key` present
    /// in the table. The empty prefix is always present, so this always
    /// succeeds (spec §4.C).
    pub(crate) fn longest_prefix_match(&self, key: &EncodedKey) -> (usize, &NodeMeta) {
        let bound = key.len().min(self.max_len);
        let mut lo = 0usize; // invariant: key[0..lo] is present
        let mut hi = bound + 1; // invariant: key[0..hi] is absent (or out of bound)
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.contains(&key.slice(mid)) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let meta = self
            .get(&key.slice(lo))
            .expect("mtht invariant violated: longest_prefix_match result not actually present");
        (lo, meta)
    }

    /// After a leaf split produced `new_leaf_id` with anchor `new_anchor`,
    /// spliced into the chain immediately right of `new_leaf_left` (and
    /// left of `new_leaf_right`, if any), update every ancestor prefix
    /// (spec §4.C).
    pub(crate) fn handle_split(
        &mut self,
        new_anchor: &EncodedKey,
        new_leaf_id: LeafId,
        new_leaf_left: LeafId,
        new_leaf_right: Option<LeafId>,
    ) {
        self.put(new_anchor.clone(), NodeMeta::Leaf(new_leaf_id));

        for p in 0..new_anchor.len() {
            let prefix = new_anchor.slice(p);
            let c = new_anchor.byte_at(p);
            match self.get(&prefix) {
                None => {
                    self.put(
                        prefix.clone(),
                        NodeMeta::Internal {
                            leftmost: new_leaf_id,
                            rightmost: new_leaf_id,
                            bitmap: ChildBitmap::empty(),
                        },
                    );
                }
                Some(NodeMeta::Leaf(existing_leaf)) => {
                    let existing_leaf = *existing_leaf;
                    self.put(
                        prefix.clone(),
                        NodeMeta::Internal {
                            leftmost: existing_leaf,
                            rightmost: new_leaf_id,
                            bitmap: ChildBitmap::empty(),
                        },
                    );
                }
                Some(NodeMeta::Internal { .. }) => {}
            }
            if let Some(NodeMeta::Internal {
                leftmost,
                rightmost,
                bitmap,
            }) = self.get_mut(&prefix)
            {
                bitmap.set(c);
                if let Some(nr) = new_leaf_right {
                    if *leftmost == nr {
                        *leftmost = new_leaf_id;
                    }
                }
                if *rightmost == new_leaf_left {
                    *rightmost = new_leaf_id;
                }
            }
        }
    }

    /// After `survivor.merge_from(victim)` has already collapsed records
    /// and the coordinator has spliced the chain pointers, walk the
    /// victim's anchor's prefixes and prune/update metas (spec §4.C).
    ///
    /// `victim_old_left` / `victim_old_right` are the victim's chain
    /// neighbors as they were *before* the merge — `victim_old_left` is
    /// always the surviving leaf.
    pub(crate) fn handle_merge(
        &mut self,
        victim_id: LeafId,
        victim_anchor: &EncodedKey,
        victim_old_left: Option<LeafId>,
        victim_old_right: Option<LeafId>,
    ) {
        self.remove(victim_anchor);
        let mut child_removed = true;

        let mut p = victim_anchor.len();
        while p > 0 {
            p -= 1;
            let prefix = victim_anchor.slice(p);
            let c = victim_anchor.byte_at(p);

            if child_removed {
                if let Some(NodeMeta::Internal { bitmap, .. }) = self.get_mut(&prefix) {
                    bitmap.clear(c);
                }
            }

            let single_descendant = matches!(
                self.get(&prefix),
                Some(NodeMeta::Internal { leftmost, rightmost, .. }) if leftmost == rightmost
            );
            if single_descendant {
                self.remove(&prefix);
                child_removed = true;
                continue;
            }
            child_removed = false;

            if let Some(NodeMeta::Internal {
                leftmost,
                rightmost,
                ..
            }) = self.get_mut(&prefix)
            {
                if *leftmost == victim_id {
                    *leftmost = victim_old_right
                        .expect("mtht invariant violated: leftmost==victim but victim has no right neighbor");
                }
                if *rightmost == victim_id {
                    *rightmost = victim_old_left
                        .expect("mtht invariant violated: rightmost==victim but victim has no left neighbor");
                }
            }
        }
    }
}

//! Component B — the leaf node.
//!
//! A leaf is a sorted bag of up to `capacity` records with three coexisting
//! views: the record array (insertion order), a hash-tag array (sorted by a
//! 15-bit hash, for O(1)-expected point lookup), and a lazily-sorted
//! key-reference array (for ordered iteration). See spec §3 / §4.B.

use crate::arena::LeafId;
use crate::key::EncodedKey;

/// `(encoded_key, user_key, value)` — spec §3.
pub(crate) struct Record<K, V> {
    pub(crate) encoded: EncodedKey,
    pub(crate) user_key: K,
    pub(crate) value: V,
}

/// A packed `(15-bit hash, record-index)` pair. Kept as two plain fields
/// rather than bit-packed into a literal machine word — the spec's "one
/// 32-bit word" framing is a memory-layout optimization the algorithm does
/// not depend on; `hash` and `index` are used only as a sorted-scan key and
/// a back-reference respectively.
#[derive(Clone, Copy)]
struct HashTag {
    hash: u16,
    index: u32,
}

pub struct LeafNode<K, V> {
    pub(crate) anchor: EncodedKey,
    capacity: usize,
    records: Vec<Record<K, V>>,
    hash_tags: Vec<HashTag>,
    /// Permutation of `0..records.len()`. The first `sorted_count` entries
    /// are in ascending encoded-key order; the rest are in arbitrary
    /// (insertion) order.
    key_refs: Vec<usize>,
    sorted_count: usize,
    pub(crate) left: Option<LeafId>,
    pub(crate) right: Option<LeafId>,
}

impl<K, V> LeafNode<K, V> {
    pub(crate) fn new(anchor: EncodedKey, capacity: usize) -> Self {
        LeafNode {
            anchor,
            capacity,
            records: Vec::with_capacity(capacity),
            hash_tags: Vec::with_capacity(capacity),
            key_refs: Vec::with_capacity(capacity),
            sorted_count: 0,
            left: None,
            right: None,
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// O(F) worst case, expected O(1 + collisions / 2^15). Never mutates.
    pub(crate) fn point_lookup_index(&self, key: &EncodedKey) -> Option<usize> {
        let hash = key.hash15();
        // Binary-search the lowest hash-tag position with this hash, then
        // scan the (short, expected length 1) run of equal hashes.
        let mut lo = 0usize;
        let mut hi = self.hash_tags.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.hash_tags[mid].hash < hash {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let mut i = lo;
        while i < self.hash_tags.len() && self.hash_tags[i].hash == hash {
            let idx = self.hash_tags[i].index as usize;
            if &self.records[idx].encoded == key {
                return Some(idx);
            }
            i += 1;
        }
        None
    }

    pub(crate) fn point_lookup(&self, key: &EncodedKey) -> Option<&Record<K, V>> {
        self.point_lookup_index(key).map(|idx| &self.records[idx])
    }

    pub(crate) fn value_mut(&mut self, idx: usize) -> &mut V {
        &mut self.records[idx].value
    }

    pub(crate) fn record(&self, idx: usize) -> &Record<K, V> {
        &self.records[idx]
    }

    /// Inserts a hash tag in ascending-hash sorted position. O(F) shift.
    fn insert_hash_tag(&mut self, hash: u16, index: u32) {
        let pos = self
            .hash_tags
            .binary_search_by(|tag| tag.hash.cmp(&hash))
            .unwrap_or_else(|insert_at| insert_at);
        self.hash_tags.insert(pos, HashTag { hash, index });
    }

    /// Appends `record` to all three arrays. Preconditions (caller-enforced
    /// via a prior `point_lookup`): `size() < capacity` and `record.encoded`
    /// is absent from the leaf.
    pub(crate) fn add(&mut self, record: Record<K, V>) {
        debug_assert!(self.size() < self.capacity, "add() called on a full leaf");
        let index = self.records.len() as u32;
        let hash = record.encoded.hash15();
        self.records.push(record);
        self.insert_hash_tag(hash, index);
        // Key references are appended at the tail (no sort) — sorted_count
        // is unchanged, per spec §4.B.
        self.key_refs.push(index as usize);
    }

    /// Quicksort over the unsorted tail, then an O(size) merge of the two
    /// sorted runs (Design Notes §9). Rust's pattern-defeating quicksort
    /// (`sort_unstable_by`) is used for the tail sort.
    fn ensure_sorted(&mut self) {
        if self.sorted_count == self.key_refs.len() {
            return;
        }
        let records = &self.records;
        let (sorted_part, tail) = self.key_refs.split_at_mut(self.sorted_count);
        tail.sort_unstable_by(|&a, &b| records[a].encoded.cmp(&records[b].encoded));

        let mut merged = Vec::with_capacity(sorted_part.len() + tail.len());
        let (mut i, mut j) = (0usize, 0usize);
        while i < sorted_part.len() && j < tail.len() {
            if records[sorted_part[i]].encoded <= records[tail[j]].encoded {
                merged.push(sorted_part[i]);
                i += 1;
            } else {
                merged.push(tail[j]);
                j += 1;
            }
        }
        merged.extend_from_slice(&sorted_part[i..]);
        merged.extend_from_slice(&tail[j..]);

        self.key_refs = merged;
        self.sorted_count = self.key_refs.len();
    }

    /// First index `i` in the (now fully sorted) key-ref array with
    /// `encoded(records[key_refs[i]]) >= bound`, or `key_refs.len()` if none.
    fn lower_bound(&self, bound: &EncodedKey) -> usize {
        self.key_refs
            .partition_point(|&idx| &self.records[idx].encoded < bound)
    }

    /// First index `i` with `encoded(records[key_refs[i]]) > bound`, or
    /// `key_refs.len()` if none (i.e. an exclusive upper bound position).
    fn upper_bound_exclusive(&self, bound: &EncodedKey) -> usize {
        self.key_refs
            .partition_point(|&idx| &self.records[idx].encoded <= bound)
    }

    /// Lazily sorts the key-reference array, then visits every record in
    /// `[start, end]` (or `[start, end)` when `end_exclusive`) in ascending
    /// key order. `start == None` means "from the beginning"; `end == None`
    /// means "to the end of the leaf". Returns whether the leaf was fully
    /// exhausted: `false` if the visitor asked to stop, or if `end` cut
    /// iteration off before the leaf's last record.
    pub(crate) fn iterate<F>(
        &mut self,
        start: Option<&EncodedKey>,
        end: Option<&EncodedKey>,
        end_exclusive: bool,
        mut visit: F,
    ) -> bool
    where
        F: FnMut(&Record<K, V>) -> bool,
    {
        self.ensure_sorted();
        let from = start.map(|s| self.lower_bound(s)).unwrap_or(0);
        let to = match end {
            None => self.key_refs.len(),
            Some(e) if end_exclusive => self.lower_bound(e),
            Some(e) => self.upper_bound_exclusive(e),
        };
        let mut i = from;
        while i < to {
            let idx = self.key_refs[i];
            if !visit(&self.records[idx]) {
                return false;
            }
            i += 1;
        }
        to == self.key_refs.len()
    }

    /// Ensures the key-ref array is fully sorted, binary-searches it, and
    /// on a hit removes the record from all three arrays, shifting indices
    /// that pointed above the removed record down by one.
    pub(crate) fn delete(&mut self, key: &EncodedKey) -> bool {
        self.ensure_sorted();
        let pos = self
            .key_refs
            .binary_search_by(|&idx| self.records[idx].encoded.cmp(key));
        let pos = match pos {
            Ok(p) => p,
            Err(_) => return false,
        };
        let removed_index = self.key_refs.remove(pos);
        self.records.remove(removed_index);

        for idx in self.key_refs.iter_mut() {
            if *idx > removed_index {
                *idx -= 1;
            }
        }

        let tag_pos = self
            .hash_tags
            .iter()
            .position(|tag| tag.index as usize == removed_index)
            .expect("leaf invariant violated: hash tag for a present key not found on delete");
        self.hash_tags.remove(tag_pos);
        for tag in self.hash_tags.iter_mut() {
            if tag.index as usize > removed_index {
                tag.index -= 1;
            }
        }

        // Removing an entry from an already-sorted sequence leaves it
        // sorted; sorted_count tracks the (now shorter) full length.
        self.sorted_count = self.key_refs.len();
        true
    }

    /// Runs only when the leaf is full. Returns the new anchor and the new
    /// right leaf. `prefix_absent` is the MTHT-uniqueness predicate injected
    /// by the coordinator (Design Notes §9: "avoid back-references from
    /// leaves to the coordinator").
    pub(crate) fn split(&mut self, prefix_absent: impl Fn(&EncodedKey) -> bool) -> (EncodedKey, LeafNode<K, V>) {
        assert!(self.is_full(), "split() called on a non-full leaf");
        self.ensure_sorted();
        let f = self.size();

        let mut split_at = None;
        let mut candidate_anchor = None;
        let mut i = f / 2;
        while i < f {
            let k1 = &self.records[self.key_refs[i - 1]].encoded;
            let k2 = &self.records[self.key_refs[i]].encoded;
            let lcp = k1.longest_common_prefix_len(k2);
            let candidate = k1.slice(lcp).append_byte(k2.byte_at(lcp));
            if &candidate > k1 && prefix_absent(&candidate) {
                split_at = Some(i);
                candidate_anchor = Some(candidate);
                break;
            }
            i += 1;
        }
        let split_at = split_at.expect(
            "split() found no index satisfying both the anchor-ordering and \
             anchor-uniqueness conditions up to capacity — fatal internal inconsistency",
        );
        let new_anchor = candidate_anchor.unwrap();

        let mut goes_right = vec![false; f];
        for &old_idx in &self.key_refs[split_at..] {
            goes_right[old_idx] = true;
        }

        let old_records = std::mem::take(&mut self.records);
        let mut left_records = Vec::with_capacity(split_at);
        let mut right_records = Vec::with_capacity(f - split_at);
        let mut new_index_of = vec![0usize; f];
        for (old_idx, record) in old_records.into_iter().enumerate() {
            if goes_right[old_idx] {
                new_index_of[old_idx] = right_records.len();
                right_records.push(record);
            } else {
                new_index_of[old_idx] = left_records.len();
                left_records.push(record);
            }
        }

        let left_key_refs: Vec<usize> = self.key_refs[..split_at]
            .iter()
            .map(|&old| new_index_of[old])
            .collect();
        let right_key_refs: Vec<usize> = self.key_refs[split_at..]
            .iter()
            .map(|&old| new_index_of[old])
            .collect();

        self.records = left_records;
        self.key_refs = left_key_refs;
        self.sorted_count = self.records.len();
        self.hash_tags = Self::rebuild_hash_tags(&self.records);

        let mut right_leaf = LeafNode::new(new_anchor.clone(), self.capacity);
        right_leaf.records = right_records;
        right_leaf.key_refs = right_key_refs;
        right_leaf.sorted_count = right_leaf.records.len();
        right_leaf.hash_tags = Self::rebuild_hash_tags(&right_leaf.records);

        (new_anchor, right_leaf)
    }

    fn rebuild_hash_tags(records: &[Record<K, V>]) -> Vec<HashTag> {
        let mut tags: Vec<HashTag> = records
            .iter()
            .enumerate()
            .map(|(idx, r)| HashTag {
                hash: r.encoded.hash15(),
                index: idx as u32,
            })
            .collect();
        tags.sort_unstable_by_key(|t| t.hash);
        tags
    }

    /// Absorbs `right`'s records into `self`. Both leaves must be adjacent
    /// (`self`'s keys all < `right`'s keys) — the coordinator is
    /// responsible for only calling this on true chain neighbors. Does not
    /// touch `left`/`right` chain pointers; the coordinator splices those.
    pub(crate) fn merge_from(&mut self, mut right: LeafNode<K, V>) {
        self.ensure_sorted();
        right.ensure_sorted();
        let left_len = self.records.len();

        self.records.append(&mut right.records);
        self.key_refs
            .extend(right.key_refs.iter().map(|&idx| idx + left_len));
        self.sorted_count = self.records.len();
        self.hash_tags = Self::rebuild_hash_tags(&self.records);
    }

    /// Verifies this leaf's own invariants (spec §8). Returns an error
    /// message on the first violation found.
    pub(crate) fn self_validate(&self) -> Result<(), String> {
        let n = self.records.len();
        if self.hash_tags.len() != n || self.key_refs.len() != n {
            return Err(format!(
                "leaf at anchor {:?}: array length mismatch (records={}, hash_tags={}, key_refs={})",
                self.anchor,
                n,
                self.hash_tags.len(),
                self.key_refs.len()
            ));
        }
        for w in self.hash_tags.windows(2) {
            if w[0].hash > w[1].hash {
                return Err(format!("leaf at anchor {:?}: hash tags not ascending", self.anchor));
            }
        }
        let mut seen = vec![false; n];
        for tag in &self.hash_tags {
            let idx = tag.index as usize;
            if idx >= n || seen[idx] {
                return Err(format!(
                    "leaf at anchor {:?}: hash tag index {} is not a permutation of [0,{})",
                    self.anchor, idx, n
                ));
            }
            seen[idx] = true;
        }
        for w in self.key_refs[..self.sorted_count].windows(2) {
            if self.records[w[0]].encoded > self.records[w[1]].encoded {
                return Err(format!(
                    "leaf at anchor {:?}: sorted prefix of key_refs is not ascending",
                    self.anchor
                ));
            }
        }
        for r in &self.records {
            if r.encoded < self.anchor {
                return Err(format!(
                    "leaf at anchor {:?}: record with key {:?} is below the anchor",
                    self.anchor, r.encoded
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn keys_iter(&self) -> impl Iterator<Item = &EncodedKey> {
        self.records.iter().map(|r| &r.encoded)
    }
}

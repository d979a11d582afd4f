//! The invariant validator (spec §4.D / §8).
//!
//! Cross-checks the leaf chain, the arena, and the MTHT against each other.
//! Grounded on the teacher's test-vector-pinning discipline: a single
//! `validate` function returning a human-readable `Result<(), String>`
//! rather than a typed error enum, since this is diagnostic-only tooling
//! invoked from `debug_mode` and tests, never part of the contract-error
//! surface (spec §7).

use std::collections::HashSet;

use crate::arena::{Arena, LeafId};
use crate::mtht::{Mtht, NodeMeta};

pub(crate) fn validate<K, V>(
    arena: &Arena<K, V>,
    mtht: &Mtht,
    leftmost: LeafId,
    rightmost: LeafId,
    expected_len: usize,
    capacity: usize,
) -> Result<(), String> {
    validate_chain(arena, leftmost, rightmost, expected_len, capacity)?;
    validate_mtht_reachability(arena, mtht, leftmost)?;
    Ok(())
}

fn validate_chain<K, V>(
    arena: &Arena<K, V>,
    leftmost: LeafId,
    rightmost: LeafId,
    expected_len: usize,
    capacity: usize,
) -> Result<(), String> {
    if arena.get(leftmost).left.is_some() {
        return Err("leftmost leaf has a left neighbor".to_string());
    }
    if arena.get(rightmost).right.is_some() {
        return Err("rightmost leaf has a right neighbor".to_string());
    }

    let threshold = (3 * capacity) / 4;
    let mut total = 0usize;
    let mut visited = HashSet::new();
    let mut cur = leftmost;
    let mut prev: Option<LeafId> = None;
    loop {
        if !visited.insert(cur) {
            return Err(format!("leaf chain contains a cycle at {cur:?}"));
        }
        let leaf = arena.get(cur);
        leaf.self_validate().map_err(|e| format!("chain walk: {e}"))?;

        if leaf.left != prev {
            return Err(format!("leaf {cur:?}: back-pointer does not match forward walk"));
        }
        if leaf.size() > leaf.capacity() {
            return Err(format!("leaf {cur:?}: over capacity ({} > {})", leaf.size(), leaf.capacity()));
        }
        total += leaf.size();

        match leaf.right {
            Some(next) => {
                let next_leaf = arena.get(next);
                if let Some(max_key) = leaf.keys_iter().max() {
                    if max_key >= &next_leaf.anchor {
                        return Err(format!(
                            "leaf {cur:?}: maximum key is not below the right neighbor's anchor"
                        ));
                    }
                }
                if leaf.size() + next_leaf.size() < threshold {
                    return Err(format!(
                        "leaves {cur:?} and {next:?}: adjacent leaves below the merge threshold were not merged"
                    ));
                }
                prev = Some(cur);
                cur = next;
            }
            None => break,
        }
    }

    if cur != rightmost {
        return Err("forward walk from leftmost did not reach rightmost".to_string());
    }
    if visited.len() != arena.live_count() {
        return Err(format!(
            "leaf chain visited {} leaves but the arena holds {} live leaves",
            visited.len(),
            arena.live_count()
        ));
    }
    if total != expected_len {
        return Err(format!(
            "sum of leaf sizes ({total}) does not match the tracked length ({expected_len})"
        ));
    }
    Ok(())
}

/// Breadth-first walk of the MTHT starting from the empty prefix, following
/// each internal meta's bitmap, checking every table entry is reached
/// exactly once and every leaf referenced is live.
fn validate_mtht_reachability<K, V>(arena: &Arena<K, V>, mtht: &Mtht, _leftmost: LeafId) -> Result<(), String> {
    use crate::key::EncodedKey;

    let mut reached: HashSet<Vec<u8>> = HashSet::new();
    let mut queue = vec![EncodedKey::empty()];
    reached.insert(Vec::new());

    while let Some(prefix) = queue.pop() {
        let meta = mtht
            .get(&prefix)
            .ok_or_else(|| format!("mtht: prefix {prefix:?} enqueued but missing"))?;
        match meta {
            NodeMeta::Leaf(id) => {
                // touching arena.get validates liveness (panics if stale).
                let _ = arena.get(*id);
            }
            NodeMeta::Internal { bitmap, .. } => {
                for byte in bitmap.iter_set_bits() {
                    let child = prefix.append_byte(byte);
                    if reached.insert(child.as_bytes().to_vec()) {
                        queue.push(child);
                    }
                }
            }
        }
    }

    if reached.len() != mtht.len() {
        return Err(format!(
            "mtht: {} entries reachable from the root but the table holds {}",
            reached.len(),
            mtht.len()
        ));
    }
    for (prefix, _) in mtht.iter() {
        if !reached.contains(prefix.as_bytes()) {
            return Err(format!("mtht: entry at {prefix:?} is unreachable from the root"));
        }
    }
    Ok(())
}

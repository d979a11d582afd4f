//! Property-based tests for the laws and invariants of spec §8.
//!
//! `F` is kept small (down to 3, per spec §3's "3 is permitted for tests")
//! so splits and merges are exercised on every run, not only at scale.

use proptest::prelude::*;
use std::collections::BTreeMap;
use wormhole::{Wormhole, WormholeConfig};

fn small_config(capacity: usize) -> WormholeConfig {
    WormholeConfig {
        capacity,
        debug_mode: true,
    }
}

fn capacities() -> impl Strategy<Value = usize> {
    3usize..12
}

proptest! {
    /// Round trip: `put(k, v); get(k) == v`.
    #[test]
    fn round_trip(capacity in capacities(), k in any::<i64>(), v in any::<i64>()) {
        let mut w: Wormhole<i64, i64> = Wormhole::new(small_config(capacity));
        w.put(k, v);
        prop_assert_eq!(w.get(&k), Some(&v));
    }

    /// Overwrite: `put(k, v1); old = put(k, v2); get(k) == v2 and old == v1`.
    #[test]
    fn overwrite(capacity in capacities(), k in any::<i64>(), v1 in any::<i64>(), v2 in any::<i64>()) {
        let mut w: Wormhole<i64, i64> = Wormhole::new(small_config(capacity));
        w.put(k, v1);
        let old = w.put(k, v2);
        prop_assert_eq!(old, Some(v1));
        prop_assert_eq!(w.get(&k), Some(&v2));
    }

    /// Delete: `put(k, v); delete(k) == true; get(k) == none; delete(k) == false`.
    #[test]
    fn delete_then_absent(capacity in capacities(), k in any::<i64>(), v in any::<i64>()) {
        let mut w: Wormhole<i64, i64> = Wormhole::new(small_config(capacity));
        w.put(k, v);
        prop_assert!(w.delete(&k));
        prop_assert_eq!(w.get(&k), None);
        prop_assert!(!w.delete(&k));
    }

    /// Scan totality: scanning the whole index yields exactly the sorted
    /// entries of an equivalent reference map.
    #[test]
    fn scan_totality(
        capacity in capacities(),
        pairs in prop::collection::vec((any::<i64>(), any::<i64>()), 0..60)
    ) {
        let mut w: Wormhole<i64, i64> = Wormhole::new(small_config(capacity));
        let mut model: BTreeMap<i64, i64> = BTreeMap::new();
        for (k, v) in pairs {
            w.put(k, v);
            model.insert(k, v);
        }
        let mut got = Vec::new();
        w.scan(None, None, false, |k, v| {
            got.push((*k, *v));
            true
        });
        let expected: Vec<(i64, i64)> = model.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    /// Scan range: `scan(a, b, true, _)` yields `{(k,v) : a <= k < b}`; with
    /// `end_exclusive=false`, `a <= k <= b`.
    #[test]
    fn scan_range(
        capacity in capacities(),
        pairs in prop::collection::vec((any::<i64>(), any::<i64>()), 0..60),
        a in any::<i64>(),
        b in any::<i64>(),
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut w: Wormhole<i64, i64> = Wormhole::new(small_config(capacity));
        let mut model: BTreeMap<i64, i64> = BTreeMap::new();
        for (k, v) in pairs {
            w.put(k, v);
            model.insert(k, v);
        }

        let mut exclusive = Vec::new();
        w.scan(Some(&lo), Some(&hi), true, |k, v| {
            exclusive.push((*k, *v));
            true
        });
        let expected_exclusive: Vec<(i64, i64)> = model
            .range(lo..hi)
            .map(|(&k, &v)| (k, v))
            .collect();
        prop_assert_eq!(exclusive, expected_exclusive);

        let mut inclusive = Vec::new();
        w.scan(Some(&lo), Some(&hi), false, |k, v| {
            inclusive.push((*k, *v));
            true
        });
        let expected_inclusive: Vec<(i64, i64)> = model
            .range(lo..=hi)
            .map(|(&k, &v)| (k, v))
            .collect();
        prop_assert_eq!(inclusive, expected_inclusive);
    }

    /// Scan count: `scan_with_count(a, n)` yields the first
    /// `min(n, |{k >= a}|)` entries.
    #[test]
    fn scan_count(
        capacity in capacities(),
        pairs in prop::collection::vec((any::<i64>(), any::<i64>()), 0..60),
        a in any::<i64>(),
        n in 0i64..20,
    ) {
        let mut w: Wormhole<i64, i64> = Wormhole::new(small_config(capacity));
        let mut model: BTreeMap<i64, i64> = BTreeMap::new();
        for (k, v) in pairs {
            w.put(k, v);
            model.insert(k, v);
        }
        let got = w.scan_with_count(Some(&a), n).unwrap();
        let expected: Vec<(i64, i64)> = model
            .range(a..)
            .take(n as usize)
            .map(|(&k, &v)| (k, v))
            .collect();
        prop_assert_eq!(got, expected);
    }

    /// Early stop: once `visit` returns `false`, no further invocations
    /// occur, and exactly the first `limit` sorted entries were seen.
    #[test]
    fn early_stop(
        capacity in capacities(),
        pairs in prop::collection::vec((any::<i64>(), any::<i64>()), 1..60),
        stop_after in 1usize..10,
    ) {
        let mut w: Wormhole<i64, i64> = Wormhole::new(small_config(capacity));
        let mut model: BTreeMap<i64, i64> = BTreeMap::new();
        for (k, v) in pairs {
            w.put(k, v);
            model.insert(k, v);
        }
        let limit = stop_after.min(model.len());
        let mut visited = Vec::new();
        w.scan(None, None, false, |k, v| {
            visited.push((*k, *v));
            visited.len() < limit
        });
        let expected: Vec<(i64, i64)> = model.into_iter().take(limit).collect();
        prop_assert_eq!(visited, expected);
    }

    /// Validator idempotence: running the validator between operations
    /// reports no errors.
    #[test]
    fn validator_idempotence(
        capacity in capacities(),
        pairs in prop::collection::vec((any::<i64>(), any::<i64>()), 0..80),
        deletes in prop::collection::vec(any::<i64>(), 0..40),
    ) {
        let mut w: Wormhole<i64, i64> = Wormhole::new(small_config(capacity));
        for (k, v) in pairs {
            w.put(k, v);
            w.validate();
        }
        for k in deletes {
            w.delete(&k);
            w.validate();
        }
        w.validate();
    }
}

#[test]
fn negative_scan_count_is_rejected() {
    let mut w: Wormhole<i64, i64> = Wormhole::new(small_config(4));
    w.put(1, 10);
    let err = w.scan_with_count(None, -1).unwrap_err();
    assert_eq!(err, wormhole::WormholeError::NegativeCount);
}

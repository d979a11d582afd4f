//! End-to-end scenarios with literal values (spec §8).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use wormhole::{Wormhole, WormholeConfig};

fn small(capacity: usize) -> WormholeConfig {
    WormholeConfig {
        capacity,
        debug_mode: true,
    }
}

#[test]
fn point_lookups_on_three_text_keys() {
    let mut w: Wormhole<String, String> = Wormhole::new(small(3));
    w.put("James".to_string(), "semaj".to_string());
    w.put("John".to_string(), "nhoj".to_string());
    w.put("Jason".to_string(), "nosaj".to_string());

    assert_eq!(w.get(&"Jame".to_string()), None);
    assert_eq!(w.get(&"James".to_string()), Some(&"semaj".to_string()));
    assert_eq!(w.get(&"Jason".to_string()), Some(&"nosaj".to_string()));
}

#[test]
fn five_inserts_force_a_split_then_scan_is_sorted() {
    let mut w: Wormhole<String, String> = Wormhole::new(small(3));
    let entries = [
        ("James", "semaj"),
        ("Joseph", "hpesoj"),
        ("John", "nhoj"),
        ("Jacob", "bocaj"),
        ("Jason", "nosaj"),
    ];
    for (k, v) in entries {
        w.put(k.to_string(), v.to_string());
    }
    w.validate();

    let mut out = Vec::new();
    w.scan(None, None, false, |k, v| {
        out.push((k.clone(), v.clone()));
        true
    });
    assert_eq!(
        out,
        vec![
            ("Jacob".to_string(), "bocaj".to_string()),
            ("James".to_string(), "semaj".to_string()),
            ("Jason".to_string(), "nosaj".to_string()),
            ("John".to_string(), "nhoj".to_string()),
            ("Joseph".to_string(), "hpesoj".to_string()),
        ]
    );
}

#[test]
fn nested_prefix_keys_scan_range() {
    let mut w: Wormhole<String, i32> = Wormhole::new(small(3));
    for (k, v) in [("aaaaa", 5), ("a", 1), ("aaa", 3), ("aaaa", 4), ("aa", 2)] {
        w.put(k.to_string(), v);
    }
    w.validate();

    let got = w.scan_with_count(Some(&"aa".to_string()), 4).unwrap();
    assert_eq!(
        got,
        vec![
            ("aa".to_string(), 2),
            ("aaa".to_string(), 3),
            ("aaaa".to_string(), 4),
            ("aaaaa".to_string(), 5),
        ]
    );

    let none = w.scan_with_count(Some(&"ab".to_string()), 10).unwrap();
    assert!(none.is_empty());
}

#[test]
fn integer_key_scan_range_inclusive_and_exclusive() {
    let mut w: Wormhole<i32, i32> = Wormhole::new(small(3));
    for (k, v) in [(10, 100), (20, 200), (30, 300), (40, 400), (50, 500)] {
        w.put(k, v);
    }
    w.validate();

    let mut inclusive = Vec::new();
    w.scan(Some(&11), Some(&49), false, |k, v| {
        inclusive.push((*k, *v));
        true
    });
    assert_eq!(inclusive, vec![(20, 200), (30, 300), (40, 400)]);

    let mut exclusive = Vec::new();
    w.scan(Some(&11), Some(&50), true, |k, v| {
        exclusive.push((*k, *v));
        true
    });
    assert_eq!(exclusive, vec![(20, 200), (30, 300), (40, 400)]);
}

#[test]
fn smallest_representable_integer_key() {
    let mut w: Wormhole<i64, String> = Wormhole::new(small(3));
    w.put(i64::MIN, "foo".to_string());
    w.validate();

    let mut all = Vec::new();
    w.scan(None, None, false, |k, v| {
        all.push((*k, v.clone()));
        true
    });
    assert_eq!(all, vec![(i64::MIN, "foo".to_string())]);

    let mut after = Vec::new();
    w.scan(Some(&(i64::MIN + 1)), None, false, |k, v| {
        after.push((*k, v.clone()));
        true
    });
    assert!(after.is_empty());
}

#[test]
fn stress_50_000_random_keys_through_full_delete() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let mut keys: Vec<i64> = (0..50_000i64).map(|i| i * 104_729 - 2_000_000_000).collect();
    keys.shuffle(&mut rng);

    let mut w: Wormhole<i64, i64> = Wormhole::new(WormholeConfig {
        capacity: 8,
        debug_mode: false,
    });
    for &k in &keys {
        w.put(k, k * 2);
    }
    for &k in &keys {
        assert_eq!(w.get(&k), Some(&(k * 2)));
    }
    w.validate();

    let mut remaining: Vec<i64> = keys.clone();
    remaining.shuffle(&mut rng);

    let half = remaining.len() / 2;
    for &k in &remaining[..half] {
        assert!(w.delete(&k));
    }
    remaining.drain(..half);
    w.validate();
    assert_scan_matches_sorted(&mut w, &remaining);

    let keep = remaining.len() / 20;
    let drop_now = remaining.len() - keep;
    for &k in &remaining[..drop_now] {
        assert!(w.delete(&k));
    }
    remaining.drain(..drop_now);
    w.validate();
    assert_scan_matches_sorted(&mut w, &remaining);

    for &k in &remaining {
        assert!(w.delete(&k));
    }
    w.validate();
    assert!(w.is_empty());
    let mut out = Vec::new();
    w.scan(None, None, false, |_, _| {
        out.push(());
        true
    });
    assert!(out.is_empty());
}

fn assert_scan_matches_sorted(w: &mut Wormhole<i64, i64>, remaining: &[i64]) {
    let mut expected: Vec<i64> = remaining.to_vec();
    expected.sort_unstable();
    let mut got = Vec::new();
    w.scan(None, None, false, |k, v| {
        got.push((*k, *v));
        true
    });
    let got_keys: Vec<i64> = got.iter().map(|(k, _)| *k).collect();
    assert_eq!(got_keys, expected);
    for (k, v) in got {
        assert_eq!(v, k * 2);
    }
}

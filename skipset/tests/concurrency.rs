//! Concurrency scenarios for the lock-free structures
//!
//! These mirror the literal end-to-end scenarios named in this crate's
//! specification for `LockFreeSkipSet`: every thread inserting a
//! distinct shuffle of the full key range, and a mixed add/remove
//! workload checked against the structure's own level-0 projection
//! rather than an external oracle (removes are racy by construction, so
//! there is no single expected final set — only internal consistency to
//! check). Each test initializes the crate's `log` output via
//! `env_logger` so the restart/rebuild trace points fire visibly under
//! `cargo test -- --nocapture`.

use skipset::lock_free_skip_set::LockFreeSkipSet;
use std::thread;

#[test]
fn eight_threads_each_insert_the_full_range_in_a_distinct_shuffle() {
    let _ = env_logger::builder().is_test(true).try_init();

    // N a power of two and every stride odd guarantees each thread's
    // additive walk (mod N) visits every residue exactly once before
    // repeating, i.e. a full shuffled permutation of [0, N) per thread.
    const N: i64 = 1_048_576;
    const THREADS: i64 = 8;
    let set = LockFreeSkipSet::new();

    thread::scope(|scope| {
        for t in 0..THREADS {
            let set = &set;
            scope.spawn(move || {
                let stride = 2 * t + 1;
                let mut key = t;
                for _ in 0..N {
                    set.add(key);
                    key = (key + stride) % N;
                }
            });
        }
    });

    for i in 0..N {
        assert!(set.contains(&i), "missing key {i}");
    }
    let collected: Vec<_> = set.iter().copied().collect();
    let mut sorted = collected.clone();
    sorted.sort_unstable();
    assert_eq!(collected, sorted);
    assert_eq!(collected.len(), N as usize);
}

#[test]
fn concurrent_adders_and_removers_stay_internally_consistent() {
    let _ = env_logger::builder().is_test(true).try_init();

    const RANGE: i32 = 32_767;
    const ADDERS: i32 = 4;
    const REMOVERS: i32 = 4;
    const OPS_PER_THREAD: i32 = 20_000;

    let set = LockFreeSkipSet::new();
    thread::scope(|scope| {
        for t in 0..ADDERS {
            let set = &set;
            scope.spawn(move || {
                let mut x = (t as i64) * 104_729 + 7;
                for _ in 0..OPS_PER_THREAD {
                    x = (x.wrapping_mul(1_103_515_245).wrapping_add(12_345)) & 0x7fff_ffff;
                    set.add((x % RANGE as i64) as i32);
                }
            });
        }
        for t in 0..REMOVERS {
            let set = &set;
            scope.spawn(move || {
                let mut x = (t as i64) * 92_821 + 3;
                for _ in 0..OPS_PER_THREAD {
                    x = (x.wrapping_mul(1_103_515_245).wrapping_add(12_345)) & 0x7fff_ffff;
                    set.remove(&((x % RANGE as i64) as i32));
                }
            });
        }
    });

    // The number of keys `contains` reports present must equal the
    // cardinality of the level-0 unmarked projection: no key is
    // observably present via one path and absent via the other.
    let unmarked_count = set.iter().count();
    let contains_count = (0..RANGE).filter(|i| set.contains(i)).count();
    assert_eq!(unmarked_count, contains_count);
}

//! A lock-free, multi-level probabilistic skip set
//!
//! Each node's forward array holds one [`FlagReference`] per level, the
//! mark-then-unlink technique applied at every level with a
//! linearization point at level 0. Two sentinels, head and tail, are
//! allocated once and linked together at every level at construction.
//!
//! Reclamation is intentionally weak: physically unlinked nodes are
//! pushed onto a mutex-guarded list and freed only when the whole
//! structure is dropped. This crate does not implement hazard pointers
//! or epoch-based reclamation for this variant; see the crate-level
//! documentation.

use crate::flag_ref::FlagReference;
use parking_lot::Mutex;
use skipset_core::{HeightConfig, RetryPolicy};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use crate::height::HeightSampler;

enum NodeKey<T> {
    Head,
    Value(T),
    Tail,
}

struct Node<T> {
    key: NodeKey<T>,
    forward: Vec<FlagReference<Node<T>>>,
}

fn cmp_to<T: Ord>(key: &NodeKey<T>, target: &T) -> Ordering {
    match key {
        NodeKey::Head => Ordering::Less,
        NodeKey::Tail => Ordering::Greater,
        NodeKey::Value(k) => k.cmp(target),
    }
}

fn key_ref<T>(node: &Node<T>) -> &T {
    match &node.key {
        NodeKey::Value(k) => k,
        _ => panic!("sentinel node has no key"),
    }
}

/// A lock-free ordered set supporting concurrent insert, remove, and
/// lookup
///
/// # Example
///
/// ```
/// use skipset::lock_free_skip_set::LockFreeSkipSet;
///
/// let set = LockFreeSkipSet::new();
/// assert!(set.add(1));
/// assert!(!set.add(1));
/// assert!(set.contains(&1));
/// assert!(set.remove(&1));
/// assert!(!set.contains(&1));
/// ```
pub struct LockFreeSkipSet<T> {
    head: *mut Node<T>,
    tail: *mut Node<T>,
    size: AtomicUsize,
    sampler: HeightSampler,
    retired: Mutex<Vec<*mut Node<T>>>,
    retry_policy: RetryPolicy,
}

unsafe impl<T: Send> Send for LockFreeSkipSet<T> {}
unsafe impl<T: Send> Sync for LockFreeSkipSet<T> {}

impl<T: Ord> LockFreeSkipSet<T> {
    /// Creates an empty set with the default height configuration and
    /// retry policy
    pub fn new() -> Self {
        Self::with_config(HeightConfig::default(), RetryPolicy::default())
    }

    /// Creates an empty set with caller-supplied configuration
    pub fn with_config(height_config: HeightConfig, retry_policy: RetryPolicy) -> Self {
        let hmax = height_config.max_height();
        let tail_forward = (0..hmax)
            .map(|_| FlagReference::new(ptr::null_mut(), false))
            .collect();
        let tail = Box::into_raw(Box::new(Node {
            key: NodeKey::Tail,
            forward: tail_forward,
        }));
        let head_forward = (0..hmax).map(|_| FlagReference::new(tail, false)).collect();
        let head = Box::into_raw(Box::new(Node {
            key: NodeKey::Head,
            forward: head_forward,
        }));
        Self {
            head,
            tail,
            size: AtomicUsize::new(0),
            sampler: HeightSampler::new(height_config),
            retired: Mutex::new(Vec::new()),
            retry_policy,
        }
    }

    /// A best-effort count of the keys currently in the set
    pub fn len(&self) -> usize {
        self.size.load(AtomicOrdering::SeqCst)
    }

    /// Whether the set currently holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait-free membership test
    pub fn contains(&self, key: &T) -> bool {
        let hmax = self.sampler.config().max_height();
        let mut pred = self.head;
        for level in (0..hmax).rev() {
            let mut curr = unsafe { (*pred).forward[level].get_ref() };
            loop {
                let node = unsafe { &*curr };
                let (succ, marked) = node.forward[level].get();
                if marked {
                    curr = succ;
                    continue;
                }
                if curr != self.tail && cmp_to(&node.key, key) == Ordering::Less {
                    pred = curr;
                    curr = succ;
                    continue;
                }
                break;
            }
            if curr != self.tail && cmp_to(unsafe { &(*curr).key }, key) == Ordering::Equal {
                return true;
            }
        }
        false
    }

    /// Descends from the top level, locating predecessors and
    /// successors at every level and opportunistically unlinking marked
    /// nodes along the way
    fn find(&self, key: &T) -> (Vec<*mut Node<T>>, Vec<*mut Node<T>>) {
        let hmax = self.sampler.config().max_height();
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            if attempts > self.retry_policy.max_attempts() {
                panic!("LockFreeSkipSet::find exceeded its retry budget; this indicates catastrophic contention or a logic bug");
            }
            let mut preds = vec![self.head; hmax];
            let mut succs = vec![self.tail; hmax];
            let mut pred = self.head;
            let mut restart = false;
            for level in (0..hmax).rev() {
                let mut curr = unsafe { (*pred).forward[level].get_ref() };
                loop {
                    let curr_node = unsafe { &*curr };
                    let (succ, flagged) = curr_node.forward[level].get();
                    if flagged {
                        if unsafe { (*pred).forward[level].cas(curr, succ, false, false) } {
                            if level == 0 {
                                self.size.fetch_sub(1, AtomicOrdering::SeqCst);
                                self.retired.lock().push(curr);
                            }
                            curr = succ;
                            continue;
                        } else {
                            restart = true;
                            break;
                        }
                    }
                    if curr == self.tail || cmp_to(&curr_node.key, key) != Ordering::Less {
                        break;
                    }
                    pred = curr;
                    curr = succ;
                }
                if restart {
                    break;
                }
                preds[level] = pred;
                succs[level] = curr;
            }
            if restart {
                log::debug!("lock_free_skip_set: find restarting from the top level after a failed unlink CAS");
                continue;
            }
            return (preds, succs);
        }
    }

    /// Inserts `key`, returning false if it is already present
    pub fn add(&self, key: T) -> bool {
        let height = self.sampler.sample();
        let mut key = key;
        loop {
            let (preds, mut succs) = self.find(&key);
            if succs[0] != self.tail && cmp_to(unsafe { &(*succs[0]).key }, &key) == Ordering::Equal
            {
                return false;
            }

            // Only level 0's forward pointer is wired before the
            // publishing CAS; upper levels are wired lazily during the
            // splice-upward pass below, against whatever successor is
            // current at the moment each level is attempted.
            let mut forward = Vec::with_capacity(height);
            forward.push(FlagReference::new(succs[0], false));
            for _ in 1..height {
                forward.push(FlagReference::new(ptr::null_mut(), false));
            }
            let node_ptr = Box::into_raw(Box::new(Node {
                key: NodeKey::Value(key),
                forward,
            }));

            if unsafe { (*preds[0]).forward[0].cas(succs[0], node_ptr, false, false) } {
                self.size.fetch_add(1, AtomicOrdering::SeqCst);
                let mut preds = preds;
                for level in 1..height {
                    loop {
                        unsafe { (*node_ptr).forward[level].set_ref(succs[level]) };
                        if unsafe {
                            (*preds[level]).forward[level].cas(succs[level], node_ptr, false, false)
                        } {
                            break;
                        }
                        let (new_preds, new_succs) = self.find(unsafe { key_ref(&*node_ptr) });
                        preds = new_preds;
                        succs = new_succs;
                    }
                }
                return true;
            }

            let boxed = unsafe { Box::from_raw(node_ptr) };
            key = match boxed.key {
                NodeKey::Value(k) => k,
                _ => unreachable!("new node always carries a real key"),
            };
        }
    }

    /// Removes `key`, returning false if it is not present
    pub fn remove(&self, key: &T) -> bool {
        let (_, succs) = self.find(key);
        let node_ptr = succs[0];
        if node_ptr == self.tail || cmp_to(unsafe { &(*node_ptr).key }, key) != Ordering::Equal {
            return false;
        }
        let node = unsafe { &*node_ptr };
        let height = node.forward.len();
        for level in (1..height).rev() {
            node.forward[level].set_flag(true);
        }
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            if attempts > self.retry_policy.max_attempts() {
                panic!("LockFreeSkipSet::remove exceeded its retry budget; this indicates catastrophic contention or a logic bug");
            }
            let (succ, flagged) = node.forward[0].get();
            if flagged {
                return false;
            }
            if node.forward[0].cas(succ, succ, false, true) {
                // This thread is the remover. Re-running find() elicits
                // the physical unlink (and its size decrement).
                self.find(key);
                return true;
            }
        }
    }

    /// Returns a cursor positioned at the first node whose key is `>=`
    /// `key`; an exhausted cursor equals tail
    pub fn locate(&self, key: &T) -> Cursor<'_, T> {
        let (_, succs) = self.find(key);
        Cursor {
            node: succs[0],
            tail: self.tail,
            _marker: PhantomData,
        }
    }

    /// Forward iteration along level 0, ascending, skipping marked
    /// nodes
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            node: unsafe { (*self.head).forward[0].get_ref() },
            tail: self.tail,
            _marker: PhantomData,
        }
    }
}

impl<T: Ord> Default for LockFreeSkipSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeSkipSet<T> {
    fn drop(&mut self) {
        let mut curr = self.head;
        while !curr.is_null() && curr != self.tail {
            let node = unsafe { Box::from_raw(curr) };
            curr = node.forward[0].get_ref();
        }
        if !self.tail.is_null() {
            drop(unsafe { Box::from_raw(self.tail) });
        }
        for ptr in self.retired.get_mut().drain(..) {
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

/// A cursor returned by [`LockFreeSkipSet::locate`]
pub struct Cursor<'a, T> {
    node: *mut Node<T>,
    tail: *mut Node<T>,
    _marker: PhantomData<&'a LockFreeSkipSet<T>>,
}

impl<'a, T> Cursor<'a, T> {
    /// The key at this position, or `None` if the cursor has reached
    /// the end
    pub fn key(&self) -> Option<&'a T> {
        if self.node == self.tail {
            None
        } else {
            Some(unsafe { key_ref(&*self.node) })
        }
    }
}

/// Iterator over a [`LockFreeSkipSet`]'s unmarked keys, ascending
pub struct Iter<'a, T> {
    node: *mut Node<T>,
    tail: *mut Node<T>,
    _marker: PhantomData<&'a LockFreeSkipSet<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            if self.node == self.tail {
                return None;
            }
            let node = unsafe { &*self.node };
            let (succ, marked) = node.forward[0].get();
            self.node = succ;
            if !marked {
                return Some(key_ref(node));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_finds_a_key_whose_height_is_far_below_hmax() {
        // p near 0 makes a sampled height of 1 overwhelmingly likely,
        // so the top-level descent walks straight to `tail` at every
        // level above the node's own height before reaching level 0 —
        // exactly the shape that exposed the single-`curr` regression.
        let config = HeightConfig::new(32, 0.01).unwrap();
        let set = LockFreeSkipSet::with_config(config, RetryPolicy::default());
        assert!(set.add(5));
        assert!(set.contains(&5));
        assert!(!set.contains(&6));
    }

    #[test]
    fn scenario_duplicate_add_then_remove() {
        let set = LockFreeSkipSet::new();
        assert!(set.add(5));
        assert!(!set.add(5));
        assert!(set.contains(&5));
        assert!(set.remove(&5));
        assert!(!set.contains(&5));
        assert!(!set.remove(&5));
    }

    #[test]
    fn iteration_is_ascending_and_skips_removed_keys() {
        let set = LockFreeSkipSet::new();
        for k in [5, 1, 3, 2, 4] {
            set.add(k);
        }
        set.remove(&3);
        let collected: Vec<_> = set.iter().copied().collect();
        assert_eq!(collected, vec![1, 2, 4, 5]);
    }

    #[test]
    fn locate_positions_at_first_key_geq_target() {
        let set = LockFreeSkipSet::new();
        for k in [10, 20, 30] {
            set.add(k);
        }
        assert_eq!(set.locate(&15).key(), Some(&20));
        assert_eq!(set.locate(&30).key(), Some(&30));
        assert_eq!(set.locate(&31).key(), None);
    }

    #[test]
    fn scenario_eight_threads_shuffled_inserts() {
        use std::thread;

        const N: i32 = 20_000;
        const THREADS: i32 = 8;
        let set = LockFreeSkipSet::new();
        thread::scope(|scope| {
            for t in 0..THREADS {
                let set = &set;
                scope.spawn(move || {
                    // A distinct, deterministic shuffle per thread: a
                    // fixed-stride walk over the range covers every
                    // value exactly once without needing an RNG.
                    let stride = 7 + t as i64 * 2 + 1;
                    let mut i: i64 = t as i64;
                    for _ in 0..N {
                        let v = (i % N as i64) as i32;
                        set.add(v);
                        i += stride;
                    }
                });
            }
        });
        for i in 0..N {
            assert!(set.contains(&i), "missing {i}");
        }
        let collected: Vec<_> = set.iter().copied().collect();
        let mut sorted = collected.clone();
        sorted.sort_unstable();
        assert_eq!(collected, sorted);
        assert_eq!(collected.len(), N as usize);
    }

    #[test]
    fn scenario_concurrent_adders_and_removers_stay_consistent() {
        use std::thread;

        const RANGE: i32 = 2_000;
        let set = LockFreeSkipSet::new();
        thread::scope(|scope| {
            for t in 0..4 {
                let set = &set;
                scope.spawn(move || {
                    let mut x = t as i64 * 37 + 11;
                    for _ in 0..2_000 {
                        x = (x * 1103515245 + 12345) & 0x7fff_ffff;
                        set.add((x % RANGE as i64) as i32);
                    }
                });
            }
            for t in 0..4 {
                let set = &set;
                scope.spawn(move || {
                    let mut x = t as i64 * 53 + 5;
                    for _ in 0..2_000 {
                        x = (x * 1103515245 + 12345) & 0x7fff_ffff;
                        set.remove(&((x % RANGE as i64) as i32));
                    }
                });
            }
        });
        let unmarked_count = set.iter().count();
        let contains_count = (0..RANGE).filter(|i| set.contains(i)).count();
        assert_eq!(unmarked_count, contains_count);
    }
}

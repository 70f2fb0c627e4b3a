//! A self-adjusting skip set
//!
//! Behaves exactly like [`crate::skip_set::SkipSet`] but additionally
//! tracks a ring of recently-found keys and, after a configurable
//! number of successful mutations, rebuilds a contiguous prefix of the
//! structure around the most relevant recent key. The rebuild exists
//! purely for locality: reinserting a hot window of keys in ascending
//! order gives the allocator a chance to place their nodes near each
//! other again, improving iteration cache behavior.

use crate::height::HeightSampler;
use skipset_core::{HeightConfig, QueryRingConfig, RebuildConfig};
use std::marker::PhantomData;
use std::ptr;

struct Node<T> {
    key: Option<T>,
    forward: Vec<*mut Node<T>>,
}

impl<T> Node<T> {
    fn boxed(key: Option<T>, height: usize) -> Box<Self> {
        Box::new(Self {
            key,
            forward: vec![ptr::null_mut(); height],
        })
    }
}

/// A [`crate::skip_set::SkipSet`] variant with a scoped rebuild for hot
/// prefixes
///
/// # Example
///
/// ```
/// use skipset::adjusting_skip_set::AdjustingSkipSet;
/// use skipset_core::RebuildConfig;
///
/// let mut set = AdjustingSkipSet::new();
/// set.set_rebuild_config(RebuildConfig::new(3, 0));
/// for k in [10, 20, 30, 40, 50] {
///     set.insert(k);
/// }
/// set.find(&30);
/// set.erase(&40); // the third modification since the threshold reset: triggers a rebuild
/// assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![10, 20, 30, 50]);
/// ```
pub struct AdjustingSkipSet<T> {
    head: *mut Node<T>,
    height: usize,
    size: usize,
    sampler: HeightSampler,
    rebuild_config: RebuildConfig,
    ring: Vec<Option<T>>,
    ring_index: usize,
    modify_count: i64,
    last_modified_key: Option<T>,
}

unsafe impl<T: Send> Send for AdjustingSkipSet<T> {}

impl<T: Ord + Clone> AdjustingSkipSet<T> {
    /// Creates an empty set with default height, rebuild, and ring
    /// configuration (adjustment disabled by default: `threshold = 0`)
    pub fn new() -> Self {
        Self::with_config(
            HeightConfig::default(),
            RebuildConfig::default(),
            QueryRingConfig::default(),
        )
    }

    /// Creates an empty set with caller-supplied configuration
    pub fn with_config(
        height_config: HeightConfig,
        rebuild_config: RebuildConfig,
        ring_config: QueryRingConfig,
    ) -> Self {
        let head = Box::into_raw(Node::boxed(None, height_config.max_height()));
        Self {
            head,
            height: 0,
            size: 0,
            sampler: HeightSampler::new(height_config),
            rebuild_config,
            ring: vec![None; ring_config.size()],
            ring_index: 0,
            modify_count: 0,
            last_modified_key: None,
        }
    }

    /// Replaces the rebuild configuration (threshold/scope) in place
    pub fn set_rebuild_config(&mut self, config: RebuildConfig) {
        self.rebuild_config = config;
    }

    /// The current structure height (0 if empty)
    pub fn height(&self) -> usize {
        self.height
    }

    /// The number of keys currently in the set
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the set currently holds no keys
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn locate(&self, key: &T) -> (Vec<*mut Node<T>>, *mut Node<T>) {
        let hmax = self.sampler.config().max_height();
        let mut preds = vec![self.head; hmax];
        let mut curr = self.head;
        for level in (0..self.height).rev() {
            loop {
                let next = unsafe { (*curr).forward[level] };
                if next.is_null() {
                    break;
                }
                if unsafe { (*next).key.as_ref().unwrap() } < key {
                    curr = next;
                } else {
                    break;
                }
            }
            preds[level] = curr;
        }
        let succ = if self.height > 0 {
            unsafe { (*curr).forward[0] }
        } else {
            ptr::null_mut()
        };
        (preds, succ)
    }

    fn raw_insert(&mut self, key: T) -> bool {
        let (preds, succ) = self.locate(&key);
        if !succ.is_null() && unsafe { (*succ).key.as_ref().unwrap() } == &key {
            return false;
        }
        let new_height = self.sampler.sample();
        if new_height > self.height {
            self.height = new_height;
        }
        let node = Box::into_raw(Node::boxed(Some(key), new_height));
        for level in 0..new_height {
            unsafe {
                (*node).forward[level] = (*preds[level]).forward[level];
                (*preds[level]).forward[level] = node;
            }
        }
        self.size += 1;
        true
    }

    fn raw_erase(&mut self, key: &T) -> bool {
        let (preds, succ) = self.locate(key);
        if succ.is_null() || unsafe { (*succ).key.as_ref().unwrap() } != key {
            return false;
        }
        let node_height = unsafe { (*succ).forward.len() };
        for level in 0..node_height {
            unsafe {
                if (*preds[level]).forward[level] == succ {
                    (*preds[level]).forward[level] = (*succ).forward[level];
                }
            }
        }
        while self.height > 0 && unsafe { (*self.head).forward[self.height - 1] }.is_null() {
            self.height -= 1;
        }
        self.size -= 1;
        drop(unsafe { Box::from_raw(succ) });
        true
    }

    /// Inserts `key`, returning false (and allocating nothing) if it is
    /// already present
    pub fn insert(&mut self, key: T) -> bool {
        let anchor_key = key.clone();
        let inserted = self.raw_insert(key);
        if inserted {
            self.last_modified_key = Some(anchor_key);
            self.note_modification();
        }
        inserted
    }

    /// Removes `key`, returning false if it is not present
    pub fn erase(&mut self, key: &T) -> bool {
        let erased = self.raw_erase(key);
        if erased {
            self.last_modified_key = Some(key.clone());
            self.note_modification();
        }
        erased
    }

    /// Returns true iff `key` is currently in the set, recording a
    /// successful lookup into the query ring
    pub fn find(&mut self, key: &T) -> bool {
        let (_, succ) = self.locate(key);
        let found = !succ.is_null() && unsafe { (*succ).key.as_ref().unwrap() } == key;
        if found {
            self.push_ring(key.clone());
        }
        found
    }

    /// Returns true iff `key` is currently in the set, without touching
    /// the query ring
    pub fn contains(&self, key: &T) -> bool {
        let (_, succ) = self.locate(key);
        !succ.is_null() && unsafe { (*succ).key.as_ref().unwrap() } == key
    }

    fn push_ring(&mut self, key: T) {
        let r = self.ring.len();
        let slot = self.ring_index % r;
        self.ring[slot] = Some(key);
        self.ring_index += 1;
    }

    fn anchor(&self) -> T {
        if self.ring_index == 0 {
            self.last_modified_key
                .clone()
                .expect("note_modification only runs after an insert or erase")
        } else {
            let r = self.ring.len();
            self.ring[(self.ring_index - 1) % r]
                .clone()
                .expect("ring slot was populated before ring_index advanced past it")
        }
    }

    fn note_modification(&mut self) {
        if !self.rebuild_config.is_enabled() {
            return;
        }
        self.modify_count += 1;
        if self.modify_count >= self.rebuild_config.threshold() {
            self.modify_count = 0;
            self.adjust();
        }
    }

    /// Rebuilds a hot prefix of the structure around the current anchor
    /// key, preserving the set exactly
    fn adjust(&mut self) {
        if self.size == 0 {
            return;
        }
        let anchor = self.anchor();
        let scope = self.rebuild_config.scope();
        let count = if scope > 0 {
            (scope as usize).min(self.size)
        } else {
            self.size
        };
        log::trace!("adjusting_skip_set: rebuild triggered, collecting {count} keys");

        let mut curr = {
            let (_, succ) = self.locate(&anchor);
            if succ.is_null() {
                unsafe { (*self.head).forward[0] }
            } else {
                succ
            }
        };

        let mut collected = Vec::with_capacity(count);
        while collected.len() < count {
            if curr.is_null() {
                curr = unsafe { (*self.head).forward[0] };
                if curr.is_null() {
                    break;
                }
            }
            let key = unsafe { (*curr).key.as_ref().unwrap().clone() };
            collected.push(key);
            curr = unsafe { (*curr).forward[0] };
        }

        for key in &collected {
            self.raw_erase(key);
        }
        for key in collected {
            self.raw_insert(key);
        }
    }

    /// Forward iteration along level 0, ascending
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: if self.height > 0 {
                unsafe { (*self.head).forward[0] }
            } else {
                ptr::null_mut()
            },
            _marker: PhantomData,
        }
    }
}

impl<T: Ord + Clone> Default for AdjustingSkipSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AdjustingSkipSet<T> {
    fn drop(&mut self) {
        let mut curr = self.head;
        while !curr.is_null() {
            let node = unsafe { Box::from_raw(curr) };
            curr = node.forward.first().copied().unwrap_or(ptr::null_mut());
        }
    }
}

/// Iterator over an [`AdjustingSkipSet`]'s keys, ascending
pub struct Iter<'a, T> {
    next: *mut Node<T>,
    _marker: PhantomData<&'a AdjustingSkipSet<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.next.is_null() {
            return None;
        }
        let node = unsafe { &*self.next };
        self.next = node.forward[0];
        node.key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scenario_threshold_rebuild_preserves_set() {
        let mut set = AdjustingSkipSet::new();
        set.set_rebuild_config(RebuildConfig::new(3, 0));
        for k in [10, 20, 30, 40, 50] {
            set.insert(k);
        }
        assert!(set.find(&30));
        assert!(set.erase(&40));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![10, 20, 30, 50]);
    }

    #[test]
    fn adjustment_disabled_by_default() {
        let mut set = AdjustingSkipSet::new();
        for k in 0..100 {
            set.insert(k);
        }
        // No panics, no unexpected mutation: disabled adjustment is a
        // pure no-op path.
        assert_eq!(set.len(), 100);
    }

    proptest! {
        #[test]
        fn ring_index_rule_holds_over_a_long_run(
            keys in prop::collection::vec(0i32..500, 200),
            lookups in prop::collection::vec(0i32..500, 500),
        ) {
            let mut set = AdjustingSkipSet::new();
            for k in keys {
                set.insert(k);
            }
            let mut expected_index = 0usize;
            for k in lookups {
                let was_present = set.contains(&k);
                let found = set.find(&k);
                prop_assert_eq!(found, was_present);
                if found {
                    expected_index += 1;
                }
                prop_assert_eq!(set.ring_index, expected_index);
            }
        }

        #[test]
        fn rebuild_preserves_the_set_exactly(
            keys in prop::collection::btree_set(0i32..300, 5..80),
            scope in 0i64..40,
        ) {
            let mut set = AdjustingSkipSet::new();
            for &k in &keys {
                set.insert(k);
            }
            set.set_rebuild_config(RebuildConfig::new(1, scope));
            let anchor = *keys.iter().next().unwrap();
            set.find(&anchor);
            // Any further insert/erase ticks the counter past threshold=1
            // and triggers a rebuild; erase-then-reinsert is a no-op on
            // the set observed from outside.
            set.erase(&anchor);
            set.insert(anchor);

            let expected: Vec<_> = keys.iter().copied().collect();
            let collected: Vec<_> = set.iter().copied().collect();
            prop_assert_eq!(collected, expected);
        }
    }
}

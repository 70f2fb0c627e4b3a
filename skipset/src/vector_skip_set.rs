//! A vector-of-keys skip set
//!
//! Each non-head node amortizes skip-list overhead by holding an
//! unordered bounded array of up to `K` keys instead of exactly one.
//! `K` is a compile-time constant (a const generic parameter) in
//! `[2, 256]`.

use crate::height::HeightSampler;
use skipset_core::HeightConfig;
use std::marker::PhantomData;
use std::ptr;

struct Node<T, const K: usize> {
    // `None` only for the head sentinel.
    keys: Option<Vec<T>>,
    i_min: usize,
    i_max: usize,
    forward: Vec<*mut Node<T, K>>,
}

impl<T, const K: usize> Node<T, K> {
    fn head(height: usize) -> Box<Self> {
        Box::new(Self {
            keys: None,
            i_min: 0,
            i_max: 0,
            forward: vec![ptr::null_mut(); height],
        })
    }

    fn single(key: T, height: usize) -> Box<Self> {
        Box::new(Self {
            keys: Some(vec![key]),
            i_min: 0,
            i_max: 0,
            forward: vec![ptr::null_mut(); height],
        })
    }
}

fn node_min<T, const K: usize>(node: &Node<T, K>) -> Option<&T> {
    node.keys.as_ref().map(|ks| &ks[node.i_min])
}

/// Swaps `key` in for `keys[i_max]` if the incoming key is smaller,
/// returning whichever value ends up needing a home elsewhere: the
/// displaced old maximum if a swap happened, or `key` unchanged if not
fn maybe_swap_with_max<T: Ord>(keys: &mut Vec<T>, i_max: &mut usize, key: T) -> T {
    if keys[*i_max] > key {
        let mut displaced = key;
        std::mem::swap(&mut keys[*i_max], &mut displaced);
        let mut max_idx = 0;
        for i in 1..keys.len() {
            if keys[i] > keys[max_idx] {
                max_idx = i;
            }
        }
        *i_max = max_idx;
        displaced
    } else {
        key
    }
}

fn remove_key_in_place<T: Ord, const K: usize>(node: &mut Node<T, K>, key: &T) {
    let ks = node.keys.as_mut().unwrap();
    let idx = ks.iter().position(|k| k == key).expect("key present in node");
    ks.swap_remove(idx);
    let mut min_idx = 0;
    let mut max_idx = 0;
    for i in 1..ks.len() {
        if ks[i] < ks[min_idx] {
            min_idx = i;
        }
        if ks[i] > ks[max_idx] {
            max_idx = i;
        }
    }
    node.i_min = min_idx;
    node.i_max = max_idx;
}

/// A single-threaded ordered set whose nodes each hold up to `K` keys
///
/// # Example
///
/// ```
/// use skipset::vector_skip_set::VectorSkipSet;
///
/// let mut set: VectorSkipSet<i32, 3> = VectorSkipSet::new();
/// for k in [4, 2, 19, 7, 14, 3, 8] {
///     set.insert(k);
/// }
/// assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 3, 4, 7, 8, 14, 19]);
/// ```
pub struct VectorSkipSet<T, const K: usize> {
    head: *mut Node<T, K>,
    height: usize,
    size: usize,
    sampler: HeightSampler,
}

unsafe impl<T: Send, const K: usize> Send for VectorSkipSet<T, K> {}

impl<T: Ord + Clone, const K: usize> VectorSkipSet<T, K> {
    /// Creates an empty set with the default height configuration
    pub fn new() -> Self {
        Self::with_config(HeightConfig::default())
    }

    /// Creates an empty set with a caller-supplied height configuration
    ///
    /// # Panics
    ///
    /// Panics if `K` is not in `[2, 256]`.
    pub fn with_config(config: HeightConfig) -> Self {
        assert!((2..=256).contains(&K), "K must be in [2, 256], got {K}");
        let head = Box::into_raw(Node::head(config.max_height()));
        Self {
            head,
            height: 0,
            size: 0,
            sampler: HeightSampler::new(config),
        }
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

    fn is_full(&self, ptr: *mut Node<T, K>) -> bool {
        if ptr.is_null() || ptr == self.head {
            return true;
        }
        unsafe { (*ptr).keys.as_ref().unwrap().len() >= K }
    }

    /// Returns `(curr, no_less, preds)`: `curr` is the rightmost node
    /// whose min key is less than `key` (head if none); `no_less` is
    /// `curr`'s level-0 successor.
    fn locate(&self, key: &T) -> (*mut Node<T, K>, *mut Node<T, K>, Vec<*mut Node<T, K>>) {
        let hmax = self.sampler.config().max_height();
        let mut preds = vec![self.head; hmax];
        let mut curr = self.head;
        for level in (0..self.height).rev() {
            loop {
                let next = unsafe { (*curr).forward[level] };
                if next.is_null() {
                    break;
                }
                if unsafe { node_min(&*next).unwrap() } < key {
                    curr = next;
                } else {
                    break;
                }
            }
            preds[level] = curr;
        }
        let no_less = if self.height > 0 {
            unsafe { (*curr).forward[0] }
        } else {
            ptr::null_mut()
        };
        (curr, no_less, preds)
    }

    /// Returns true iff `key` is currently in the set
    pub fn contains(&self, key: &T) -> bool {
        let (curr, no_less, _) = self.locate(key);
        if !no_less.is_null() && unsafe { node_min(&*no_less) } == Some(key) {
            return true;
        }
        if curr != self.head {
            return unsafe { (*curr).keys.as_ref().unwrap().iter().any(|k| k == key) };
        }
        false
    }

    /// Inserts `key`, returning false if it is already present
    pub fn insert(&mut self, key: T) -> bool {
        let (curr, no_less, preds) = self.locate(&key);
        let present = (!no_less.is_null() && unsafe { node_min(&*no_less) } == Some(&key))
            || (curr != self.head
                && unsafe { (*curr).keys.as_ref().unwrap().iter().any(|k| k == &key) });
        if present {
            return false;
        }

        let curr_full = self.is_full(curr);
        let no_less_full = self.is_full(no_less);

        if curr_full && no_less_full {
            let mut incoming = key;
            if curr != self.head {
                let curr_node = unsafe { &mut *curr };
                incoming = maybe_swap_with_max(
                    curr_node.keys.as_mut().unwrap(),
                    &mut curr_node.i_max,
                    incoming,
                );
            }
            let new_height = self.sampler.sample();
            if new_height > self.height {
                self.height = new_height;
            }
            let node = Box::into_raw(Node::single(incoming, new_height));
            for level in 0..new_height {
                unsafe {
                    (*node).forward[level] = (*preds[level]).forward[level];
                    (*preds[level]).forward[level] = node;
                }
            }
        } else if !curr_full {
            let curr_node = unsafe { &mut *curr };
            let ks = curr_node.keys.as_mut().unwrap();
            ks.push(key);
            let new_idx = ks.len() - 1;
            if ks[new_idx] > ks[curr_node.i_max] {
                curr_node.i_max = new_idx;
            }
        } else {
            // curr full, no_less not full
            let mut incoming = key;
            if curr != self.head {
                let curr_node = unsafe { &mut *curr };
                incoming = maybe_swap_with_max(
                    curr_node.keys.as_mut().unwrap(),
                    &mut curr_node.i_max,
                    incoming,
                );
            }
            let no_less_node = unsafe { &mut *no_less };
            let ks = no_less_node.keys.as_mut().unwrap();
            ks.push(incoming);
            let new_idx = ks.len() - 1;
            if ks[new_idx] < ks[no_less_node.i_min] {
                no_less_node.i_min = new_idx;
            }
        }
        self.size += 1;
        true
    }

    fn unlink(&mut self, node_ptr: *mut Node<T, K>, preds: &[*mut Node<T, K>]) {
        let node_height = unsafe { (*node_ptr).forward.len() };
        for level in 0..node_height {
            unsafe {
                if (*preds[level]).forward[level] == node_ptr {
                    (*preds[level]).forward[level] = (*node_ptr).forward[level];
                }
            }
        }
        while self.height > 0 && unsafe { (*self.head).forward[self.height - 1] }.is_null() {
            self.height -= 1;
        }
        drop(unsafe { Box::from_raw(node_ptr) });
    }

    /// Removes `key`, returning false if it is not present
    pub fn erase(&mut self, key: &T) -> bool {
        let (curr, no_less, preds) = self.locate(key);

        if !no_less.is_null() && unsafe { node_min(&*no_less) } == Some(key) {
            let single = unsafe { (*no_less).keys.as_ref().unwrap().len() == 1 };
            if single {
                self.unlink(no_less, &preds);
            } else {
                remove_key_in_place(unsafe { &mut *no_less }, key);
            }
            self.size -= 1;
            return true;
        }

        if curr != self.head {
            let present = unsafe { (*curr).keys.as_ref().unwrap().iter().any(|k| k == key) };
            if present {
                let single = unsafe { (*curr).keys.as_ref().unwrap().len() == 1 };
                if single {
                    self.unlink(curr, &preds);
                } else {
                    remove_key_in_place(unsafe { &mut *curr }, key);
                }
                self.size -= 1;
                return true;
            }
        }

        false
    }

    /// Returns an immutable iterator positioned at `key`, or an
    /// exhausted iterator if `key` is absent
    ///
    /// Each traversal step sorts a snapshot of the current node's key
    /// array; the iterator is valid only while the structure is not
    /// mutated.
    pub fn find_immutable(&self, key: &T) -> ImmuIter<'_, T, K> {
        let (curr, no_less, _) = self.locate(key);
        let owner = if !no_less.is_null() && unsafe { node_min(&*no_less) } == Some(key) {
            no_less
        } else if curr != self.head && unsafe { (*curr).keys.as_ref().unwrap().contains(key) } {
            curr
        } else {
            ptr::null_mut()
        };
        if owner.is_null() {
            return ImmuIter::empty();
        }
        let mut snapshot: Vec<T> = unsafe { (*owner).keys.as_ref().unwrap().clone() };
        snapshot.sort();
        let pos = snapshot.binary_search(key).expect("key present in owner node");
        ImmuIter {
            node: owner,
            snapshot,
            pos,
            _marker: PhantomData,
        }
    }

    /// An immutable iterator over every key, ascending
    pub fn iter(&self) -> ImmuIter<'_, T, K> {
        let first = if self.height > 0 {
            unsafe { (*self.head).forward[0] }
        } else {
            ptr::null_mut()
        };
        if first.is_null() {
            return ImmuIter::empty();
        }
        let mut snapshot: Vec<T> = unsafe { (*first).keys.as_ref().unwrap().clone() };
        snapshot.sort();
        ImmuIter {
            node: first,
            snapshot,
            pos: 0,
            _marker: PhantomData,
        }
    }
}

impl<T: Ord + Clone, const K: usize> Default for VectorSkipSet<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const K: usize> Drop for VectorSkipSet<T, K> {
    fn drop(&mut self) {
        let mut curr = self.head;
        while !curr.is_null() {
            let node = unsafe { Box::from_raw(curr) };
            curr = node.forward.first().copied().unwrap_or(ptr::null_mut());
        }
    }
}

/// Immutable snapshot iterator over a [`VectorSkipSet`]
pub struct ImmuIter<'a, T, const K: usize> {
    node: *mut Node<T, K>,
    snapshot: Vec<T>,
    pos: usize,
    _marker: PhantomData<&'a VectorSkipSet<T, K>>,
}

impl<'a, T: Ord + Clone, const K: usize> ImmuIter<'a, T, K> {
    fn empty() -> Self {
        Self {
            node: ptr::null_mut(),
            snapshot: Vec::new(),
            pos: 0,
            _marker: PhantomData,
        }
    }
}

impl<'a, T: Ord + Clone, const K: usize> Iterator for ImmuIter<'a, T, K> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if self.pos < self.snapshot.len() {
                let v = self.snapshot[self.pos].clone();
                self.pos += 1;
                return Some(v);
            }
            if self.node.is_null() {
                return None;
            }
            self.node = unsafe { (*self.node).forward[0] };
            if self.node.is_null() {
                return None;
            }
            self.snapshot = unsafe { (*self.node).keys.as_ref().unwrap().clone() };
            self.snapshot.sort();
            self.pos = 0;
        }
    }
}

//! Ordered-set skip list variants
//!
//! This crate implements four independent in-memory index structures,
//! each an ordered set of comparable keys, differing in concurrency
//! model and memory layout:
//!
//! - [`skip_set`]: a single-threaded skip set with per-node contiguous
//!   forward-pointer arrays (the baseline).
//! - [`adjusting_skip_set`]: a self-adjusting variant that periodically
//!   rebuilds a hot prefix of nodes to improve iteration cache
//!   behavior.
//! - [`vector_skip_set`]: a variant whose nodes each hold up to `K`
//!   keys, amortizing skip-list overhead.
//! - [`lock_free_skip_set`]: a lock-free variant supporting concurrent
//!   insertion, deletion, and lookup, built on [`flag_ref`] and
//!   conceptually related to [`lock_free_list`].
//!
//! # Example
//!
//! ```
//! use skipset::skip_set::SkipSet;
//!
//! let mut set = SkipSet::new();
//! set.insert(3);
//! set.insert(1);
//! assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
//! ```

pub mod adjusting_skip_set;
pub mod flag_ref;
pub mod height;
pub mod lock_free_list;
pub mod lock_free_skip_set;
pub mod skip_set;
pub mod vector_skip_set;

pub use adjusting_skip_set::AdjustingSkipSet;
pub use flag_ref::FlagReference;
pub use lock_free_list::LockFreeOrderedList;
pub use lock_free_skip_set::LockFreeSkipSet;
pub use skip_set::SkipSet;
pub use vector_skip_set::VectorSkipSet;

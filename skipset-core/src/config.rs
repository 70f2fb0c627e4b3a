//! Configuration shared by the skipset data structures
//!
//! One struct per tunable named in the parameter table of the library's
//! specification, each with a `Default` matching that table and a
//! validating constructor.

use crate::{Error, Result};

/// Height-sampling parameters used by every structure except
/// `LockFreeOrderedList`, which has no height of its own.
///
/// # Example
///
/// ```
/// use skipset_core::HeightConfig;
///
/// let cfg = HeightConfig::new(16, 0.25).unwrap();
/// assert_eq!(cfg.max_height(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightConfig {
    max_height: usize,
    p: f64,
}

impl HeightConfig {
    /// Maximum height (`Hmax`) accepted for any structure
    pub const MAX_HEIGHT_LIMIT: usize = 64;

    /// Creates a validated height configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `max_height` is not in
    /// `[1, 64]` or `p` is not in `(0.0, 1.0)`.
    pub fn new(max_height: usize, p: f64) -> Result<Self> {
        if max_height == 0 || max_height > Self::MAX_HEIGHT_LIMIT {
            return Err(Error::InvalidConfiguration(format!(
                "max_height must be in [1, {}], got {max_height}",
                Self::MAX_HEIGHT_LIMIT
            )));
        }
        if !(p > 0.0 && p < 1.0) {
            return Err(Error::InvalidConfiguration(format!(
                "p must be in (0, 1), got {p}"
            )));
        }
        Ok(Self { max_height, p })
    }

    /// The configured maximum height (`Hmax`)
    pub fn max_height(&self) -> usize {
        self.max_height
    }

    /// The configured rise probability (`p`)
    pub fn p(&self) -> f64 {
        self.p
    }
}

impl Default for HeightConfig {
    fn default() -> Self {
        Self {
            max_height: 32,
            p: 0.5,
        }
    }
}

/// Parameters controlling `AdjustingSkipSet`'s scoped rebuild
///
/// `threshold <= 0` disables adjustment entirely; `scope <= 0` means
/// "rebuild every non-head node" rather than a bounded prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildConfig {
    threshold: i64,
    scope: i64,
}

impl RebuildConfig {
    /// Creates a rebuild configuration
    ///
    /// Any `i64` value is accepted for either field: non-positive values
    /// carry the disable/"rebuild everything" meanings documented above
    /// rather than being rejected.
    pub fn new(threshold: i64, scope: i64) -> Self {
        Self { threshold, scope }
    }

    /// Number of successful inserts+erases between rebuilds, or a
    /// non-positive value to disable adjustment
    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// Maximum number of keys to reconstruct per rebuild, or a
    /// non-positive value meaning "every non-head node"
    pub fn scope(&self) -> i64 {
        self.scope
    }

    /// Whether adjustment is enabled under this configuration
    pub fn is_enabled(&self) -> bool {
        self.threshold > 0
    }
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            threshold: 0,
            scope: 0,
        }
    }
}

/// Size of `AdjustingSkipSet`'s ring of recently-found keys (`R`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRingConfig {
    size: usize,
}

impl QueryRingConfig {
    /// Creates a validated ring configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidConfiguration(
                "query ring size must be >= 1".to_string(),
            ));
        }
        Ok(Self { size })
    }

    /// The configured ring size (`R`)
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for QueryRingConfig {
    fn default() -> Self {
        Self { size: 64 }
    }
}

/// Bound on the number of times a CAS retry loop may spin before the
/// lock-free structures treat it as catastrophic contention (or a logic
/// bug) and panic with a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u64,
}

impl RetryPolicy {
    /// Creates a retry policy
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `max_attempts` is zero.
    pub fn new(max_attempts: u64) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::InvalidConfiguration(
                "max_attempts must be >= 1".to_string(),
            ));
        }
        Ok(Self { max_attempts })
    }

    /// The configured retry bound
    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            // production contention never approaches this; only a logic
            // bug or a debug-mode artificial stall would.
            max_attempts: 1_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_config_defaults_match_parameter_table() {
        let cfg = HeightConfig::default();
        assert_eq!(cfg.max_height(), 32);
        assert_eq!(cfg.p(), 0.5);
    }

    #[test]
    fn height_config_rejects_out_of_range() {
        assert!(HeightConfig::new(0, 0.5).is_err());
        assert!(HeightConfig::new(65, 0.5).is_err());
        assert!(HeightConfig::new(32, 0.0).is_err());
        assert!(HeightConfig::new(32, 1.0).is_err());
        assert!(HeightConfig::new(32, 0.5).is_ok());
    }

    #[test]
    fn rebuild_config_disable_semantics() {
        assert!(!RebuildConfig::new(0, 0).is_enabled());
        assert!(!RebuildConfig::new(-5, 10).is_enabled());
        assert!(RebuildConfig::new(3, 0).is_enabled());
    }

    #[test]
    fn query_ring_config_rejects_zero() {
        assert!(QueryRingConfig::new(0).is_err());
        assert_eq!(QueryRingConfig::new(64).unwrap().size(), 64);
    }

    #[test]
    fn retry_policy_default_is_large() {
        assert!(RetryPolicy::default().max_attempts() >= 1_000);
    }
}

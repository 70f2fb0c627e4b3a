//! Error types shared by the skipset data structures
//!
//! This module defines the only recoverable error condition in the
//! library: a configuration value that falls outside the ranges named in
//! the parameter table (max height, rise probability, node capacity,
//! query ring size). Every other failure mode described for these
//! structures — a violated precondition, or a CAS retry loop exceeding
//! its debug threshold — is a logic bug or catastrophic contention, not
//! a recoverable outcome, and is reported via `panic!` at the point of
//! failure rather than threaded through every call as a `Result`.

use thiserror::Error;

/// The error type for skipset configuration and construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A configuration value was outside its documented range
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// A specialized Result type for skipset operations
pub type Result<T> = std::result::Result<T, Error>;

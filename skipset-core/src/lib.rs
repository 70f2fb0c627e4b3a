//! Core error and configuration types shared by the skipset structures
//!
//! This crate carries no data structure logic of its own. It provides:
//!
//! - A single recoverable [`Error`] and its [`Result`] alias
//! - The configuration structs accepted by every structure in the
//!   `skipset` crate: [`HeightConfig`], [`RebuildConfig`],
//!   [`QueryRingConfig`], [`RetryPolicy`]
//!
//! # Example
//!
//! ```
//! use skipset_core::HeightConfig;
//!
//! let cfg = HeightConfig::new(32, 0.5).unwrap();
//! assert_eq!(cfg.max_height(), 32);
//! ```

pub mod config;
pub mod error;

pub use config::{HeightConfig, QueryRingConfig, RebuildConfig, RetryPolicy};
pub use error::{Error, Result};

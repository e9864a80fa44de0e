//! Bookstore Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the bookstore data tooling.
//!
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//! - **Values**: tolerant parsing of loosely typed CSV cells
//!
//! # Example
//!
//! ```no_run
//! use bookstore_common::logging::{init_logging, LogConfig};
//! use bookstore_common::values::parse_float_or;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let price = parse_float_or(Some("19.99"), 0.0);
//!     tracing::info!(price = price.into_inner(), "parsed");
//!     Ok(())
//! }
//! ```

pub mod logging;
pub mod values;

pub use values::Parsed;

//! Bookstore Seeder Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads the packaged Tiki book dataset into the bookstore database.
//!
//! # Overview
//!
//! One run performs, in order:
//!
//! - **Readiness**: poll PostgreSQL until it accepts a connection
//! - **Archive**: download `book.zip` once, unpack it, locate the dataset root
//! - **Categories**: upsert `tiki_categories.csv` by category id
//! - **Catalog**: books, publishers, authors, links and one sale variant per
//!   row of `tiki_books_from_leaf.csv`
//! - **Images**: publish cover images to a shared directory or an S3 bucket
//!   and record them against the matching variant
//!
//! The seeder writes into an existing schema; it never creates tables.
//!
//! # Example
//!
//! ```no_run
//! use bookstore_seeder::{config::SeedConfig, pipeline::Seeder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let report = Seeder::new(SeedConfig::load()?).run().await?;
//!     println!("{:?}", report);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod seed;
pub mod storage;

pub use config::SeedConfig;
pub use error::{Result, SeedError};
pub use pipeline::{seed_dataset, SeedReport, Seeder};
pub use storage::{ImageStore, S3ImageStore, SharedDirStore};

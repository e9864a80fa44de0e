//! Loaders for the three dataset stages
//!
//! - [`categories`]: upsert of the flat category table
//! - [`catalog`]: books with their publishers, authors, categories and one
//!   sale variant each
//! - [`images`]: cover images published through an image store and recorded
//!   against the matching variant
//!
//! Loaders write through a caller-supplied connection and manage their own
//! transaction boundaries.

use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::error::Result;

pub mod catalog;
pub mod categories;
pub mod images;

pub use catalog::{import_catalog, BookRecord, CatalogState, CatalogStats, NameCache};
pub use categories::{import_categories, CategoryStats};
pub use images::{import_images, ImageStats};

/// Header lookup for a CSV file. Header names are trimmed.
#[derive(Debug, Clone, Default)]
pub struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().trim_start_matches('\u{feff}').to_string(), i))
            .collect();
        Self { index }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn row<'r>(&'r self, record: &'r StringRecord) -> Row<'r> {
        Row {
            columns: self,
            record,
        }
    }
}

/// One CSV record viewed through its header
#[derive(Debug, Clone, Copy)]
pub struct Row<'r> {
    columns: &'r Columns,
    record: &'r StringRecord,
}

impl<'r> Row<'r> {
    /// Raw cell text; `None` when the column is absent or the record is short
    pub fn get(&self, name: &str) -> Option<&'r str> {
        let i = *self.columns.index.get(name)?;
        self.record.get(i)
    }

    pub fn line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or(0)
    }
}

/// Open a CSV file with a header row; quoted multi-line cells are allowed
pub fn open_csv(path: &Path) -> Result<(csv::Reader<File>, Columns)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let columns = Columns::from_headers(reader.headers()?);
    Ok((reader, columns))
}

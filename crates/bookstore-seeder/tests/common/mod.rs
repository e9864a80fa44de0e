//! Shared fixtures for seeder integration tests
//!
//! Database tests run under `#[sqlx::test(migrations = "tests/migrations")]`,
//! which creates a fresh database per test with the catalog schema applied.
//! [`TestDataset`] lays out an unpacked dataset on disk the way the archive
//! does: two CSVs and an `images/{external_id}/` tree.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use sqlx::PgConnection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const BOOK_HEADER: &str = "id,title,author,publisher,publish_year,price,quantity,\
    quantity_sold,weight,isbn13,format,size,edition,description,category_id";

pub struct TestDataset {
    dir: TempDir,
}

impl TestDataset {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create dataset dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn categories_path(&self) -> PathBuf {
        self.root().join("tiki_categories.csv")
    }

    pub fn books_path(&self) -> PathBuf {
        self.root().join("tiki_books_from_leaf.csv")
    }

    pub fn images_root(&self) -> PathBuf {
        self.root().join("images")
    }

    /// Write the categories CSV from `(id, name)` lines
    pub fn write_categories(&self, rows: &[&str]) -> &Self {
        write_csv(&self.categories_path(), "id,name", rows);
        self
    }

    /// Write the books CSV with [`BOOK_HEADER`] columns
    pub fn write_books(&self, rows: &[&str]) -> &Self {
        self.write_books_with_header(BOOK_HEADER, rows)
    }

    pub fn write_books_with_header(&self, header: &str, rows: &[&str]) -> &Self {
        write_csv(&self.books_path(), header, rows);
        self
    }

    pub fn add_image(&self, external_id: &str, file_name: &str, data: &[u8]) -> PathBuf {
        let folder = self.images_root().join(external_id);
        std::fs::create_dir_all(&folder).unwrap();
        let path = folder.join(file_name);
        std::fs::write(&path, data).unwrap();
        path
    }
}

fn write_csv(path: &Path, header: &str, rows: &[&str]) {
    let mut content = String::from(header);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(path, content).unwrap();
}

/// A books CSV line with only the given columns filled
pub fn book_row(
    id: &str,
    title: &str,
    author: &str,
    publisher: &str,
    price: &str,
    category_id: &str,
) -> String {
    format!("{id},{title},{author},{publisher},,{price},1,0,,,,,,,{category_id}")
}

pub async fn count(conn: &mut PgConnection, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(conn)
        .await
        .unwrap()
}

// Category loader
//
// Category ids come from the dataset and are kept as primary keys, so a
// re-import updates names in place.

use bookstore_common::values::{non_null, parse_opt_int};
use sqlx::{Connection, PgConnection};
use std::path::Path;
use tracing::{info, instrument};

use super::{open_csv, Row};
use crate::error::{Result, SeedError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryStats {
    pub inserted: usize,
    pub updated: usize,
}

impl CategoryStats {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: Option<String>,
}

impl CategoryRecord {
    /// The id is mandatory; a row without one makes the file unusable.
    pub fn from_row(row: &Row<'_>, file: &str) -> Result<Self> {
        let id = parse_opt_int(row.get("id")).into_inner().ok_or_else(|| {
            SeedError::parse(
                file,
                row.line(),
                format!("category id {:?} is not an integer", row.get("id").unwrap_or("")),
            )
        })?;

        Ok(Self {
            id,
            name: non_null(row.get("name")).map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

pub async fn upsert_category(conn: &mut PgConnection, category: &CategoryRecord) -> Result<Upsert> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM category WHERE id = $1")
        .bind(category.id)
        .fetch_optional(&mut *conn)
        .await?;

    if exists.is_some() {
        sqlx::query("UPDATE category SET name = $1 WHERE id = $2")
            .bind(&category.name)
            .bind(category.id)
            .execute(&mut *conn)
            .await?;
        Ok(Upsert::Updated)
    } else {
        sqlx::query("INSERT INTO category (id, name) VALUES ($1, $2)")
            .bind(category.id)
            .bind(&category.name)
            .execute(&mut *conn)
            .await?;
        Ok(Upsert::Inserted)
    }
}

/// Upsert every category in `path` in one transaction
#[instrument(skip(conn))]
pub async fn import_categories(conn: &mut PgConnection, path: &Path) -> Result<CategoryStats> {
    let file = path.display().to_string();
    let (mut reader, columns) = open_csv(path)?;

    if !columns.contains("id") {
        return Err(SeedError::parse(&file, 1, "missing required column 'id'"));
    }

    let mut stats = CategoryStats::default();
    let mut tx = conn.begin().await?;

    for result in reader.records() {
        let record = result?;
        let category = CategoryRecord::from_row(&columns.row(&record), &file)?;

        match upsert_category(&mut *tx, &category).await? {
            Upsert::Inserted => stats.inserted += 1,
            Upsert::Updated => stats.updated += 1,
        }
    }

    tx.commit().await?;

    info!(
        inserted = stats.inserted,
        updated = stats.updated,
        "Categories imported"
    );

    Ok(stats)
}

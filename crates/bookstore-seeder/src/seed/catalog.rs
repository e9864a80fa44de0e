//! Catalog loader
//!
//! Each row of the books CSV becomes one `book` and one `book_variants` row.
//! Publishers and authors are dimension rows looked up by exact (trimmed)
//! name, memoized in a [`CatalogState`] that the caller owns, so a second
//! import against the same database reuses existing rows instead of
//! duplicating them.
//!
//! Rows are committed in batches; a failing row rolls back only the
//! uncommitted batch, earlier batches stay.

use bookstore_common::values::{
    non_blank, non_null, parse_float_or, parse_int_or, parse_opt_float, parse_opt_int, Parsed,
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use super::{open_csv, Row};
use crate::error::Result;

pub const UNTITLED: &str = "Untitled";
pub const VARIANT_STATUS_AVAILABLE: &str = "AVAILABLE";

/// Name → id memo for one dimension table
#[derive(Debug, Clone, Default)]
pub struct NameCache {
    ids: HashMap<String, i64>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.ids.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, id: i64) {
        self.ids.insert(name.into(), id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// State carried through one catalog import
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    pub publishers: NameCache,
    pub authors: NameCache,
    /// External row id → resolved title, consumed by the image stage
    pub titles: HashMap<String, String>,
}

impl CatalogState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub books: usize,
    pub variants: usize,
    pub author_links: usize,
    pub category_links: usize,
    /// Rows whose category id was present but unusable
    pub skipped_category_links: usize,
    /// Numeric cells that held text but fell back to their default
    pub malformed_fields: usize,
}

/// One source row, parsed and normalized
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub external_id: String,
    pub title: String,
    pub publisher: Option<String>,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub publish_year: Parsed<Option<i64>>,
    pub price: Parsed<f64>,
    pub quantity: Parsed<i64>,
    pub sold: Parsed<i64>,
    pub weight: Parsed<Option<f64>>,
    pub isbn: Option<String>,
    pub format: Option<String>,
    pub size: Option<String>,
    pub edition: Option<String>,
    /// `None` when the column is absent or empty
    pub category_id: Option<Parsed<Option<i64>>>,
    /// Numeric cells that held text but could not be parsed
    pub malformed_fields: usize,
}

impl BookRecord {
    pub fn from_row(row: &Row<'_>) -> Self {
        let text = |name: &str| non_null(row.get(name)).map(str::to_string);

        let title = non_null(row.get("title"))
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(UNTITLED)
            .to_string();

        let category_id = non_null(row.get("category_id")).map(|raw| parse_opt_int(Some(raw)));

        let publish_year = parse_opt_int(row.get("publish_year"));
        let price = parse_float_or(row.get("price"), 0.0);
        let quantity = parse_int_or(row.get("quantity"), 0);
        let sold = parse_int_or(row.get("quantity_sold"), 0);
        let weight = parse_opt_float(row.get("weight"));

        let malformed_fields = [
            ("publish_year", publish_year.is_defaulted()),
            ("price", price.is_defaulted()),
            ("quantity", quantity.is_defaulted()),
            ("quantity_sold", sold.is_defaulted()),
            ("weight", weight.is_defaulted()),
        ]
        .into_iter()
        .filter(|(name, defaulted)| *defaulted && non_null(row.get(name)).is_some())
        .count();

        Self {
            external_id: row.get("id").map(str::trim).unwrap_or_default().to_string(),
            title,
            publisher: non_blank(row.get("publisher")).map(str::to_string),
            authors: split_authors(non_null(row.get("author"))),
            description: text("description"),
            publish_year,
            price,
            quantity,
            sold,
            weight,
            isbn: text("isbn13"),
            format: text("format"),
            size: text("size"),
            edition: text("edition"),
            category_id,
            malformed_fields,
        }
    }
}

/// Comma-separated author list: trimmed, blanks dropped, first occurrence wins
pub fn split_authors(raw: Option<&str>) -> Vec<String> {
    let mut authors: Vec<String> = Vec::new();
    for name in raw.unwrap_or_default().split(',').map(str::trim) {
        if !name.is_empty() && !authors.iter().any(|a| a == name) {
            authors.push(name.to_string());
        }
    }
    authors
}

#[derive(Debug, Clone, Copy)]
enum Dimension {
    Publisher,
    Author,
}

impl Dimension {
    fn select_sql(self) -> &'static str {
        match self {
            Dimension::Publisher => "SELECT id FROM publisher WHERE name = $1",
            Dimension::Author => "SELECT id FROM author WHERE name = $1",
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            Dimension::Publisher => "INSERT INTO publisher (name) VALUES ($1) RETURNING id",
            Dimension::Author => "INSERT INTO author (name) VALUES ($1) RETURNING id",
        }
    }
}

async fn resolve_dimension(
    conn: &mut PgConnection,
    cache: &mut NameCache,
    dimension: Dimension,
    name: &str,
) -> Result<i64> {
    let name = name.trim();
    if let Some(id) = cache.get(name) {
        return Ok(id);
    }

    let existing: Option<i64> = sqlx::query_scalar(dimension.select_sql())
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    let id = match existing {
        Some(id) => id,
        None => {
            let id: i64 = sqlx::query_scalar(dimension.insert_sql())
                .bind(name)
                .fetch_one(&mut *conn)
                .await?;
            debug!(?dimension, name, id, "Inserted dimension row");
            id
        }
    };

    cache.insert(name, id);
    Ok(id)
}

/// Id of the publisher named `name`, inserting it on first sight
pub async fn resolve_publisher(
    conn: &mut PgConnection,
    cache: &mut NameCache,
    name: &str,
) -> Result<i64> {
    resolve_dimension(conn, cache, Dimension::Publisher, name).await
}

/// Id of the author named `name`, inserting it on first sight
pub async fn resolve_author(
    conn: &mut PgConnection,
    cache: &mut NameCache,
    name: &str,
) -> Result<i64> {
    resolve_dimension(conn, cache, Dimension::Author, name).await
}

/// Link a book to an author unless the link exists. Returns whether a row was inserted.
pub async fn link_book_author(
    conn: &mut PgConnection,
    book_id: i64,
    author_id: i64,
) -> Result<bool> {
    let exists: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM book_author WHERE book_id = $1 AND author_id = $2")
            .bind(book_id)
            .bind(author_id)
            .fetch_optional(&mut *conn)
            .await?;

    if exists.is_some() {
        return Ok(false);
    }

    sqlx::query("INSERT INTO book_author (book_id, author_id) VALUES ($1, $2)")
        .bind(book_id)
        .bind(author_id)
        .execute(&mut *conn)
        .await?;

    Ok(true)
}

/// Link a book to a category unless the link exists. Returns whether a row was inserted.
pub async fn link_book_category(
    conn: &mut PgConnection,
    book_id: i64,
    category_id: i64,
) -> Result<bool> {
    let exists: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM book_category WHERE book_id = $1 AND category_id = $2",
    )
    .bind(book_id)
    .bind(category_id)
    .fetch_optional(&mut *conn)
    .await?;

    if exists.is_some() {
        return Ok(false);
    }

    sqlx::query("INSERT INTO book_category (book_id, category_id) VALUES ($1, $2)")
        .bind(book_id)
        .bind(category_id)
        .execute(&mut *conn)
        .await?;

    Ok(true)
}

/// Ids created for one stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredBook {
    pub book_id: i64,
    pub variant_id: i64,
    pub author_links: usize,
    pub category_linked: bool,
}

/// Insert one book with its variant and links
pub async fn store_book(
    conn: &mut PgConnection,
    state: &mut CatalogState,
    book: &BookRecord,
    now: DateTime<Utc>,
) -> Result<StoredBook> {
    if !book.external_id.is_empty() {
        state.titles.insert(book.external_id.clone(), book.title.clone());
    }

    let publisher_id = match &book.publisher {
        Some(name) => Some(resolve_publisher(conn, &mut state.publishers, name).await?),
        None => None,
    };

    let publish_year = book
        .publish_year
        .into_inner()
        .and_then(|y| i32::try_from(y).ok());

    let book_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO book
            (title, publisher_id, publisher_year, description, published_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        RETURNING id
        "#,
    )
    .bind(&book.title)
    .bind(publisher_id)
    .bind(publish_year)
    .bind(&book.description)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    let mut author_links = 0;
    for name in &book.authors {
        let author_id = resolve_author(conn, &mut state.authors, name).await?;
        if link_book_author(conn, book_id, author_id).await? {
            author_links += 1;
        }
    }

    let variant_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO book_variants
            (book_id, price, quantity, sold, status, isbn, format, size, weight, edition)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(book_id)
    .bind(book.price.into_inner())
    .bind(clamp_i32(book.quantity.into_inner()))
    .bind(clamp_i32(book.sold.into_inner()))
    .bind(VARIANT_STATUS_AVAILABLE)
    .bind(&book.isbn)
    .bind(&book.format)
    .bind(&book.size)
    .bind(book.weight.into_inner())
    .bind(&book.edition)
    .fetch_one(&mut *conn)
    .await?;

    let category_linked = match book.category_id.map(Parsed::into_inner) {
        Some(Some(category_id)) => try_link_category(conn, book_id, category_id).await?,
        _ => false,
    };

    Ok(StoredBook {
        book_id,
        variant_id,
        author_links,
        category_linked,
    })
}

/// Category links are best effort: a failure (typically an unknown
/// category id) is rolled back to a savepoint and the book is kept.
async fn try_link_category(
    conn: &mut PgConnection,
    book_id: i64,
    category_id: i64,
) -> Result<bool> {
    let mut savepoint = conn.begin().await?;

    match link_book_category(&mut *savepoint, book_id, category_id).await {
        Ok(linked) => {
            savepoint.commit().await?;
            Ok(linked)
        }
        Err(e) => {
            savepoint.rollback().await?;
            warn!(book_id, category_id, error = %e, "Skipping category link");
            Ok(false)
        }
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Import every row of the books CSV at `path`, committing every `batch_size` rows
#[instrument(skip(conn, state))]
pub async fn import_catalog(
    conn: &mut PgConnection,
    path: &Path,
    state: &mut CatalogState,
    batch_size: usize,
) -> Result<CatalogStats> {
    let batch_size = batch_size.max(1);
    let (mut reader, columns) = open_csv(path)?;
    let now = Utc::now();

    let mut stats = CatalogStats::default();
    let mut tx = conn.begin().await?;

    for result in reader.records() {
        let record = result?;
        let row = columns.row(&record);
        let book = BookRecord::from_row(&row);

        let stored = match store_book(&mut *tx, state, &book, now).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    line = row.line(),
                    committed = stats.books - stats.books % batch_size,
                    "Catalog import failed, rolling back current batch"
                );
                tx.rollback().await?;
                return Err(e);
            }
        };

        stats.books += 1;
        stats.variants += 1;
        stats.author_links += stored.author_links;
        stats.malformed_fields += book.malformed_fields;
        if stored.category_linked {
            stats.category_links += 1;
        } else if matches!(book.category_id, Some(Parsed::Defaulted(_))) {
            stats.skipped_category_links += 1;
        }

        if stats.books % batch_size == 0 {
            tx.commit().await?;
            info!("Imported {} books...", stats.books);
            tx = conn.begin().await?;
        }
    }

    tx.commit().await?;

    info!(
        books = stats.books,
        publishers = state.publishers.len(),
        authors = state.authors.len(),
        category_links = stats.category_links,
        malformed_fields = stats.malformed_fields,
        "Catalog import complete"
    );

    Ok(stats)
}

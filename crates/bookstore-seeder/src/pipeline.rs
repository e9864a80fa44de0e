//! Seeding pipeline
//!
//! Runs the stages in order over a single database connection:
//!
//! 1. wait for the database to accept connections
//! 2. fetch and unpack the dataset archive
//! 3. categories, then catalog, then images
//!
//! A stage whose input is missing from the dataset is skipped. Any other
//! failure ends the run; batches that were already committed stay.

use sqlx::{Connection, PgConnection};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::archive::ArchiveFetcher;
use crate::config::{
    SeedConfig, BOOKS_FILE, CATALOG_BATCH_SIZE, CATEGORIES_FILE, IMAGES_DIR,
    READINESS_POLL_INTERVAL,
};
use crate::db;
use crate::error::Result;
use crate::seed::{
    import_catalog, import_categories, import_images, CatalogState, CatalogStats, CategoryStats,
    ImageStats,
};
use crate::storage::{build_store, ImageStore};

/// Counters for one run. `None` means the stage was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: Option<CategoryStats>,
    pub catalog: Option<CatalogStats>,
    pub images: Option<ImageStats>,
}

pub struct Seeder {
    config: SeedConfig,
}

impl Seeder {
    pub fn new(config: SeedConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<SeedReport> {
        let started = Instant::now();

        db::wait_for_database(&self.config.database, READINESS_POLL_INTERVAL).await?;

        let fetcher = ArchiveFetcher::new(self.config.dataset.clone())?;
        let dataset_root = fetcher.fetch().await?;

        let store = build_store(&self.config.storage);
        if let Some(store) = &store {
            info!(backend = store.backend(), "Image store ready");
        }

        let mut conn = db::connect(&self.config.database).await?;
        let result = seed_dataset(&mut conn, &dataset_root, store.as_deref()).await;

        if let Err(e) = conn.close().await {
            warn!("Failed to close database connection: {}", e);
        }

        let report = result?;
        info!(
            elapsed_secs = started.elapsed().as_secs(),
            categories = report.categories.as_ref().map(CategoryStats::total).unwrap_or(0),
            books = report.catalog.as_ref().map(|c| c.books).unwrap_or(0),
            image_rows = report.images.as_ref().map(|i| i.rows_inserted).unwrap_or(0),
            skipped_images = report.images.as_ref().map(|i| i.skipped_files).unwrap_or(0),
            "Seeding complete"
        );

        Ok(report)
    }
}

/// Load an unpacked dataset through `conn`. `store` of `None` skips images.
pub async fn seed_dataset(
    conn: &mut PgConnection,
    dataset_root: &Path,
    store: Option<&dyn ImageStore>,
) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    let categories_path = dataset_root.join(CATEGORIES_FILE);
    if categories_path.is_file() {
        info!("Importing categories from {}", categories_path.display());
        report.categories = Some(import_categories(conn, &categories_path).await?);
    } else {
        warn!("{} not found, skipping categories", categories_path.display());
    }

    let books_path = dataset_root.join(BOOKS_FILE);
    let mut state = CatalogState::new();
    if books_path.is_file() {
        info!("Importing books from {}", books_path.display());
        let stats = import_catalog(conn, &books_path, &mut state, CATALOG_BATCH_SIZE).await?;
        report.catalog = Some(stats);
    } else {
        error!("{} not found, skipping books", books_path.display());
    }

    match store {
        Some(store) => {
            let images_root = dataset_root.join(IMAGES_DIR);
            report.images = Some(import_images(conn, &images_root, &state.titles, store).await?);
        }
        None => warn!("No image store configured, skipping images"),
    }

    Ok(report)
}

// Image loader
//
// Walks `images/{external_id}/` folders, finds the variant of the book the
// catalog stage imported under that id, publishes every image file through
// the configured store and records the returned reference.
//
// Books are matched by exact title, so two books sharing a title resolve to
// the most recently created variant.

use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::storage::{is_image_file, publish_image, ImageStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageStats {
    pub folders_seen: usize,
    /// Folders whose id mapped to an imported book with a variant
    pub folders_matched: usize,
    pub published: usize,
    pub rows_inserted: usize,
    /// Files whose publish failed
    pub skipped_files: usize,
}

/// Most recently created variant of a book with exactly this title
pub async fn find_variant_by_title(conn: &mut PgConnection, title: &str) -> Result<Option<i64>> {
    let variant_id = sqlx::query_scalar(
        r#"
        SELECT bv.id
        FROM book_variants bv
        JOIN book b ON b.id = bv.book_id
        WHERE b.title = $1
        ORDER BY bv.id DESC
        LIMIT 1
        "#,
    )
    .bind(title)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(variant_id)
}

/// Insert an image row unless the variant already references `image_url`.
/// Returns whether a row was inserted.
pub async fn record_image(
    conn: &mut PgConnection,
    variant_id: i64,
    image_url: &str,
) -> Result<bool> {
    let exists: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM book_images WHERE book_variant_id = $1 AND image_url = $2",
    )
    .bind(variant_id)
    .bind(image_url)
    .fetch_optional(&mut *conn)
    .await?;

    if exists.is_some() {
        return Ok(false);
    }

    sqlx::query("INSERT INTO book_images (book_variant_id, image_url) VALUES ($1, $2)")
        .bind(variant_id)
        .bind(image_url)
        .execute(&mut *conn)
        .await?;

    Ok(true)
}

async fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Publish and record every image under `images_root`. A missing root is
/// not an error; the stage reports zero work.
#[instrument(skip(conn, titles, store), fields(backend = store.backend()))]
pub async fn import_images(
    conn: &mut PgConnection,
    images_root: &Path,
    titles: &HashMap<String, String>,
    store: &dyn ImageStore,
) -> Result<ImageStats> {
    let mut stats = ImageStats::default();

    if !tokio::fs::try_exists(images_root).await? {
        info!("No images directory at {}, skipping", images_root.display());
        return Ok(stats);
    }

    for folder in sorted_entries(images_root).await? {
        if !folder.is_dir() {
            continue;
        }
        stats.folders_seen += 1;

        let Some(folder_name) = folder.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let external_id = folder_name.trim();
        let Some(title) = titles.get(external_id) else {
            continue;
        };
        let Some(variant_id) = find_variant_by_title(conn, title).await? else {
            debug!(external_id, title = title.as_str(), "No variant for image folder");
            continue;
        };
        stats.folders_matched += 1;

        let mut tx = conn.begin().await?;

        for file in sorted_entries(&folder).await? {
            if !file.is_file() || !is_image_file(&file) {
                continue;
            }
            let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let key = store.object_key(external_id, file_name);
            let reference = match publish_image(store, &key, &file).await {
                Ok(reference) => reference,
                Err(e) => {
                    warn!(key = key.as_str(), "Failed to publish image: {:#}", e);
                    stats.skipped_files += 1;
                    continue;
                }
            };
            stats.published += 1;

            if record_image(&mut *tx, variant_id, &reference).await? {
                stats.rows_inserted += 1;
            }
        }

        tx.commit().await?;

        if stats.folders_matched % 100 == 0 {
            info!("Processed images for {} books...", stats.folders_matched);
        }
    }

    info!(
        folders = stats.folders_seen,
        matched = stats.folders_matched,
        published = stats.published,
        rows = stats.rows_inserted,
        skipped = stats.skipped_files,
        "Image import complete"
    );

    Ok(stats)
}

//! Bookstore Seeder - Main entry point

use anyhow::Result;
use bookstore_common::logging::{init_logging, LogConfig};
use tracing::{error, info};

use bookstore_seeder::{config::SeedConfig, pipeline::Seeder};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("bookstore-seeder")
        .filter_directives("bookstore_seeder=info,sqlx=warn,aws_smithy_runtime=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    info!("Starting bookstore seeder");

    let config = SeedConfig::load()?;
    info!(
        database = %config.database.target(),
        image_store = ?config.storage.kind,
        "Configuration loaded"
    );

    if let Err(e) = Seeder::new(config).run().await {
        error!("Seeding failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}

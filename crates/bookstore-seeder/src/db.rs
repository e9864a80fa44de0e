//! Database connection and readiness

use sqlx::postgres::PgConnection;
use sqlx::Connection;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Block until the database accepts a connection, probing every `interval`.
///
/// Retries forever; there is no attempt limit.
pub async fn wait_for_database(config: &DatabaseConfig, interval: Duration) -> Result<()> {
    let options = config.connect_options()?;
    let mut attempt: u64 = 0;

    info!(target_db = %config.target(), "Waiting for database");

    loop {
        attempt += 1;
        match PgConnection::connect_with(&options).await {
            Ok(conn) => {
                conn.close().await?;
                info!(attempts = attempt, "Database is ready");
                return Ok(());
            }
            Err(e) => {
                debug!(attempt, error = %e, "Database not ready yet");
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// Open the single connection used for the whole run
pub async fn connect(config: &DatabaseConfig) -> Result<PgConnection> {
    let options = config.connect_options()?;
    let conn = PgConnection::connect_with(&options).await?;
    info!(target_db = %config.target(), "Connected to database");
    Ok(conn)
}

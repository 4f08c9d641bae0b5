//! Per-concern query modules. Every function here takes a `&mut SqliteConnection` so callers can compose them
//! inside a transaction by passing `&mut *tx`.
pub mod drafts;
pub mod orders;
pub mod parties;
pub mod payments;
pub mod riders;
pub mod settlements;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new().max_connections(max_connections).connect(url).await
}

// File: crushgames-core/src/test_utils/helpers.rs

use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::db::Database;
use crate::Error;

/// Connection URL for the test database. Tests that need Postgres skip
/// themselves when this is unset, so the default suite runs anywhere.
pub fn test_database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

/// Create a connection pool to the test DB named by `TEST_DATABASE_URL`.
pub async fn create_test_db_pool() -> Result<Pool<Postgres>, Error> {
    let url = test_database_url()
        .ok_or_else(|| Error::Config("TEST_DATABASE_URL is not set".to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    Ok(pool)
}

/// Wipes out test data so each test can start fresh.
pub async fn clean_database(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            rounds,
            game_state,
            history_events,
            timing_winners
        "#,
    )
        .execute(pool)
        .await?;
    Ok(())
}

/// Fresh, migrated, truncated database handle for one test.
pub async fn setup_test_database() -> Result<Database, Error> {
    let pool = create_test_db_pool().await?;
    let db = Database::from_pool(pool);
    db.migrate().await?;
    clean_database(db.pool()).await?;
    Ok(db)
}

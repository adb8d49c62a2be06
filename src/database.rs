use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{config::Config, error::AppError};

pub type Database = Pool<Postgres>;

pub async fn create_database_pool(config: &Config) -> Result<Database, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    log::info!("Connected to database successfully");
    Ok(pool)
}

pub async fn run_migrations(db: &Database) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(db).await?;
    log::info!("Database schema is up to date");
    Ok(())
}

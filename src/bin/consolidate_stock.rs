//! Merges duplicate `(warehouse, product)` stock rows into one row each.

use std::process::ExitCode;

use stockmaster::{
    database::create_database_pool,
    services::consolidation,
    AppError, Config,
};

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let db = create_database_pool(&config).await?;

    let report = consolidation::consolidate(&db).await?;
    if report.groups_merged == 0 {
        log::info!("No duplicate stock entries in {} rows", report.rows_scanned);
    }

    db.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Stock consolidation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

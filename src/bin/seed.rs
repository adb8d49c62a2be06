//! Wipes the database and fills it with a fake but consistent dataset.

use std::process::ExitCode;

use rand::{rngs::StdRng, SeedableRng};
use stockmaster::{
    database::{create_database_pool, run_migrations},
    services::seed,
    AppError, Config,
};

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let db = create_database_pool(&config).await?;
    run_migrations(&db).await?;

    let mut rng = match config.seed_rng {
        Some(value) => {
            log::info!("Seeding with SEED_RNG={}", value);
            StdRng::seed_from_u64(value)
        }
        None => StdRng::from_entropy(),
    };

    let summary = seed::run(&db, &mut rng).await?;
    log::info!(
        "Seed complete: {} users, {} locations, {} warehouses, {} products, {} sub-locations, {} stock rows",
        summary.users,
        summary.locations,
        summary.warehouses,
        summary.products,
        summary.sub_locations,
        summary.stock_rows
    );
    log::info!(
        "Sign in as {} with password {:?}",
        seed::MANAGER_EMAIL,
        seed::DEFAULT_PASSWORD
    );

    db.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Seeding failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

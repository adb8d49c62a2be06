use std::process::ExitCode;

use stockmaster::{
    create_router,
    database::{create_database_pool, run_migrations},
    AppError, AppState, Config,
};

async fn serve() -> Result<(), AppError> {
    let config = Config::from_env()?;
    // Refuse to start without a signing secret
    config.jwt_secret()?;

    let db = create_database_pool(&config).await?;
    run_migrations(&db).await?;

    let addr = config.bind_address();
    let app = create_router(AppState::new(db, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    log::info!("StockMaster server listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("Server error: {}", e)))
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

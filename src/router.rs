use axum::{
    response::Redirect,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Public routes (no authentication required)
        .route("/", get(|| async { Redirect::permanent("/login") }))
        .route("/login", get(handlers::auth::login_page).post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))

        // Protected routes (authentication required)
        .route("/dashboard", get(handlers::dashboard))

        // Products and warehouses
        .route("/products", get(handlers::products::products_list).post(handlers::products::create_product))
        .route("/products/new", get(handlers::products::product_form))
        .route("/warehouses", get(handlers::warehouses::warehouses_list))

        // Receipts and deliveries
        .route("/operations/receipts", get(handlers::operations::receipts_list).post(handlers::operations::create_receipt))
        .route("/operations/receipts/new", get(handlers::operations::receipt_form))
        .route("/operations/deliveries", get(handlers::operations::deliveries_list).post(handlers::operations::create_delivery))
        .route("/operations/deliveries/new", get(handlers::operations::delivery_form))
        .route("/operations/:id", get(handlers::operations::operation_detail))
        .route("/operations/:id/advance", post(handlers::operations::advance_operation))

        // API routes
        .route("/api/products", get(handlers::api::list_products))
        .route("/api/products/:id/stock", get(handlers::api::product_stock))
        .route("/api/warehouses", get(handlers::api::list_warehouses))
        .route("/api/warehouses/:id/sub-locations", get(handlers::api::warehouse_sub_locations))
        .route("/api/locations", get(handlers::api::list_locations))
        .route("/api/transactions", get(handlers::api::list_transactions).post(handlers::api::create_transaction))
        .route("/api/transactions/:id", get(handlers::api::get_transaction))
        .route("/api/transactions/:id/items", get(handlers::api::transaction_items))
        .route("/api/transactions/:id/ledger", get(handlers::api::transaction_ledger))
        .route("/api/transactions/:id/advance", post(handlers::api::advance_transaction))
        .route("/api/transactions/:id/status", post(handlers::api::set_transaction_status))

        // Static files
        .nest_service("/static", ServeDir::new("static"))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
        )
        .with_state(state)
}

pub mod api;
pub mod auth;
pub mod operations;
pub mod products;
pub mod warehouses;

use axum::{extract::State, http::StatusCode, response::Html};
use askama::Template;
use tower_cookies::Cookies;

use crate::{
    middleware::{get_current_user, CurrentUser},
    models::ProductStockLine,
    state::AppState,
};

pub(crate) fn render<T: Template>(template: &T) -> Result<Html<String>, StatusCode> {
    template.render().map(Html).map_err(|e| {
        log::error!("Failed to render template: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

pub(crate) fn server_error(context: &str, err: impl std::fmt::Display) -> StatusCode {
    log::error!("{}: {}", context, err);
    StatusCode::INTERNAL_SERVER_ERROR
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate<'a> {
    current_user: &'a CurrentUser,
    product_count: i64,
    warehouse_count: i64,
    pending_receipts: i64,
    pending_deliveries: i64,
    low_stock: Vec<ProductStockLine>,
}

pub async fn dashboard(
    cookies: Cookies,
    State(state): State<AppState>,
) -> Result<Html<String>, StatusCode> {
    let current_user = get_current_user(&cookies, &state).await
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let db = &state.db;

    let product_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM products WHERE is_active = true"
    )
    .fetch_one(db)
    .await
    .unwrap_or(0);

    let warehouse_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM warehouses")
        .fetch_one(db)
        .await
        .unwrap_or(0);

    let pending = |kind: &'static str| {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transactions WHERE kind = $1 AND status <> 'DONE'"
        )
        .bind(kind)
        .fetch_one(db)
    };
    let pending_receipts = pending("IN").await.unwrap_or(0);
    let pending_deliveries = pending("OUT").await.unwrap_or(0);

    let low_stock = products::product_stock_lines(db)
        .await
        .map_err(|e| server_error("Failed to load stock levels", e))?
        .into_iter()
        .filter(ProductStockLine::is_below_minimum)
        .collect();

    let template = DashboardTemplate {
        current_user: &current_user,
        product_count,
        warehouse_count,
        pending_receipts,
        pending_deliveries,
        low_stock,
    };

    render(&template)
}

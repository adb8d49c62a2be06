//! JSON endpoints. They authenticate with the same cookie as the HTML pages
//! and answer failures with `AppError`'s `{ "message": ... }` body.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::{get_current_user, CurrentUser},
    models::{
        LedgerEntry, Location, NewTransaction, Product, SubLocation, Transaction,
        TransactionItem, TransactionStatus, TransactionType, Warehouse, WarehouseStock,
    },
    services::{stock, transactions},
    state::AppState,
};

async fn require_user(cookies: &Cookies, state: &AppState) -> Result<CurrentUser, AppError> {
    get_current_user(cookies, state).await.ok_or(AppError::Unauthorized)
}

#[derive(Deserialize)]
pub struct TransactionFilter {
    #[serde(rename = "type")]
    kind: Option<TransactionType>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    status: TransactionStatus,
}

pub async fn list_products(
    cookies: Cookies,
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    require_user(&cookies, &state).await?;

    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE is_active = true ORDER BY name"
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(products))
}

pub async fn product_stock(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<WarehouseStock>>, AppError> {
    require_user(&cookies, &state).await?;

    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
        .bind(product_id)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Product"));
    }

    Ok(Json(stock::product_stock(&state.db, product_id).await?))
}

pub async fn list_warehouses(
    cookies: Cookies,
    State(state): State<AppState>,
) -> Result<Json<Vec<Warehouse>>, AppError> {
    require_user(&cookies, &state).await?;

    let warehouses = sqlx::query_as::<_, Warehouse>("SELECT * FROM warehouses ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(warehouses))
}

pub async fn list_locations(
    cookies: Cookies,
    State(state): State<AppState>,
) -> Result<Json<Vec<Location>>, AppError> {
    require_user(&cookies, &state).await?;

    let locations = sqlx::query_as::<_, Location>("SELECT * FROM locations ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(locations))
}

pub async fn warehouse_sub_locations(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> Result<Json<Vec<SubLocation>>, AppError> {
    require_user(&cookies, &state).await?;

    let sub_locations = sqlx::query_as::<_, SubLocation>(
        "SELECT * FROM sub_locations WHERE warehouse_id = $1 ORDER BY name"
    )
    .bind(warehouse_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(sub_locations))
}

pub async fn list_transactions(
    cookies: Cookies,
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    require_user(&cookies, &state).await?;
    Ok(Json(transactions::list(&state.db, filter.kind).await?))
}

pub async fn get_transaction(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    require_user(&cookies, &state).await?;
    Ok(Json(transactions::find(&state.db, id).await?))
}

pub async fn transaction_items(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TransactionItem>>, AppError> {
    require_user(&cookies, &state).await?;
    transactions::find(&state.db, id).await?;

    let items = sqlx::query_as::<_, TransactionItem>(
        "SELECT * FROM transaction_items WHERE transaction_id = $1"
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(items))
}

/// Ledger rows written when the transaction was validated; empty before that.
pub async fn transaction_ledger(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    require_user(&cookies, &state).await?;
    transactions::find(&state.db, id).await?;

    let entries = sqlx::query_as::<_, LedgerEntry>(
        "SELECT * FROM ledger WHERE transaction_id = $1 ORDER BY created_at"
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(entries))
}

pub async fn create_transaction(
    cookies: Cookies,
    State(state): State<AppState>,
    Json(new): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let user = require_user(&cookies, &state).await?;

    let transaction = transactions::create(&state.db, new, Some(user.id)).await?;
    log::info!("{} created {}", user.email, transaction.reference);

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn advance_transaction(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    let user = require_user(&cookies, &state).await?;
    Ok(Json(transactions::transition(&state.db, id, None, user.role).await?))
}

/// Explicit target status; still limited to the next step of the workflow.
pub async fn set_transaction_status(
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Transaction>, AppError> {
    let user = require_user(&cookies, &state).await?;
    Ok(Json(
        transactions::transition(&state.db, id, Some(update.status), user.role).await?,
    ))
}

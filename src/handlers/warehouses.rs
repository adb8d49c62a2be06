use axum::{extract::State, http::StatusCode, response::Html};
use askama::Template;
use tower_cookies::Cookies;

use crate::{
    handlers::{render, server_error},
    middleware::{get_current_user, CurrentUser},
    models::WarehouseOverview,
    state::AppState,
};

#[derive(Template)]
#[template(path = "warehouses/list.html")]
struct WarehousesTemplate<'a> {
    warehouses: Vec<WarehouseOverview>,
    current_user: &'a CurrentUser,
}

pub async fn warehouses_list(
    cookies: Cookies,
    State(state): State<AppState>,
) -> Result<Html<String>, StatusCode> {
    let current_user = get_current_user(&cookies, &state).await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let warehouses = sqlx::query_as::<_, WarehouseOverview>(
        r#"
        SELECT
            w.id,
            w.name,
            w.shortcode,
            w.kind,
            l.name AS location_name,
            w.capacity,
            COALESCE(
                (SELECT STRING_AGG(sl.name, ', ' ORDER BY sl.name)
                 FROM sub_locations sl WHERE sl.warehouse_id = w.id),
                ''
            ) AS sub_locations,
            COALESCE(
                (SELECT SUM(s.quantity) FROM stock s WHERE s.warehouse_id = w.id),
                0
            )::BIGINT AS units_on_hand
        FROM warehouses w
        JOIN locations l ON l.id = w.location_id
        ORDER BY w.name
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| server_error("Failed to load warehouses", e))?;

    render(&WarehousesTemplate { warehouses, current_user: &current_user })
}

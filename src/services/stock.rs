use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{NewTransactionItem, WarehouseStock},
};

/// Availability of a requested quantity at a warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StockStatus {
    None,
    Insufficient { available: i64 },
    Ok { available: i64 },
}

impl StockStatus {
    pub fn evaluate(available: i64, requested: i64) -> Self {
        if available <= 0 {
            StockStatus::None
        } else if available < requested {
            StockStatus::Insufficient { available }
        } else {
            StockStatus::Ok { available }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StockStatus::Ok { .. })
    }

    pub fn message(&self) -> String {
        match self {
            StockStatus::None => "Not in stock".to_string(),
            StockStatus::Insufficient { available } => format!("Only {} available", available),
            StockStatus::Ok { available } => format!("{} in stock", available),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCheck {
    pub product_id: Uuid,
    pub requested: i64,
    pub status: StockStatus,
}

/// Checks every line against `levels` (available units per product). Lines
/// naming the same product are checked against their combined quantity.
pub fn check_lines(items: &[NewTransactionItem], levels: &HashMap<Uuid, i64>) -> Vec<LineCheck> {
    let mut demand: HashMap<Uuid, i64> = HashMap::new();
    for item in items {
        *demand.entry(item.product_id).or_default() += i64::from(item.quantity);
    }

    items
        .iter()
        .map(|item| {
            let requested = demand[&item.product_id];
            let available = levels.get(&item.product_id).copied().unwrap_or(0);
            LineCheck {
                product_id: item.product_id,
                requested,
                status: StockStatus::evaluate(available, requested),
            }
        })
        .collect()
}

/// First line that cannot be served, as the error shown to the user.
pub fn shortage_error(checks: &[LineCheck]) -> Option<AppError> {
    checks.iter().find(|c| !c.status.is_ok()).map(|c| {
        AppError::InsufficientStock(format!(
            "Cannot create delivery: {} for selected product",
            c.status.message()
        ))
    })
}

/// Units of each product on hand at `warehouse_id`, summed over all of its stock rows.
pub async fn available_in_warehouse<'e, E>(
    executor: E,
    warehouse_id: Uuid,
    product_ids: &[Uuid],
) -> Result<HashMap<Uuid, i64>, AppError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, (Uuid, i64)>(
        r#"
        SELECT product_id, COALESCE(SUM(quantity), 0)::BIGINT
        FROM stock
        WHERE warehouse_id = $1 AND product_id = ANY($2)
        GROUP BY product_id
        "#,
    )
    .bind(warehouse_id)
    .bind(product_ids)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Stock of one product per warehouse.
pub async fn product_stock<'e, E>(executor: E, product_id: Uuid) -> Result<Vec<WarehouseStock>, AppError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, WarehouseStock>(
        r#"
        SELECT warehouse_id, COALESCE(SUM(quantity), 0)::BIGINT AS quantity
        FROM stock
        WHERE product_id = $1
        GROUP BY warehouse_id
        ORDER BY warehouse_id
        "#,
    )
    .bind(product_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Serializes writers of one `(warehouse, product)` pair until the surrounding
/// transaction ends. Row locks alone cannot cover a pair with no rows yet.
pub async fn lock_pair<'e, E>(executor: E, warehouse_id: Uuid, product_id: Uuid) -> Result<(), AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('stock:' || $1::TEXT || ':' || $2::TEXT, 0))")
        .bind(warehouse_id)
        .bind(product_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// New per-row quantities after withdrawing `quantity` units from `rows`
/// (`(stock_id, quantity)` in draw order). Rows are drained front to back.
pub fn allocate_withdrawal(rows: &[(Uuid, i32)], quantity: i32) -> Result<Vec<(Uuid, i32)>, AppError> {
    let available: i64 = rows.iter().map(|(_, q)| i64::from((*q).max(0))).sum();
    if available < i64::from(quantity) {
        return Err(AppError::InsufficientStock(
            StockStatus::evaluate(available, i64::from(quantity)).message(),
        ));
    }

    let mut remaining = quantity;
    let mut updates = Vec::new();
    for &(id, on_hand) in rows {
        if remaining == 0 {
            break;
        }
        let take = on_hand.max(0).min(remaining);
        if take > 0 {
            updates.push((id, on_hand - take));
            remaining -= take;
        }
    }
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_availability() {
        assert_eq!(StockStatus::evaluate(0, 1), StockStatus::None);
        assert_eq!(StockStatus::evaluate(3, 5), StockStatus::Insufficient { available: 3 });
        assert_eq!(StockStatus::evaluate(5, 5), StockStatus::Ok { available: 5 });
        assert_eq!(StockStatus::None.message(), "Not in stock");
        assert_eq!(StockStatus::Insufficient { available: 3 }.message(), "Only 3 available");
        assert_eq!(StockStatus::Ok { available: 12 }.message(), "12 in stock");
    }

    #[test]
    fn repeated_products_share_availability() {
        let product = Uuid::from_u128(7);
        let items = vec![
            NewTransactionItem { product_id: product, quantity: 4 },
            NewTransactionItem { product_id: product, quantity: 4 },
        ];
        let levels = HashMap::from([(product, 6)]);

        let checks = check_lines(&items, &levels);
        assert!(checks.iter().all(|c| c.requested == 8));
        assert_eq!(checks[0].status, StockStatus::Insufficient { available: 6 });

        let err = shortage_error(&checks).unwrap();
        assert_eq!(
            err.to_string(),
            "Cannot create delivery: Only 6 available for selected product"
        );
    }

    #[test]
    fn unknown_product_is_not_in_stock() {
        let items = vec![NewTransactionItem { product_id: Uuid::from_u128(1), quantity: 1 }];
        let checks = check_lines(&items, &HashMap::new());
        assert_eq!(checks[0].status, StockStatus::None);
        assert!(shortage_error(&check_lines(&[], &HashMap::new())).is_none());
    }

    #[test]
    fn withdrawal_drains_rows_in_order() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);

        let updates = allocate_withdrawal(&[(a, 3), (b, 10), (c, 4)], 8).unwrap();
        assert_eq!(updates, vec![(a, 0), (b, 5)]);

        let err = allocate_withdrawal(&[(a, 3), (b, 1)], 5).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(ref m) if m == "Only 4 available"));
    }
}

//! Receipts and deliveries: creation, the status workflow and stock posting.

use std::collections::BTreeSet;

use log::info;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    models::{
        LedgerEntryDisplay, NewTransaction, OperationType, Transaction, TransactionItemDisplay,
        TransactionStatus, TransactionSummary, TransactionType, UserRole,
    },
    services::stock,
};

/// Checks the header and items, returning the operation type to store.
pub fn validate(new: &NewTransaction) -> Result<OperationType, AppError> {
    if new.items.is_empty() {
        return Err(AppError::Validation("Add at least one product".to_string()));
    }
    if let Some(item) = new.items.iter().find(|item| item.quantity < 1) {
        return Err(AppError::Validation(format!(
            "Quantity must be at least 1 (got {})",
            item.quantity
        )));
    }

    let operation = new.operation_type.unwrap_or_else(|| new.kind.default_operation());
    if !new.kind.operations().contains(&operation) {
        return Err(AppError::Validation(format!(
            "{} is not a valid operation type for a {}",
            operation,
            new.kind.label().to_lowercase()
        )));
    }
    Ok(operation)
}

pub fn format_reference(shortcode: &str, kind: TransactionType, sequence: i64) -> String {
    format!("{}/{}/{:04}", shortcode.to_uppercase(), kind, sequence)
}

/// Only single forward steps of the workflow are allowed.
pub fn ensure_transition(from: TransactionStatus, to: TransactionStatus) -> Result<(), AppError> {
    if from.next() == Some(to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "Cannot move an operation from {} to {}",
            from, to
        )))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub async fn create(
    db: &Database,
    new: NewTransaction,
    created_by: Option<Uuid>,
) -> Result<Transaction, AppError> {
    let operation = validate(&new)?;
    let mut tx = db.begin().await?;

    let shortcode = sqlx::query_scalar::<_, String>("SELECT shortcode FROM warehouses WHERE id = $1")
        .bind(new.warehouse_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Warehouse"))?;

    let product_ids: Vec<Uuid> = new
        .items
        .iter()
        .map(|item| item.product_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let known = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM products WHERE id = ANY($1) AND is_active = true",
    )
    .bind(&product_ids[..])
    .fetch_one(&mut *tx)
    .await?;
    if known != product_ids.len() as i64 {
        return Err(AppError::Validation(
            "One or more selected products do not exist or are inactive".to_string(),
        ));
    }

    if new.kind == TransactionType::Out {
        let levels = stock::available_in_warehouse(&mut *tx, new.warehouse_id, &product_ids).await?;
        if let Some(err) = stock::shortage_error(&stock::check_lines(&new.items, &levels)) {
            return Err(err);
        }
    }

    let reference = match non_empty(new.reference) {
        Some(reference) => reference,
        None => next_reference(&mut *tx, &shortcode, new.kind).await?,
    };

    let (supplier, delivery_address) = match new.kind {
        TransactionType::In => (non_empty(new.supplier), None),
        TransactionType::Out => (None, non_empty(new.delivery_address)),
    };

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            kind, reference, warehouse_id, supplier, delivery_address, responsible,
            schedule_date, operation_type, notes, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(new.kind.as_str())
    .bind(&reference)
    .bind(new.warehouse_id)
    .bind(supplier)
    .bind(delivery_address)
    .bind(non_empty(new.responsible))
    .bind(new.schedule_date)
    .bind(operation.as_str())
    .bind(non_empty(new.notes))
    .bind(created_by)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if AppError::is_unique_violation(&e) {
            AppError::Conflict(format!("Reference {} is already in use", reference))
        } else {
            AppError::Database(e)
        }
    })?;

    let mut items = QueryBuilder::<Postgres>::new(
        "INSERT INTO transaction_items (transaction_id, product_id, quantity) ",
    );
    items.push_values(&new.items, |mut row, item| {
        row.push_bind(transaction.id)
            .push_bind(item.product_id)
            .push_bind(item.quantity);
    });
    items.build().execute(&mut *tx).await?;

    tx.commit().await?;

    info!(
        "Created {} {} with {} item(s)",
        transaction.kind.label().to_lowercase(),
        transaction.reference,
        new.items.len()
    );
    Ok(transaction)
}

/// Next free `SHORTCODE/KIND/NNNN` reference. Numbering follows the highest
/// numeric suffix already stored under the prefix, whichever warehouse or
/// user wrote it. The prefix stays locked until the transaction ends.
pub async fn next_reference(
    conn: &mut PgConnection,
    shortcode: &str,
    kind: TransactionType,
) -> Result<String, AppError> {
    let prefix = format!("{}/{}/", shortcode.to_uppercase(), kind);

    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('reference:' || $1, 0))")
        .bind(&prefix)
        .execute(&mut *conn)
        .await?;

    let highest = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(MAX(SUBSTRING(reference FROM char_length($1) + 1)::BIGINT), 0)
        FROM transactions
        WHERE LEFT(reference, char_length($1)) = $1
          AND SUBSTRING(reference FROM char_length($1) + 1) ~ '^[0-9]{1,18}$'
        "#,
    )
    .bind(&prefix)
    .fetch_one(&mut *conn)
    .await?;

    Ok(format_reference(shortcode, kind, highest + 1))
}

/// Moves a transaction to `target`, or to its next status when `target` is
/// `None`. Reaching DONE posts the stock movements and ledger entries and
/// is reserved to managers.
pub async fn transition(
    db: &Database,
    id: Uuid,
    target: Option<TransactionStatus>,
    role: UserRole,
) -> Result<Transaction, AppError> {
    let mut tx = db.begin().await?;

    let current = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Transaction"))?;

    let next = match target {
        Some(status) => status,
        None => current.status.next().ok_or_else(|| {
            AppError::InvalidTransition(format!("{} is already done", current.reference))
        })?,
    };
    ensure_transition(current.status, next)?;

    if next == TransactionStatus::Done {
        if role != UserRole::Manager {
            return Err(AppError::Forbidden(
                "Only managers can validate operations".to_string(),
            ));
        }
        post_stock(&mut *tx, &current).await?;
    }

    let updated = sqlx::query_as::<_, Transaction>(
        "UPDATE transactions SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(next.as_str())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("{} moved from {} to {}", updated.reference, current.status, next);
    Ok(updated)
}

// Each (warehouse, product) pair is locked before its rows are read, so
// concurrent validations serialize on it even when no row exists yet.
// Items are visited in product order, which keeps lock order consistent.
async fn post_stock(conn: &mut PgConnection, transaction: &Transaction) -> Result<(), AppError> {
    let items = sqlx::query_as::<_, (Uuid, i32, String)>(
        r#"
        SELECT ti.product_id, ti.quantity, p.sku
        FROM transaction_items ti
        JOIN products p ON p.id = ti.product_id
        WHERE ti.transaction_id = $1
        ORDER BY ti.product_id
        "#,
    )
    .bind(transaction.id)
    .fetch_all(&mut *conn)
    .await?;

    for (product_id, quantity, sku) in items {
        stock::lock_pair(&mut *conn, transaction.warehouse_id, product_id).await?;

        let rows = sqlx::query_as::<_, (Uuid, Option<Uuid>, i32)>(
            r#"
            SELECT id, sub_location_id, quantity
            FROM stock
            WHERE warehouse_id = $1 AND product_id = $2
            ORDER BY sub_location_id NULLS FIRST, id
            FOR UPDATE
            "#,
        )
        .bind(transaction.warehouse_id)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

        let on_hand: i64 = rows.iter().map(|(_, _, q)| i64::from(*q)).sum();

        let (change, balance_after) = match transaction.kind {
            TransactionType::In => {
                match rows.iter().find(|(_, sub_location, _)| sub_location.is_none()) {
                    Some((stock_id, _, _)) => {
                        sqlx::query(
                            "UPDATE stock SET quantity = quantity + $1, updated_at = NOW() WHERE id = $2",
                        )
                        .bind(quantity)
                        .bind(stock_id)
                        .execute(&mut *conn)
                        .await?;
                    }
                    None => {
                        sqlx::query(
                            "INSERT INTO stock (warehouse_id, product_id, quantity) VALUES ($1, $2, $3)",
                        )
                        .bind(transaction.warehouse_id)
                        .bind(product_id)
                        .bind(quantity)
                        .execute(&mut *conn)
                        .await?;
                    }
                }
                (quantity, on_hand + i64::from(quantity))
            }
            TransactionType::Out => {
                let draw: Vec<(Uuid, i32)> = rows.iter().map(|(id, _, q)| (*id, *q)).collect();
                let updates = stock::allocate_withdrawal(&draw, quantity).map_err(|err| {
                    AppError::InsufficientStock(format!(
                        "Cannot validate {}: {} of {}",
                        transaction.reference, err, sku
                    ))
                })?;
                for (stock_id, remaining) in updates {
                    sqlx::query("UPDATE stock SET quantity = $1, updated_at = NOW() WHERE id = $2")
                        .bind(remaining)
                        .bind(stock_id)
                        .execute(&mut *conn)
                        .await?;
                }
                (-quantity, on_hand - i64::from(quantity))
            }
        };

        sqlx::query(
            r#"
            INSERT INTO ledger (transaction_id, product_id, warehouse_id, quantity_change, balance_after)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(transaction.id)
        .bind(product_id)
        .bind(transaction.warehouse_id)
        .bind(change)
        .bind(balance_after)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn find(db: &Database, id: Uuid) -> Result<Transaction, AppError> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("Transaction"))
}

pub async fn list(db: &Database, kind: Option<TransactionType>) -> Result<Vec<Transaction>, AppError> {
    let rows = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE ($1::TEXT IS NULL OR kind = $1) ORDER BY created_at DESC",
    )
    .bind(kind.map(|k| k.as_str()))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn summaries(
    db: &Database,
    kind: TransactionType,
    status: Option<TransactionStatus>,
) -> Result<Vec<TransactionSummary>, AppError> {
    let rows = sqlx::query_as::<_, TransactionSummary>(
        r#"
        SELECT
            t.id,
            t.reference,
            t.status,
            w.name AS warehouse_name,
            CASE WHEN t.kind = 'IN' THEN t.supplier ELSE t.delivery_address END AS counterpart,
            t.schedule_date,
            COUNT(ti.id) AS item_count,
            COALESCE(SUM(ti.quantity), 0)::BIGINT AS total_quantity
        FROM transactions t
        JOIN warehouses w ON w.id = t.warehouse_id
        LEFT JOIN transaction_items ti ON ti.transaction_id = t.id
        WHERE t.kind = $1 AND ($2::TEXT IS NULL OR t.status = $2)
        GROUP BY t.id, w.name
        ORDER BY t.created_at DESC
        "#,
    )
    .bind(kind.as_str())
    .bind(status.map(|s| s.as_str()))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn items(db: &Database, transaction_id: Uuid) -> Result<Vec<TransactionItemDisplay>, AppError> {
    let rows = sqlx::query_as::<_, TransactionItemDisplay>(
        r#"
        SELECT ti.product_id, p.name AS product_name, p.sku, p.uom, ti.quantity
        FROM transaction_items ti
        JOIN products p ON p.id = ti.product_id
        WHERE ti.transaction_id = $1
        ORDER BY p.name
        "#,
    )
    .bind(transaction_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn ledger(db: &Database, transaction_id: Uuid) -> Result<Vec<LedgerEntryDisplay>, AppError> {
    let rows = sqlx::query_as::<_, LedgerEntryDisplay>(
        r#"
        SELECT p.name AS product_name, p.sku, l.quantity_change, l.balance_after, l.created_at
        FROM ledger l
        JOIN products p ON p.id = l.product_id
        WHERE l.transaction_id = $1
        ORDER BY l.created_at, p.name
        "#,
    )
    .bind(transaction_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTransactionItem;

    fn receipt(items: Vec<NewTransactionItem>) -> NewTransaction {
        NewTransaction {
            kind: TransactionType::In,
            reference: None,
            warehouse_id: Uuid::from_u128(1),
            supplier: Some("Acme".to_string()),
            delivery_address: None,
            responsible: None,
            schedule_date: None,
            operation_type: None,
            notes: None,
            items,
        }
    }

    fn item(quantity: i32) -> NewTransactionItem {
        NewTransactionItem { product_id: Uuid::from_u128(9), quantity }
    }

    #[test]
    fn defaults_operation_type_by_direction() {
        assert_eq!(validate(&receipt(vec![item(2)])).unwrap(), OperationType::Purchase);

        let mut delivery = receipt(vec![item(2)]);
        delivery.kind = TransactionType::Out;
        assert_eq!(validate(&delivery).unwrap(), OperationType::Standard);
    }

    #[test]
    fn rejects_empty_or_non_positive_lines() {
        assert!(matches!(validate(&receipt(vec![])), Err(AppError::Validation(_))));
        assert!(matches!(validate(&receipt(vec![item(0)])), Err(AppError::Validation(_))));
        assert!(matches!(validate(&receipt(vec![item(3), item(-1)])), Err(AppError::Validation(_))));
    }

    #[test]
    fn rejects_operation_of_the_other_direction() {
        let mut new = receipt(vec![item(1)]);
        new.operation_type = Some(OperationType::Express);
        let err = validate(&new).unwrap_err();
        assert_eq!(err.to_string(), "EXPRESS is not a valid operation type for a receipt");
    }

    #[test]
    fn formats_references() {
        assert_eq!(format_reference("abc", TransactionType::In, 1), "ABC/IN/0001");
        assert_eq!(format_reference("WH", TransactionType::Out, 12345), "WH/OUT/12345");
    }

    #[test]
    fn allows_only_the_next_status() {
        use TransactionStatus::*;
        assert!(ensure_transition(Draft, Waiting).is_ok());
        assert!(ensure_transition(Ready, Done).is_ok());
        assert!(ensure_transition(Draft, Done).is_err());
        assert!(ensure_transition(Waiting, Draft).is_err());
        assert!(ensure_transition(Done, Done).is_err());
    }

    #[test]
    fn blank_strings_are_dropped() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" WH/IN/7 ".to_string())), Some("WH/IN/7".to_string()));
    }
}

//! Repair of duplicate stock rows.
//!
//! Rows sharing `(warehouse_id, product_id)` are merged into the first row of
//! their group in scan order. The scan puts the warehouse-level row (no
//! sub-location) first when there is one. The kept row takes the sum of the
//! group and loses its sub-location, and the other rows are deleted.

use std::collections::HashSet;

use log::info;
use uuid::Uuid;

use crate::{database::Database, error::AppError, models::Stock, services::stock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationGroup {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub keep_id: Uuid,
    pub total_quantity: i32,
    pub delete_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationPlan {
    pub rows_scanned: usize,
    pub groups: Vec<ConsolidationGroup>,
}

impl ConsolidationPlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn rows_to_delete(&self) -> usize {
        self.groups.iter().map(|g| g.delete_ids.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub rows_scanned: usize,
    pub groups_merged: usize,
    pub rows_deleted: u64,
}

/// Groups `rows` by `(warehouse_id, product_id)` and plans a merge for every
/// key that occurs more than once. Rows with equal keys keep their input order.
pub fn plan(rows: &[Stock]) -> Result<ConsolidationPlan, AppError> {
    let mut ordered: Vec<&Stock> = rows.iter().collect();
    ordered.sort_by_key(|row| row.key());

    let mut groups = Vec::new();
    for chunk in ordered.chunk_by(|a, b| a.key() == b.key()) {
        if chunk.len() < 2 {
            continue;
        }

        let first = chunk[0];
        let total_quantity = chunk
            .iter()
            .try_fold(0i32, |sum, row| sum.checked_add(row.quantity))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "quantity overflow consolidating product {} in warehouse {}",
                    first.product_id, first.warehouse_id
                ))
            })?;

        groups.push(ConsolidationGroup {
            warehouse_id: first.warehouse_id,
            product_id: first.product_id,
            keep_id: first.id,
            total_quantity,
            delete_ids: chunk[1..].iter().map(|row| row.id).collect(),
        });
    }

    Ok(ConsolidationPlan {
        rows_scanned: rows.len(),
        groups,
    })
}

/// Applies `plan` to an in-memory copy of the stock table.
pub fn apply_in_memory(rows: &[Stock], plan: &ConsolidationPlan) -> Vec<Stock> {
    let deleted: HashSet<Uuid> = plan
        .groups
        .iter()
        .flat_map(|g| g.delete_ids.iter().copied())
        .collect();

    rows.iter()
        .filter(|row| !deleted.contains(&row.id))
        .map(|row| {
            let mut row = row.clone();
            if let Some(group) = plan.groups.iter().find(|g| g.keep_id == row.id) {
                row.quantity = group.total_quantity;
                row.sub_location_id = None;
            }
            row
        })
        .collect()
}

/// Consolidates the stock table in place. Each group is written in its own
/// database transaction, so an interrupted run leaves every group either
/// fully merged or untouched. A group is re-read under the pair lock before
/// it is written, so stock posted since the scan is not lost.
pub async fn consolidate(db: &Database) -> Result<ConsolidationReport, AppError> {
    info!("Consolidating duplicate stock entries...");

    let rows = sqlx::query_as::<_, Stock>(
        "SELECT * FROM stock ORDER BY warehouse_id, product_id, sub_location_id NULLS FIRST, id",
    )
    .fetch_all(db)
    .await?;
    info!("Found {} stock entries", rows.len());

    let scan = plan(&rows)?;
    info!("Found {} duplicate groups", scan.groups.len());

    let mut report = ConsolidationReport {
        rows_scanned: scan.rows_scanned,
        ..Default::default()
    };

    for scanned in &scan.groups {
        let mut tx = db.begin().await?;
        stock::lock_pair(&mut *tx, scanned.warehouse_id, scanned.product_id).await?;

        let current = sqlx::query_as::<_, Stock>(
            r#"
            SELECT * FROM stock
            WHERE warehouse_id = $1 AND product_id = $2
            ORDER BY sub_location_id NULLS FIRST, id
            FOR UPDATE
            "#,
        )
        .bind(scanned.warehouse_id)
        .bind(scanned.product_id)
        .fetch_all(&mut *tx)
        .await?;

        let Some(group) = plan(&current)?.groups.into_iter().next() else {
            tx.commit().await?;
            continue;
        };

        info!(
            "Consolidating {} entries for warehouse {} / product {}",
            group.delete_ids.len() + 1,
            group.warehouse_id,
            group.product_id
        );

        sqlx::query(
            "UPDATE stock SET quantity = $1, sub_location_id = NULL, updated_at = NOW() WHERE id = $2",
        )
        .bind(group.total_quantity)
        .bind(group.keep_id)
        .execute(&mut *tx)
        .await?;
        info!("  kept stock {} with quantity {}", group.keep_id, group.total_quantity);

        let deleted = sqlx::query("DELETE FROM stock WHERE id = ANY($1)")
            .bind(&group.delete_ids[..])
            .execute(&mut *tx)
            .await?
            .rows_affected();
        for id in &group.delete_ids {
            info!("  deleted stock {}", id);
        }

        tx.commit().await?;

        report.groups_merged += 1;
        report.rows_deleted += deleted;
    }

    info!(
        "Consolidation complete: {} groups merged, {} rows deleted",
        report.groups_merged, report.rows_deleted
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(warehouse: u128, product: u128, sub: Option<u128>, quantity: i32) -> Stock {
        Stock {
            id: Uuid::new_v4(),
            warehouse_id: Uuid::from_u128(warehouse),
            product_id: Uuid::from_u128(product),
            sub_location_id: sub.map(Uuid::from_u128),
            quantity,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn merges_duplicates_into_first_row() {
        let rows = vec![
            row(1, 10, Some(100), 5),
            row(2, 10, None, 7),
            row(1, 10, Some(101), 3),
            row(1, 10, None, 2),
        ];

        let plan = plan(&rows).unwrap();
        assert_eq!(plan.groups.len(), 1);

        let group = &plan.groups[0];
        assert_eq!(group.keep_id, rows[0].id);
        assert_eq!(group.total_quantity, 10);
        assert_eq!(group.delete_ids, vec![rows[2].id, rows[3].id]);
        assert_eq!(plan.rows_to_delete(), 2);

        let after = apply_in_memory(&rows, &plan);
        assert_eq!(after.len(), 2);
        let kept = after.iter().find(|r| r.id == rows[0].id).unwrap();
        assert_eq!(kept.quantity, 10);
        assert_eq!(kept.sub_location_id, None);
        assert!(after.contains(&rows[1]));
    }

    #[test]
    fn unique_rows_produce_empty_plan() {
        let rows = vec![row(1, 1, None, 4), row(1, 2, Some(9), 4), row(2, 1, None, 0)];
        let plan = plan(&rows).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.rows_scanned, 3);
        assert_eq!(apply_in_memory(&rows, &plan), rows);
    }

    #[test]
    fn empty_table_is_a_no_op() {
        let plan = plan(&[]).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.rows_scanned, 0);
    }

    #[test]
    fn refuses_to_overflow_quantity() {
        let rows = vec![row(1, 1, None, i32::MAX), row(1, 1, Some(2), 1)];
        assert!(matches!(plan(&rows), Err(AppError::Validation(_))));
    }
}

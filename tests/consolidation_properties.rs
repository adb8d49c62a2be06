//! Property-based tests for stock consolidation planning.

use std::collections::{HashMap, HashSet};

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use stockmaster::{
    models::Stock,
    services::consolidation::{apply_in_memory, plan},
};
use uuid::Uuid;

// Few warehouses and products so that duplicate keys are common.
fn stock_rows_strategy() -> impl Strategy<Value = Vec<Stock>> {
    prop::collection::vec((0u128..3, 0u128..4, prop::option::of(0u128..3), 0i32..10_000), 0..40)
        .prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(index, (warehouse, product, sub_location, quantity))| Stock {
                    id: Uuid::from_u128(1_000 + index as u128),
                    warehouse_id: Uuid::from_u128(100 + warehouse),
                    product_id: Uuid::from_u128(200 + product),
                    sub_location_id: sub_location.map(|s| Uuid::from_u128(300 + s)),
                    quantity,
                    updated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                })
                .collect()
        })
}

fn totals(rows: &[Stock]) -> HashMap<(Uuid, Uuid), i64> {
    let mut totals = HashMap::new();
    for row in rows {
        *totals.entry(row.key()).or_insert(0i64) += i64::from(row.quantity);
    }
    totals
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn leaves_one_row_per_key(rows in stock_rows_strategy()) {
        let plan = plan(&rows).unwrap();
        let merged = apply_in_memory(&rows, &plan);

        let keys: HashSet<_> = merged.iter().map(Stock::key).collect();
        prop_assert_eq!(keys.len(), merged.len());
        prop_assert_eq!(merged.len(), rows.len() - plan.rows_to_delete());
    }

    #[test]
    fn preserves_quantity_per_key(rows in stock_rows_strategy()) {
        let merged = apply_in_memory(&rows, &plan(&rows).unwrap());
        prop_assert_eq!(totals(&merged), totals(&rows));
    }

    #[test]
    fn leaves_unique_rows_untouched(rows in stock_rows_strategy()) {
        let counts = rows.iter().fold(HashMap::new(), |mut counts, row| {
            *counts.entry(row.key()).or_insert(0usize) += 1;
            counts
        });
        let merged = apply_in_memory(&rows, &plan(&rows).unwrap());

        for row in rows.iter().filter(|row| counts[&row.key()] == 1) {
            prop_assert!(merged.contains(row), "unique row {} was modified", row.id);
        }
    }

    #[test]
    fn keeps_the_first_row_of_each_group(rows in stock_rows_strategy()) {
        let plan = plan(&rows).unwrap();
        for group in &plan.groups {
            let first = rows
                .iter()
                .find(|row| (row.warehouse_id, row.product_id) == (group.warehouse_id, group.product_id))
                .unwrap();
            prop_assert_eq!(group.keep_id, first.id);
        }
    }

    #[test]
    fn second_run_plans_nothing(rows in stock_rows_strategy()) {
        let merged = apply_in_memory(&rows, &plan(&rows).unwrap());
        let again = plan(&merged).unwrap();
        prop_assert!(again.is_empty());
        prop_assert_eq!(again.rows_to_delete(), 0);
    }
}

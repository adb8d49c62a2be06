use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Quantity of one product at one warehouse, optionally narrowed to a sub-location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Stock {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub sub_location_id: Option<Uuid>,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    pub fn key(&self) -> (Uuid, Uuid) {
        (self.warehouse_id, self.product_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WarehouseStock {
    pub warehouse_id: Uuid,
    pub quantity: i64,
}

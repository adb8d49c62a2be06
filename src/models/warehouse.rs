use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

text_enum! {
    WarehouseType("warehouse type") {
        Main => "MAIN",
        Secondary => "SECONDARY",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Warehouse {
    pub id: Uuid,
    pub name: String,
    pub shortcode: String,
    pub location_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub kind: WarehouseType,
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubLocation {
    pub id: Uuid,
    pub name: String,
    pub warehouse_id: Uuid,
}

// Template-friendly summary for the warehouses page
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WarehouseOverview {
    pub id: Uuid,
    pub name: String,
    pub shortcode: String,
    #[sqlx(try_from = "String")]
    pub kind: WarehouseType,
    pub location_name: String,
    pub capacity: i32,
    pub sub_locations: String,
    pub units_on_hand: i64,
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub min_stock: i32,
    pub uom: String,
    pub price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub min_stock: i32,
    pub uom: String,
    pub price: Decimal,
}

/// Product row for the list view, with its stock summed over every warehouse.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductStockLine {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub uom: String,
    pub price: Decimal,
    pub min_stock: i32,
    pub on_hand: i64,
}

impl ProductStockLine {
    pub fn is_below_minimum(&self) -> bool {
        self.on_hand < i64::from(self.min_stock)
    }

    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or("-")
    }
}

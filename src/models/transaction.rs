use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

text_enum! {
    /// Direction of a stock transaction: receipts are `IN`, deliveries are `OUT`.
    TransactionType("transaction type") {
        In => "IN",
        Out => "OUT",
    }
}

text_enum! {
    TransactionStatus("transaction status") {
        Draft => "DRAFT",
        Waiting => "WAITING",
        Ready => "READY",
        Done => "DONE",
    }
}

text_enum! {
    OperationType("operation type") {
        Purchase => "PURCHASE",
        Transfer => "TRANSFER",
        Adjustment => "ADJUSTMENT",
        Standard => "STANDARD",
        Express => "EXPRESS",
        Bulk => "BULK",
        Return => "RETURN",
    }
}

impl TransactionType {
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::In => "Receipt",
            TransactionType::Out => "Delivery",
        }
    }

    pub fn default_operation(&self) -> OperationType {
        match self {
            TransactionType::In => OperationType::Purchase,
            TransactionType::Out => OperationType::Standard,
        }
    }

    pub fn operations(&self) -> &'static [OperationType] {
        match self {
            TransactionType::In => &[
                OperationType::Purchase,
                OperationType::Return,
                OperationType::Transfer,
                OperationType::Adjustment,
            ],
            TransactionType::Out => &[
                OperationType::Standard,
                OperationType::Express,
                OperationType::Bulk,
                OperationType::Return,
            ],
        }
    }

    /// Path of the list page for this kind of operation.
    pub fn list_path(&self) -> &'static str {
        match self {
            TransactionType::In => "/operations/receipts",
            TransactionType::Out => "/operations/deliveries",
        }
    }
}

impl TransactionStatus {
    /// Workflow order is DRAFT -> WAITING -> READY -> DONE; DONE is terminal.
    pub fn next(&self) -> Option<TransactionStatus> {
        match self {
            TransactionStatus::Draft => Some(TransactionStatus::Waiting),
            TransactionStatus::Waiting => Some(TransactionStatus::Ready),
            TransactionStatus::Ready => Some(TransactionStatus::Done),
            TransactionStatus::Done => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionStatus::Draft => "Draft",
            TransactionStatus::Waiting => "Waiting",
            TransactionStatus::Ready => "Ready",
            TransactionStatus::Done => "Done",
        }
    }
}

impl OperationType {
    pub fn label(&self, kind: TransactionType) -> &'static str {
        match (self, kind) {
            (OperationType::Purchase, _) => "Purchase",
            (OperationType::Transfer, _) => "Internal Transfer",
            (OperationType::Adjustment, _) => "Adjustment",
            (OperationType::Standard, _) => "Standard Delivery",
            (OperationType::Express, _) => "Express Delivery",
            (OperationType::Bulk, _) => "Bulk Delivery",
            (OperationType::Return, TransactionType::In) => "Customer Return",
            (OperationType::Return, TransactionType::Out) => "Return",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub kind: TransactionType,
    pub reference: String,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub warehouse_id: Uuid,
    pub supplier: Option<String>,
    pub delivery_address: Option<String>,
    pub responsible: Option<String>,
    pub schedule_date: Option<NaiveDate>,
    #[sqlx(try_from = "String")]
    pub operation_type: OperationType,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Supplier for receipts, delivery address for deliveries.
    pub fn counterpart(&self) -> &str {
        let party = match self.kind {
            TransactionType::In => self.supplier.as_deref(),
            TransactionType::Out => self.delivery_address.as_deref(),
        };
        party.unwrap_or("-")
    }

    pub fn schedule_label(&self) -> String {
        self.schedule_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionItem {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransactionItemDisplay {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub uom: String,
    pub quantity: i32,
}

/// One row of the receipts/deliveries list.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransactionSummary {
    pub id: Uuid,
    pub reference: String,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub warehouse_name: String,
    pub counterpart: Option<String>,
    pub schedule_date: Option<NaiveDate>,
    pub item_count: i64,
    pub total_quantity: i64,
}

impl TransactionSummary {
    pub fn counterpart_label(&self) -> &str {
        self.counterpart.as_deref().unwrap_or("-")
    }

    pub fn schedule_label(&self) -> String {
        self.schedule_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransactionItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Header and line items of a receipt or delivery, as submitted by a form or the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(default)]
    pub reference: Option<String>,
    pub warehouse_id: Uuid,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub schedule_date: Option<NaiveDate>,
    #[serde(default)]
    pub operation_type: Option<OperationType>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<NewTransactionItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_forward_one_step() {
        assert_eq!(TransactionStatus::Draft.next(), Some(TransactionStatus::Waiting));
        assert_eq!(TransactionStatus::Waiting.next(), Some(TransactionStatus::Ready));
        assert_eq!(TransactionStatus::Ready.next(), Some(TransactionStatus::Done));
        assert_eq!(TransactionStatus::Done.next(), None);
    }

    #[test]
    fn parses_stored_text() {
        assert_eq!("OUT".parse::<TransactionType>().unwrap(), TransactionType::Out);
        assert_eq!(
            TransactionStatus::try_from("READY".to_string()).unwrap(),
            TransactionStatus::Ready
        );
        assert!("shipped".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn operation_types_depend_on_direction() {
        assert!(TransactionType::In.operations().contains(&OperationType::Purchase));
        assert!(!TransactionType::In.operations().contains(&OperationType::Express));
        assert_eq!(TransactionType::Out.default_operation(), OperationType::Standard);
    }

    #[test]
    fn api_payload_uses_type_field() {
        let payload = serde_json::json!({
            "type": "OUT",
            "warehouse_id": Uuid::nil(),
            "operation_type": "EXPRESS",
            "items": [{ "product_id": Uuid::nil(), "quantity": 3 }]
        });
        let parsed: NewTransaction = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.kind, TransactionType::Out);
        assert_eq!(parsed.operation_type, Some(OperationType::Express));
        assert_eq!(parsed.items[0].quantity, 3);
        assert!(parsed.reference.is_none());
    }
}

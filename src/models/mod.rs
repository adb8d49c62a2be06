#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

// Enums persisted as TEXT columns. Rows decode them through
// `#[sqlx(try_from = "String")]` and queries bind `as_str()`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident ($label:literal) { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::models::ParseEnumError {
                        kind: $label,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::models::ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub mod ledger;
pub mod product;
pub mod stock;
pub mod transaction;
pub mod user;
pub mod warehouse;

pub use ledger::{LedgerEntry, LedgerEntryDisplay};
pub use product::{NewProduct, Product, ProductStockLine};
pub use stock::{Stock, WarehouseStock};
pub use transaction::{
    NewTransaction, NewTransactionItem, OperationType, Transaction, TransactionItem,
    TransactionItemDisplay, TransactionStatus, TransactionSummary, TransactionType,
};
pub use user::{User, UserRole};
pub use warehouse::{Location, SubLocation, Warehouse, WarehouseOverview, WarehouseType};

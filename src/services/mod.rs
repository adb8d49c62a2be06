pub mod consolidation;
pub mod seed;
pub mod stock;
pub mod transactions;

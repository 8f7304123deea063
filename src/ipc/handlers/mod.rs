pub mod backfill;
pub mod backup_exchange;
pub mod catalog;
pub mod core;
pub mod policy;
pub mod records;
pub mod validation;

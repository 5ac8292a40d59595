pub mod audit_record;
pub mod currency;
pub mod field;
pub mod snapshot;

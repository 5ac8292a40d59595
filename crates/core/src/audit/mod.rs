//! Price-change audit trail: field diffing, change classification,
//! human-readable descriptions and append-only persistence.

pub mod changes;
pub mod describe;
pub mod engine;
pub mod lookup;
pub mod sink;

pub use changes::{classify, detect_changes, present_values, ChangeSet, FieldChange};
pub use describe::ChangeDescriber;
pub use engine::PriceAuditEngine;
pub use lookup::{EntityNameLookup, StaticNameDirectory, UserNameLookup};
pub use sink::{AuditHistory, AuditSink, InMemoryAuditSink};

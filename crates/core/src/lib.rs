pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use audit::{
    AuditHistory, AuditSink, ChangeSet, EntityNameLookup, PriceAuditEngine, UserNameLookup,
};
pub use domain::audit_record::{AuditRecord, AuditRecordId, ChangeType, NewAuditRecord};
pub use domain::field::{EntityKind, FieldValue, TrackableField};
pub use domain::snapshot::{
    ApprovalStatus, PriceSnapshot, PricingModelId, PricingTierId, ServiceId, ServicePriceId,
    UserId,
};
pub use errors::{ApplicationError, AuditError, InterfaceError, PricingError, SnapshotError};
pub use pricing::rates::{ExchangeRate, RateLookup};
pub use pricing::{AdjustedPrice, PriceCalculator, PriceQuote, QuoteRequest};

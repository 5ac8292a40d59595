use thiserror::Error;

use pricetrail_core::errors::{AuditError, PricingError, SnapshotError};

pub mod audit;
pub mod catalog;
pub mod price;
pub mod rates;

pub use audit::SqlAuditRecordRepository;
pub use catalog::SqlCatalogRepository;
pub use price::SqlPriceRecordRepository;
pub use rates::SqlRateRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid price snapshot: {0}")]
    Invalid(#[from] SnapshotError),
}

impl From<RepositoryError> for AuditError {
    fn from(error: RepositoryError) -> Self {
        AuditError::Persistence(error.to_string())
    }
}

impl From<RepositoryError> for PricingError {
    fn from(error: RepositoryError) -> Self {
        PricingError::RateLookup(error.to_string())
    }
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

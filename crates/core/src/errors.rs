use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("{field} `{value}` is outside the allowed range 0..=100")]
    InvalidPercentage { field: &'static str, value: Decimal },
    #[error("complexity multiplier `{value}` must not be negative")]
    InvalidMultiplier { value: Decimal },
    #[error("{field} must not be negative (got `{value}`)")]
    NegativeAmount { field: &'static str, value: Decimal },
    #[error("arithmetic overflow while computing {stage}")]
    Overflow { stage: &'static str },
    #[error("no exchange rate from {from} to {to} effective on or before {as_of}")]
    RateNotFound { from: String, to: String, as_of: NaiveDate },
    #[error("exchange rate lookup failed: {0}")]
    RateLookup(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("valid_to {valid_to} must be after valid_from {valid_from}")]
    InvalidWindow { valid_from: NaiveDate, valid_to: NaiveDate },
    #[error("{field} must not be negative (got `{value}`)")]
    NegativeAmount { field: &'static str, value: Decimal },
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit persistence failure: {0}")]
    Persistence(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("rate unavailable: {message}")]
    RateUnavailable { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::RateUnavailable { .. } => {
                "Exchange rate unavailable for the requested currency pair."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::RateUnavailable { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Pricing(error @ PricingError::RateNotFound { .. }) => {
                Self::RateUnavailable { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Pricing(PricingError::RateLookup(message)) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Pricing(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Snapshot(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Audit(AuditError::Persistence(message))
            | ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}

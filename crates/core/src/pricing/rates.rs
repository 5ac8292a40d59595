use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::currency::normalize_currency_code;
use crate::errors::PricingError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    pub effective_date: NaiveDate,
}

/// Source of conversion rates. Implementations must return the most recent
/// rate for the exact `(from, to)` pair with `effective_date <= as_of`, and
/// `Ok(None)` when no such row exists.
#[async_trait]
pub trait RateLookup: Send + Sync {
    async fn find(
        &self,
        from: &str,
        to: &str,
        as_of: NaiveDate,
    ) -> Result<Option<ExchangeRate>, PricingError>;
}

#[derive(Clone, Default)]
pub struct InMemoryRateTable {
    rates: Vec<ExchangeRate>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryRateTable {
    pub fn with_rate(
        mut self,
        from: &str,
        to: &str,
        rate: Decimal,
        effective_date: NaiveDate,
    ) -> Self {
        self.rates.push(ExchangeRate {
            from_currency: normalize_currency_code(from),
            to_currency: normalize_currency_code(to),
            rate,
            effective_date,
        });
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLookup for InMemoryRateTable {
    async fn find(
        &self,
        from: &str,
        to: &str,
        as_of: NaiveDate,
    ) -> Result<Option<ExchangeRate>, PricingError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let from = normalize_currency_code(from);
        let to = normalize_currency_code(to);

        Ok(self
            .rates
            .iter()
            .filter(|rate| rate.from_currency == from && rate.to_currency == to)
            .filter(|rate| rate.effective_date <= as_of)
            .max_by_key(|rate| rate.effective_date)
            .cloned())
    }
}

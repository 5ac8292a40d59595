use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use pricetrail_core::domain::currency::normalize_currency_code;
use pricetrail_core::errors::PricingError;
use pricetrail_core::pricing::rates::{ExchangeRate, RateLookup};

use super::{decode_error, RepositoryError};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Exchange rates stored in `currency_rate`, one row per pair and
/// effective date.
#[derive(Clone)]
pub struct SqlRateRepository {
    pool: DbPool,
}

impl SqlRateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces the rate for the pair on its effective date.
    pub async fn save(&self, rate: &ExchangeRate) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO currency_rate (from_currency, to_currency, rate, effective_date)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(from_currency, to_currency, effective_date) DO UPDATE SET
                 rate = excluded.rate",
        )
        .bind(normalize_currency_code(&rate.from_currency))
        .bind(normalize_currency_code(&rate.to_currency))
        .bind(rate.rate.to_string())
        .bind(rate.effective_date.format(DATE_FORMAT).to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn latest(
        &self,
        from: &str,
        to: &str,
        as_of: NaiveDate,
    ) -> Result<Option<ExchangeRate>, RepositoryError> {
        let row = sqlx::query(
            "SELECT from_currency, to_currency, rate, effective_date
             FROM currency_rate
             WHERE from_currency = ? AND to_currency = ? AND effective_date <= ?
             ORDER BY effective_date DESC
             LIMIT 1",
        )
        .bind(normalize_currency_code(from))
        .bind(normalize_currency_code(to))
        .bind(as_of.format(DATE_FORMAT).to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_rate).transpose()
    }
}

fn row_to_rate(row: &SqliteRow) -> Result<ExchangeRate, RepositoryError> {
    let rate: String = row.try_get("rate").map_err(decode_error)?;
    let effective_date: String = row.try_get("effective_date").map_err(decode_error)?;

    Ok(ExchangeRate {
        from_currency: row.try_get("from_currency").map_err(decode_error)?,
        to_currency: row.try_get("to_currency").map_err(decode_error)?,
        rate: Decimal::from_str(&rate)
            .map_err(|error| decode_error(format!("rate `{rate}`: {error}")))?,
        effective_date: NaiveDate::parse_from_str(&effective_date, DATE_FORMAT)
            .map_err(|error| decode_error(format!("effective_date `{effective_date}`: {error}")))?,
    })
}

#[async_trait]
impl RateLookup for SqlRateRepository {
    async fn find(
        &self,
        from: &str,
        to: &str,
        as_of: NaiveDate,
    ) -> Result<Option<ExchangeRate>, PricingError> {
        Ok(self.latest(from, to, as_of).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use pricetrail_core::pricing::rates::{ExchangeRate, RateLookup};
    use pricetrail_core::pricing::PriceCalculator;
    use pricetrail_core::PricingError;

    use super::SqlRateRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn rate(from: &str, to: &str, rate: Decimal, effective_date: NaiveDate) -> ExchangeRate {
        ExchangeRate {
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            rate,
            effective_date,
        }
    }

    #[tokio::test]
    async fn find_returns_most_recent_rate_not_after_as_of() {
        let repo = SqlRateRepository::new(setup().await);
        repo.save(&rate("CAD", "USD", Decimal::new(74, 2), date(2024, 1, 1))).await.expect("save");
        repo.save(&rate("CAD", "USD", Decimal::new(72, 2), date(2024, 4, 1))).await.expect("save");
        repo.save(&rate("CAD", "USD", Decimal::new(70, 2), date(2024, 9, 1))).await.expect("save");

        let found = repo.find("cad", "usd", date(2024, 6, 30)).await.expect("lookup");
        let found = found.expect("rate should exist");
        assert_eq!(found.rate, Decimal::new(72, 2));
        assert_eq!(found.effective_date, date(2024, 4, 1));

        let before_any = repo.find("CAD", "USD", date(2023, 6, 30)).await.expect("lookup");
        assert!(before_any.is_none());
    }

    #[tokio::test]
    async fn save_replaces_rate_for_same_day() {
        let repo = SqlRateRepository::new(setup().await);
        repo.save(&rate("EUR", "CAD", Decimal::new(145, 2), date(2024, 2, 1))).await.expect("save");
        repo.save(&rate("EUR", "CAD", Decimal::new(147, 2), date(2024, 2, 1))).await.expect("save");

        let found = repo.find("EUR", "CAD", date(2024, 2, 1)).await.expect("lookup");
        assert_eq!(found.map(|rate| rate.rate), Some(Decimal::new(147, 2)));
    }

    #[tokio::test]
    async fn calculator_converts_through_stored_rates() {
        let repo = SqlRateRepository::new(setup().await);
        repo.save(&rate("CAD", "EUR", Decimal::new(68, 2), date(2024, 1, 1))).await.expect("save");
        let calculator = PriceCalculator::new(repo);

        let converted = calculator
            .convert_currency(Decimal::new(10_000, 2), "CAD", "EUR", date(2024, 3, 1))
            .await
            .expect("convert");
        assert_eq!(converted, Decimal::new(6_800, 2));

        let missing =
            calculator.convert_currency(Decimal::ONE, "CAD", "JPY", date(2024, 3, 1)).await;
        assert!(matches!(missing, Err(PricingError::RateNotFound { .. })));
    }
}

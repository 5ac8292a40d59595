use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use pricetrail_core::domain::snapshot::{
    ApprovalStatus, PriceSnapshot, PricingModelId, PricingTierId, ServiceId, ServicePriceId,
    UserId,
};

use super::{decode_error, RepositoryError};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reads and writes `service_price` rows as [`PriceSnapshot`]s, so callers
/// can capture the before and after state of an edit for the audit engine.
#[derive(Clone)]
pub struct SqlPriceRecordRepository {
    pool: DbPool,
}

impl SqlPriceRecordRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        id: ServicePriceId,
    ) -> Result<Option<PriceSnapshot>, RepositoryError> {
        let row = sqlx::query(
            "SELECT amount, setup_fee, currency, unit, valid_from, valid_to, is_current,
                    service_id, pricing_tier_id, pricing_model_id, approval_status,
                    approved_by, approved_at
             FROM service_price WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_snapshot).transpose()
    }

    /// Rejects an invalid snapshot before touching the table.
    pub async fn insert(&self, snapshot: &PriceSnapshot) -> Result<ServicePriceId, RepositoryError> {
        snapshot.validate()?;
        let columns = SnapshotColumns::from(snapshot);
        let result = sqlx::query(
            "INSERT INTO service_price (amount, setup_fee, currency, unit, valid_from, valid_to,
                                        is_current, service_id, pricing_tier_id, pricing_model_id,
                                        approval_status, approved_by, approved_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(columns.amount)
        .bind(columns.setup_fee)
        .bind(columns.currency)
        .bind(columns.unit)
        .bind(columns.valid_from)
        .bind(columns.valid_to)
        .bind(columns.is_current)
        .bind(columns.service_id)
        .bind(columns.pricing_tier_id)
        .bind(columns.pricing_model_id)
        .bind(columns.approval_status)
        .bind(columns.approved_by)
        .bind(columns.approved_at)
        .execute(&self.pool)
        .await?;

        Ok(ServicePriceId(result.last_insert_rowid()))
    }

    /// Returns `false` when no row has the id. An invalid snapshot is an
    /// error even when the row is missing.
    pub async fn update(
        &self,
        id: ServicePriceId,
        snapshot: &PriceSnapshot,
    ) -> Result<bool, RepositoryError> {
        snapshot.validate()?;
        let columns = SnapshotColumns::from(snapshot);
        let result = sqlx::query(
            "UPDATE service_price SET
                 amount = ?, setup_fee = ?, currency = ?, unit = ?, valid_from = ?, valid_to = ?,
                 is_current = ?, service_id = ?, pricing_tier_id = ?, pricing_model_id = ?,
                 approval_status = ?, approved_by = ?, approved_at = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(columns.amount)
        .bind(columns.setup_fee)
        .bind(columns.currency)
        .bind(columns.unit)
        .bind(columns.valid_from)
        .bind(columns.valid_to)
        .bind(columns.is_current)
        .bind(columns.service_id)
        .bind(columns.pricing_tier_id)
        .bind(columns.pricing_model_id)
        .bind(columns.approval_status)
        .bind(columns.approved_by)
        .bind(columns.approved_at)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: ServicePriceId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM service_price WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

struct SnapshotColumns {
    amount: Option<String>,
    setup_fee: Option<String>,
    currency: Option<String>,
    unit: Option<String>,
    valid_from: Option<String>,
    valid_to: Option<String>,
    is_current: bool,
    service_id: Option<i64>,
    pricing_tier_id: Option<i64>,
    pricing_model_id: Option<i64>,
    approval_status: Option<&'static str>,
    approved_by: Option<i64>,
    approved_at: Option<String>,
}

impl From<&PriceSnapshot> for SnapshotColumns {
    fn from(snapshot: &PriceSnapshot) -> Self {
        Self {
            amount: snapshot.amount.map(|amount| amount.to_string()),
            setup_fee: snapshot.setup_fee.map(|fee| fee.to_string()),
            currency: snapshot.currency.clone(),
            unit: snapshot.unit.clone(),
            valid_from: snapshot.valid_from.map(|date| date.format(DATE_FORMAT).to_string()),
            valid_to: snapshot.valid_to.map(|date| date.format(DATE_FORMAT).to_string()),
            is_current: snapshot.is_current.unwrap_or(false),
            service_id: snapshot.service_id.map(|id| id.0),
            pricing_tier_id: snapshot.pricing_tier_id.map(|id| id.0),
            pricing_model_id: snapshot.pricing_model_id.map(|id| id.0),
            approval_status: snapshot.approval_status.map(ApprovalStatus::as_str),
            approved_by: snapshot.approved_by.map(|id| id.0),
            approved_at: snapshot
                .approved_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

fn row_to_snapshot(row: &SqliteRow) -> Result<PriceSnapshot, RepositoryError> {
    let text = |column: &str| -> Result<Option<String>, RepositoryError> {
        row.try_get::<Option<String>, _>(column).map_err(decode_error)
    };
    let id = |column: &str| -> Result<Option<i64>, RepositoryError> {
        row.try_get::<Option<i64>, _>(column).map_err(decode_error)
    };

    Ok(PriceSnapshot {
        amount: text("amount")?.map(|raw| parse_decimal("amount", &raw)).transpose()?,
        setup_fee: text("setup_fee")?.map(|raw| parse_decimal("setup_fee", &raw)).transpose()?,
        currency: text("currency")?,
        unit: text("unit")?,
        valid_from: text("valid_from")?.map(|raw| parse_date("valid_from", &raw)).transpose()?,
        valid_to: text("valid_to")?.map(|raw| parse_date("valid_to", &raw)).transpose()?,
        is_current: Some(row.try_get::<bool, _>("is_current").map_err(decode_error)?),
        service_id: id("service_id")?.map(ServiceId),
        pricing_tier_id: id("pricing_tier_id")?.map(PricingTierId),
        pricing_model_id: id("pricing_model_id")?.map(PricingModelId),
        approval_status: text("approval_status")?
            .map(|raw| ApprovalStatus::from_str(&raw).map_err(decode_error))
            .transpose()?,
        approved_by: id("approved_by")?.map(UserId),
        approved_at: text("approved_at")?
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|error| decode_error(format!("approved_at `{raw}`: {error}")))
            })
            .transpose()?,
    })
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw).map_err(|error| decode_error(format!("{column} `{raw}`: {error}")))
}

fn parse_date(column: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|error| decode_error(format!("{column} `{raw}`: {error}")))
}

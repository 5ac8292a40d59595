use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use pricetrail_core::audit::sink::{AuditHistory, AuditSink};
use pricetrail_core::domain::audit_record::{
    AuditRecord, AuditRecordId, ChangeType, FieldValues, NewAuditRecord,
};
use pricetrail_core::domain::field::{FieldValue, TrackableField};
use pricetrail_core::domain::snapshot::{ServicePriceId, UserId};
use pricetrail_core::errors::AuditError;

use super::{decode_error, RepositoryError};
use crate::DbPool;

const BASE_COLUMNS: [&str; 6] =
    ["id", "service_price_id", "change_type", "change_description", "changed_by", "changed_at"];
const ORDER_NEWEST_FIRST: &str = "ORDER BY changed_at DESC, id DESC";

/// `price_audit_record` rows. Insert-only: nothing here updates or deletes
/// history.
#[derive(Clone)]
pub struct SqlAuditRecordRepository {
    pool: DbPool,
}

impl SqlAuditRecordRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: NewAuditRecord) -> Result<AuditRecord, RepositoryError> {
        let changed_at = Utc::now();
        let value_columns = value_columns();
        let placeholders = vec!["?"; 5 + value_columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO price_audit_record
                 (service_price_id, change_type, change_description, changed_by, changed_at, {})
             VALUES ({placeholders})",
            value_columns.join(", ")
        );

        let mut query = sqlx::query(&sql)
            .bind(record.service_price_id.0)
            .bind(record.change_type.as_str())
            .bind(record.change_description.as_str())
            .bind(record.changed_by.0)
            .bind(timestamp_text(changed_at));
        for field in TrackableField::ALL {
            query = query
                .bind(record.old_values.get(&field).and_then(|value| value.to_column_text()))
                .bind(record.new_values.get(&field).and_then(|value| value.to_column_text()));
        }

        let result = query.execute(&self.pool).await?;
        let id = AuditRecordId(result.last_insert_rowid());

        // Match the stored precision so the returned record equals a later read.
        let changed_at = parse_timestamp(&timestamp_text(changed_at))?;
        Ok(record.into_record(id, changed_at))
    }

    pub async fn find_by_id(
        &self,
        id: AuditRecordId,
    ) -> Result<Option<AuditRecord>, RepositoryError> {
        let sql = select_sql("WHERE id = ?");
        let row = sqlx::query(&sql).bind(id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_audit_record).transpose()
    }

    pub async fn list_for_price(
        &self,
        service_price_id: ServicePriceId,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, RepositoryError> {
        let sql = select_sql(&format!("WHERE service_price_id = ? {ORDER_NEWEST_FIRST} LIMIT ?"));
        let rows = sqlx::query(&sql)
            .bind(service_price_id.0)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_audit_record).collect()
    }

    pub async fn list_recent(&self, limit: u32) -> Result<Vec<AuditRecord>, RepositoryError> {
        let sql = select_sql(&format!("{ORDER_NEWEST_FIRST} LIMIT ?"));
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_audit_record).collect()
    }

    pub async fn list_by_change_type(
        &self,
        change_type: ChangeType,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, RepositoryError> {
        let sql = select_sql(&format!("WHERE change_type = ? {ORDER_NEWEST_FIRST} LIMIT ?"));
        let rows = sqlx::query(&sql)
            .bind(change_type.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_audit_record).collect()
    }

    pub async fn list_by_actor(
        &self,
        actor: UserId,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, RepositoryError> {
        let sql = select_sql(&format!("WHERE changed_by = ? {ORDER_NEWEST_FIRST} LIMIT ?"));
        let rows = sqlx::query(&sql).bind(actor.0).bind(limit).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_audit_record).collect()
    }

    pub async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, RepositoryError> {
        let sql =
            select_sql(&format!("WHERE changed_at >= ? AND changed_at < ? {ORDER_NEWEST_FIRST}"));
        let rows = sqlx::query(&sql)
            .bind(timestamp_text(from))
            .bind(timestamp_text(to))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_audit_record).collect()
    }

    pub async fn count_by_change_type(
        &self,
        service_price_id: ServicePriceId,
    ) -> Result<BTreeMap<ChangeType, u64>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT change_type, COUNT(*) AS count
             FROM price_audit_record
             WHERE service_price_id = ?
             GROUP BY change_type",
        )
        .bind(service_price_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = BTreeMap::new();
        for row in rows {
            let change_type: String = row.try_get("change_type").map_err(decode_error)?;
            let count: i64 = row.try_get("count").map_err(decode_error)?;
            let count = u64::try_from(count).map_err(decode_error)?;
            summary.insert(parse_change_type(&change_type)?, count);
        }
        Ok(summary)
    }
}

/// The 26 `old_*` / `new_*` columns, paired per field in field order.
fn value_columns() -> Vec<&'static str> {
    TrackableField::ALL
        .into_iter()
        .flat_map(|field| [field.old_column(), field.new_column()])
        .collect()
}

fn select_sql(tail: &str) -> String {
    let mut columns: Vec<&str> = BASE_COLUMNS.to_vec();
    columns.extend(value_columns());
    format!("SELECT {} FROM price_audit_record {tail}", columns.join(", "))
}

/// Fixed-width UTC text so lexical order in SQLite matches time order.
fn timestamp_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| decode_error(format!("changed_at `{raw}`: {error}")))
}

fn parse_change_type(raw: &str) -> Result<ChangeType, RepositoryError> {
    raw.parse::<ChangeType>().map_err(decode_error)
}

fn row_to_audit_record(row: &SqliteRow) -> Result<AuditRecord, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let service_price_id: i64 = row.try_get("service_price_id").map_err(decode_error)?;
    let change_type: String = row.try_get("change_type").map_err(decode_error)?;
    let change_description: String = row.try_get("change_description").map_err(decode_error)?;
    let changed_by: i64 = row.try_get("changed_by").map_err(decode_error)?;
    let changed_at: String = row.try_get("changed_at").map_err(decode_error)?;

    let mut old_values = FieldValues::new();
    let mut new_values = FieldValues::new();
    for field in TrackableField::ALL {
        if let Some(value) = read_value(row, field, field.old_column())? {
            old_values.insert(field, value);
        }
        if let Some(value) = read_value(row, field, field.new_column())? {
            new_values.insert(field, value);
        }
    }

    Ok(AuditRecord {
        id: AuditRecordId(id),
        service_price_id: ServicePriceId(service_price_id),
        change_type: parse_change_type(&change_type)?,
        change_description,
        changed_by: UserId(changed_by),
        changed_at: parse_timestamp(&changed_at)?,
        old_values,
        new_values,
    })
}

fn read_value(
    row: &SqliteRow,
    field: TrackableField,
    column: &str,
) -> Result<Option<FieldValue>, RepositoryError> {
    let Some(text) = row.try_get::<Option<String>, _>(column).map_err(decode_error)? else {
        return Ok(None);
    };
    let value = field
        .decode_column_text(&text)
        .map_err(|error| decode_error(format!("{column}: {error}")))?;
    Ok((!value.is_absent()).then_some(value))
}

#[async_trait]
impl AuditSink for SqlAuditRecordRepository {
    async fn append(&self, record: NewAuditRecord) -> Result<AuditRecord, AuditError> {
        Ok(self.insert(record).await?)
    }
}

#[async_trait]
impl AuditHistory for SqlAuditRecordRepository {
    async fn history_for_price(
        &self,
        service_price_id: ServicePriceId,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.list_for_price(service_price_id, limit).await?)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.list_recent(limit).await?)
    }

    async fn by_change_type(
        &self,
        change_type: ChangeType,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.list_by_change_type(change_type, limit).await?)
    }

    async fn by_actor(&self, actor: UserId, limit: u32) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.list_by_actor(actor, limit).await?)
    }

    async fn between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.list_between(from, to).await?)
    }

    async fn change_summary(
        &self,
        service_price_id: ServicePriceId,
    ) -> Result<BTreeMap<ChangeType, u64>, AuditError> {
        Ok(self.count_by_change_type(service_price_id).await?)
    }
}

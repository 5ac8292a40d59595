use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::currency::{is_valid_currency_code, normalize_currency_code};
use crate::errors::SnapshotError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServicePriceId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PricingTierId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PricingModelId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    pub const SYSTEM: UserId = UserId(1);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = SnapshotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(SnapshotError::InvalidField {
                field: "approval_status".to_string(),
                reason: format!("unknown status `{other}` (expected draft|pending|approved|rejected)"),
            }),
        }
    }
}

/// Point-in-time state of a priced offering, captured by the caller before
/// and after a mutation. Every field is optional so partial snapshots (for
/// example only `amount` and `currency`) diff cleanly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub amount: Option<Decimal>,
    pub setup_fee: Option<Decimal>,
    pub currency: Option<String>,
    pub unit: Option<String>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub is_current: Option<bool>,
    pub service_id: Option<ServiceId>,
    pub pricing_tier_id: Option<PricingTierId>,
    pub pricing_model_id: Option<PricingModelId>,
    pub approval_status: Option<ApprovalStatus>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl PriceSnapshot {
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if let Some(amount) = self.amount {
            ensure_non_negative("amount", amount)?;
        }
        if let Some(setup_fee) = self.setup_fee {
            ensure_non_negative("setup_fee", setup_fee)?;
        }
        if let Some(currency) = self.currency.as_deref() {
            if !is_valid_currency_code(currency.trim()) {
                return Err(SnapshotError::InvalidField {
                    field: "currency".to_string(),
                    reason: format!("`{currency}` is not a 3-letter currency code"),
                });
            }
        }
        if let (Some(valid_from), Some(valid_to)) = (self.valid_from, self.valid_to) {
            if valid_to <= valid_from {
                return Err(SnapshotError::InvalidWindow { valid_from, valid_to });
            }
        }
        Ok(())
    }

    /// True when `date` falls inside `[valid_from, valid_to)`; an open
    /// `valid_to` never expires.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        let started = self.valid_from.map(|from| from <= date).unwrap_or(true);
        let not_ended = self.valid_to.map(|to| date < to).unwrap_or(true);
        started && not_ended
    }

    /// Builds a snapshot from a loose field map such as a form post or an ORM
    /// row dump. Types are normalized before any diffing: numeric strings
    /// become decimals, blank strings and nulls become absent, `"1"`/`"0"`
    /// become booleans, and zero ids become absent. Unknown keys are ignored.
    pub fn from_json(value: &Value) -> Result<Self, SnapshotError> {
        let fields = value.as_object().ok_or_else(|| SnapshotError::InvalidField {
            field: "snapshot".to_string(),
            reason: "expected a JSON object of field values".to_string(),
        })?;
        let get = |key: &str| fields.get(key).unwrap_or(&NULL);

        Ok(Self {
            amount: loose_decimal("amount", get("amount"))?,
            setup_fee: loose_decimal("setup_fee", get("setup_fee"))?,
            currency: loose_text("currency", get("currency"))?
                .map(|code| normalize_currency_code(&code)),
            unit: loose_text("unit", get("unit"))?,
            valid_from: loose_date("valid_from", get("valid_from"))?,
            valid_to: loose_date("valid_to", get("valid_to"))?,
            is_current: loose_bool("is_current", get("is_current"))?,
            service_id: loose_id("service_id", get("service_id"))?.map(ServiceId),
            pricing_tier_id: loose_id("pricing_tier_id", get("pricing_tier_id"))?
                .map(PricingTierId),
            pricing_model_id: loose_id("pricing_model_id", get("pricing_model_id"))?
                .map(PricingModelId),
            approval_status: loose_text("approval_status", get("approval_status"))?
                .map(|status| status.parse())
                .transpose()?,
            approved_by: loose_id("approved_by", get("approved_by"))?.map(UserId),
            approved_at: loose_timestamp("approved_at", get("approved_at"))?,
        })
    }
}

static NULL: Value = Value::Null;

fn ensure_non_negative(field: &'static str, value: Decimal) -> Result<(), SnapshotError> {
    if value < Decimal::ZERO {
        return Err(SnapshotError::NegativeAmount { field, value });
    }
    Ok(())
}

fn invalid(field: &str, reason: impl Into<String>) -> SnapshotError {
    SnapshotError::InvalidField { field: field.to_string(), reason: reason.into() }
}

fn blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn loose_decimal(field: &str, value: &Value) -> Result<Option<Decimal>, SnapshotError> {
    if blank(value) {
        return Ok(None);
    }
    let raw = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        other => return Err(invalid(field, format!("expected a decimal, got {other}"))),
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|error| invalid(field, format!("`{raw}` is not a decimal: {error}")))
}

fn loose_text(field: &str, value: &Value) -> Result<Option<String>, SnapshotError> {
    match value {
        _ if blank(value) => Ok(None),
        Value::String(text) => Ok(Some(text.trim().to_string())),
        Value::Number(number) => Ok(Some(number.to_string())),
        other => Err(invalid(field, format!("expected text, got {other}"))),
    }
}

fn loose_bool(field: &str, value: &Value) -> Result<Option<bool>, SnapshotError> {
    match value {
        _ if blank(value) => Ok(None),
        Value::Bool(flag) => Ok(Some(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            _ => Err(invalid(field, format!("expected 0 or 1, got {number}"))),
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(invalid(field, format!("`{other}` is not a boolean"))),
        },
        other => Err(invalid(field, format!("expected a boolean, got {other}"))),
    }
}

fn loose_id(field: &str, value: &Value) -> Result<Option<i64>, SnapshotError> {
    let id = match value {
        _ if blank(value) => return Ok(None),
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| invalid(field, format!("`{number}` is not an integer id")))?,
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(field, format!("`{text}` is not an integer id")))?,
        other => return Err(invalid(field, format!("expected an id, got {other}"))),
    };
    match id {
        0 => Ok(None),
        id if id < 0 => Err(invalid(field, format!("id `{id}` must be positive"))),
        id => Ok(Some(id)),
    }
}

fn loose_date(field: &str, value: &Value) -> Result<Option<NaiveDate>, SnapshotError> {
    let Some(text) = loose_text(field, value)? else {
        return Ok(None);
    };
    if text.starts_with("0000-00-00") {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    parse_timestamp(&text)
        .map(|at| Some(at.date_naive()))
        .ok_or_else(|| invalid(field, format!("`{text}` is not a date")))
}

fn loose_timestamp(field: &str, value: &Value) -> Result<Option<DateTime<Utc>>, SnapshotError> {
    let Some(text) = loose_text(field, value)? else {
        return Ok(None);
    };
    if text.starts_with("0000-00-00") {
        return Ok(None);
    }
    parse_timestamp(&text)
        .map(Some)
        .ok_or_else(|| invalid(field, format!("`{text}` is not a timestamp")))
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").ok().map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{ApprovalStatus, PriceSnapshot, ServiceId, UserId};
    use crate::errors::SnapshotError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn valid_to_must_follow_valid_from() {
        let snapshot = PriceSnapshot {
            valid_from: Some(date(2024, 6, 1)),
            valid_to: Some(date(2024, 6, 1)),
            ..PriceSnapshot::default()
        };
        assert!(matches!(snapshot.validate(), Err(SnapshotError::InvalidWindow { .. })));

        let open_ended =
            PriceSnapshot { valid_from: Some(date(2024, 6, 1)), ..PriceSnapshot::default() };
        assert!(open_ended.validate().is_ok());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let snapshot =
            PriceSnapshot { setup_fee: Some(Decimal::new(-5, 0)), ..PriceSnapshot::default() };
        assert!(matches!(
            snapshot.validate(),
            Err(SnapshotError::NegativeAmount { field: "setup_fee", .. })
        ));
    }

    #[test]
    fn validity_window_is_half_open() {
        let snapshot = PriceSnapshot {
            valid_from: Some(date(2024, 1, 1)),
            valid_to: Some(date(2024, 2, 1)),
            ..PriceSnapshot::default()
        };
        assert!(snapshot.is_valid_on(date(2024, 1, 1)));
        assert!(snapshot.is_valid_on(date(2024, 1, 31)));
        assert!(!snapshot.is_valid_on(date(2024, 2, 1)));
        assert!(!snapshot.is_valid_on(date(2023, 12, 31)));
    }

    #[test]
    fn from_json_normalizes_loose_types() {
        let snapshot = PriceSnapshot::from_json(&json!({
            "amount": "100",
            "setup_fee": "",
            "currency": "cad",
            "unit": "hour",
            "valid_from": "2024-01-01",
            "valid_to": "0000-00-00",
            "is_current": "1",
            "service_id": "12",
            "pricing_tier_id": 0,
            "approval_status": "Approved",
            "approved_by": 7,
            "approved_at": "2024-01-02 10:30:00",
            "ignored_column": "whatever"
        }))
        .expect("loose snapshot");

        assert_eq!(snapshot.amount, Some(Decimal::new(10_000, 2)));
        assert_eq!(snapshot.setup_fee, None);
        assert_eq!(snapshot.currency.as_deref(), Some("CAD"));
        assert_eq!(snapshot.valid_to, None);
        assert_eq!(snapshot.is_current, Some(true));
        assert_eq!(snapshot.service_id, Some(ServiceId(12)));
        assert_eq!(snapshot.pricing_tier_id, None);
        assert_eq!(snapshot.approval_status, Some(ApprovalStatus::Approved));
        assert_eq!(snapshot.approved_by, Some(UserId(7)));
        assert!(snapshot.approved_at.is_some());
    }

    #[test]
    fn from_json_rejects_garbage_values() {
        let error = PriceSnapshot::from_json(&json!({ "amount": "one hundred" }))
            .expect_err("non-numeric amount");
        assert!(matches!(error, SnapshotError::InvalidField { ref field, .. } if field == "amount"));

        let error = PriceSnapshot::from_json(&json!({ "approval_status": "archived" }))
            .expect_err("unknown status");
        assert!(
            matches!(error, SnapshotError::InvalidField { ref field, .. } if field == "approval_status")
        );
    }
}

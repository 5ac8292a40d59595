use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::snapshot::{ApprovalStatus, PriceSnapshot};
use crate::errors::SnapshotError;

/// The trackable fields of a price, in the order change sets and audit
/// descriptions list them. `Ord` follows declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackableField {
    Amount,
    SetupFee,
    Currency,
    Unit,
    ValidFrom,
    ValidTo,
    IsCurrent,
    ServiceId,
    PricingTierId,
    PricingModelId,
    ApprovalStatus,
    ApprovedBy,
    ApprovedAt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Service,
    PricingTier,
    PricingModel,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::PricingTier => "pricing_tier",
            Self::PricingModel => "pricing_model",
        }
    }
}

/// How a field is rendered in an audit description.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Money,
    Entity(EntityKind),
    User,
    Plain,
}

impl TrackableField {
    pub const ALL: [TrackableField; 13] = [
        Self::Amount,
        Self::SetupFee,
        Self::Currency,
        Self::Unit,
        Self::ValidFrom,
        Self::ValidTo,
        Self::IsCurrent,
        Self::ServiceId,
        Self::PricingTierId,
        Self::PricingModelId,
        Self::ApprovalStatus,
        Self::ApprovedBy,
        Self::ApprovedAt,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::SetupFee => "setup_fee",
            Self::Currency => "currency",
            Self::Unit => "unit",
            Self::ValidFrom => "valid_from",
            Self::ValidTo => "valid_to",
            Self::IsCurrent => "is_current",
            Self::ServiceId => "service_id",
            Self::PricingTierId => "pricing_tier_id",
            Self::PricingModelId => "pricing_model_id",
            Self::ApprovalStatus => "approval_status",
            Self::ApprovedBy => "approved_by",
            Self::ApprovedAt => "approved_at",
        }
    }

    pub fn old_column(self) -> &'static str {
        match self {
            Self::Amount => "old_amount",
            Self::SetupFee => "old_setup_fee",
            Self::Currency => "old_currency",
            Self::Unit => "old_unit",
            Self::ValidFrom => "old_valid_from",
            Self::ValidTo => "old_valid_to",
            Self::IsCurrent => "old_is_current",
            Self::ServiceId => "old_service_id",
            Self::PricingTierId => "old_pricing_tier_id",
            Self::PricingModelId => "old_pricing_model_id",
            Self::ApprovalStatus => "old_approval_status",
            Self::ApprovedBy => "old_approved_by",
            Self::ApprovedAt => "old_approved_at",
        }
    }

    pub fn new_column(self) -> &'static str {
        match self {
            Self::Amount => "new_amount",
            Self::SetupFee => "new_setup_fee",
            Self::Currency => "new_currency",
            Self::Unit => "new_unit",
            Self::ValidFrom => "new_valid_from",
            Self::ValidTo => "new_valid_to",
            Self::IsCurrent => "new_is_current",
            Self::ServiceId => "new_service_id",
            Self::PricingTierId => "new_pricing_tier_id",
            Self::PricingModelId => "new_pricing_model_id",
            Self::ApprovalStatus => "new_approval_status",
            Self::ApprovedBy => "new_approved_by",
            Self::ApprovedAt => "new_approved_at",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Amount => "Amount",
            Self::SetupFee => "Setup Fee",
            Self::Currency => "Currency",
            Self::Unit => "Unit",
            Self::ValidFrom => "Valid From",
            Self::ValidTo => "Valid To",
            Self::IsCurrent => "Current",
            Self::ServiceId => "Service",
            Self::PricingTierId => "Pricing Tier",
            Self::PricingModelId => "Pricing Model",
            Self::ApprovalStatus => "Approval Status",
            Self::ApprovedBy => "Approved By",
            Self::ApprovedAt => "Approved At",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::Amount | Self::SetupFee => FieldKind::Money,
            Self::ServiceId => FieldKind::Entity(EntityKind::Service),
            Self::PricingTierId => FieldKind::Entity(EntityKind::PricingTier),
            Self::PricingModelId => FieldKind::Entity(EntityKind::PricingModel),
            Self::ApprovedBy => FieldKind::User,
            _ => FieldKind::Plain,
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.column() == column)
    }

    /// Reads the raw value of this field; blank text is reported as absent.
    pub fn value_of(self, snapshot: &PriceSnapshot) -> FieldValue {
        match self {
            Self::Amount => snapshot.amount.map(FieldValue::Money).into(),
            Self::SetupFee => snapshot.setup_fee.map(FieldValue::Money).into(),
            Self::Currency => text_value(snapshot.currency.as_deref()),
            Self::Unit => text_value(snapshot.unit.as_deref()),
            Self::ValidFrom => snapshot.valid_from.map(FieldValue::Date).into(),
            Self::ValidTo => snapshot.valid_to.map(FieldValue::Date).into(),
            Self::IsCurrent => snapshot.is_current.map(FieldValue::Flag).into(),
            Self::ServiceId => snapshot.service_id.map(|id| FieldValue::Id(id.0)).into(),
            Self::PricingTierId => snapshot.pricing_tier_id.map(|id| FieldValue::Id(id.0)).into(),
            Self::PricingModelId => {
                snapshot.pricing_model_id.map(|id| FieldValue::Id(id.0)).into()
            }
            Self::ApprovalStatus => snapshot.approval_status.map(FieldValue::Status).into(),
            Self::ApprovedBy => snapshot.approved_by.map(|id| FieldValue::Id(id.0)).into(),
            Self::ApprovedAt => snapshot.approved_at.map(FieldValue::Timestamp).into(),
        }
    }

    /// Parses text read back from an `old_*` / `new_*` audit column using the
    /// same loose rules as [`PriceSnapshot::from_json`].
    pub fn decode_column_text(self, text: &str) -> Result<FieldValue, SnapshotError> {
        let mut fields = Map::new();
        fields.insert(self.column().to_string(), Value::String(text.to_string()));
        let snapshot = PriceSnapshot::from_json(&Value::Object(fields))?;
        Ok(self.value_of(&snapshot))
    }
}

impl fmt::Display for TrackableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

fn text_value(value: Option<&str>) -> FieldValue {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => FieldValue::Text(text.to_string()),
        _ => FieldValue::Absent,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum FieldValue {
    Absent,
    Money(Decimal),
    Text(String),
    Flag(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Id(i64),
    Status(ApprovalStatus),
}

impl From<Option<FieldValue>> for FieldValue {
    fn from(value: Option<FieldValue>) -> Self {
        value.unwrap_or(FieldValue::Absent)
    }
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Absent values compare equal to the zero value of their column type:
    /// a null setup fee equals `0`, a null flag equals `false`, and a null
    /// id equals `0`. Everything else compares by normalized value, so
    /// `100` and `100.00` are equal.
    pub fn loosely_eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (Self::Absent, Self::Absent) => true,
            (Self::Absent, value) | (value, Self::Absent) => value.is_zero_like(),
            (left, right) => left == right,
        }
    }

    fn is_zero_like(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Money(amount) => amount.is_zero(),
            Self::Text(text) => text.trim().is_empty(),
            Self::Flag(flag) => !flag,
            Self::Id(id) => *id == 0,
            Self::Date(_) | Self::Timestamp(_) | Self::Status(_) => false,
        }
    }

    pub fn as_money(&self) -> Option<Decimal> {
        match self {
            Self::Money(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) if *id > 0 => Some(*id),
            _ => None,
        }
    }

    /// Text stored in the `old_*` / `new_*` audit columns.
    pub fn to_column_text(&self) -> Option<String> {
        match self {
            Self::Absent => None,
            Self::Money(amount) => Some(amount.normalize().to_string()),
            Self::Text(text) => Some(text.clone()),
            Self::Flag(flag) => Some(if *flag { "1" } else { "0" }.to_string()),
            Self::Date(date) => Some(date.format("%Y-%m-%d").to_string()),
            Self::Timestamp(at) => Some(at.to_rfc3339()),
            Self::Id(id) => Some(id.to_string()),
            Self::Status(status) => Some(status.as_str().to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("N/A"),
            Self::Money(amount) => write!(f, "{}", amount.normalize()),
            Self::Text(text) => f.write_str(text),
            Self::Flag(flag) => f.write_str(if *flag { "Yes" } else { "No" }),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Timestamp(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M:%S")),
            Self::Id(id) => write!(f, "{id}"),
            Self::Status(status) => f.write_str(status.as_str()),
        }
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::field::{FieldValue, TrackableField};
use crate::domain::snapshot::{ServicePriceId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuditRecordId(pub i64);

/// Closed classification of a recorded price change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Deleted,
    AmountChanged,
    CurrencyChanged,
    UnitChanged,
    TierChanged,
    ModelChanged,
    StatusChanged,
    ApprovalChanged,
    DatesChanged,
    MultiUpdate,
    Updated,
}

impl ChangeType {
    pub const ALL: [ChangeType; 12] = [
        Self::Created,
        Self::Deleted,
        Self::AmountChanged,
        Self::CurrencyChanged,
        Self::UnitChanged,
        Self::TierChanged,
        Self::ModelChanged,
        Self::StatusChanged,
        Self::ApprovalChanged,
        Self::DatesChanged,
        Self::MultiUpdate,
        Self::Updated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Deleted => "deleted",
            Self::AmountChanged => "amount_changed",
            Self::CurrencyChanged => "currency_changed",
            Self::UnitChanged => "unit_changed",
            Self::TierChanged => "tier_changed",
            Self::ModelChanged => "model_changed",
            Self::StatusChanged => "status_changed",
            Self::ApprovalChanged => "approval_changed",
            Self::DatesChanged => "dates_changed",
            Self::MultiUpdate => "multi_update",
            Self::Updated => "updated",
        }
    }

    /// Created and deleted are requested by the caller and never derived.
    pub fn is_lifecycle(self) -> bool {
        matches!(self, Self::Created | Self::Deleted)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown change type `{0}`")]
pub struct UnknownChangeType(pub String);

impl FromStr for ChangeType {
    type Err = UnknownChangeType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|change_type| change_type.as_str() == normalized)
            .ok_or(UnknownChangeType(normalized))
    }
}

/// Old or new side of an audit record, keyed by field in fixed order.
pub type FieldValues = BTreeMap<TrackableField, FieldValue>;

/// An audit entry that has not been persisted yet; the sink assigns `id`
/// and `changed_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    pub service_price_id: ServicePriceId,
    pub change_type: ChangeType,
    pub change_description: String,
    pub changed_by: UserId,
    pub old_values: FieldValues,
    pub new_values: FieldValues,
}

impl NewAuditRecord {
    pub fn into_record(self, id: AuditRecordId, changed_at: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            id,
            service_price_id: self.service_price_id,
            change_type: self.change_type,
            change_description: self.change_description,
            changed_by: self.changed_by,
            changed_at,
            old_values: self.old_values,
            new_values: self.new_values,
        }
    }
}

/// A persisted price change. There are no update or delete operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub service_price_id: ServicePriceId,
    pub change_type: ChangeType,
    pub change_description: String,
    pub changed_by: UserId,
    pub changed_at: DateTime<Utc>,
    pub old_values: FieldValues,
    pub new_values: FieldValues,
}

static ABSENT: FieldValue = FieldValue::Absent;

impl AuditRecord {
    pub fn old_value(&self, field: TrackableField) -> &FieldValue {
        self.old_values.get(&field).unwrap_or(&ABSENT)
    }

    pub fn new_value(&self, field: TrackableField) -> &FieldValue {
        self.new_values.get(&field).unwrap_or(&ABSENT)
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeType, UnknownChangeType};

    #[test]
    fn change_type_round_trips_through_storage_text() {
        for change_type in ChangeType::ALL {
            assert_eq!(change_type.as_str().parse::<ChangeType>(), Ok(change_type));
        }
        assert_eq!(" Amount_Changed ".parse::<ChangeType>(), Ok(ChangeType::AmountChanged));

        let error = "Price_Bumped".parse::<ChangeType>().expect_err("not a change type");
        assert_eq!(error, UnknownChangeType("price_bumped".to_string()));
        assert_eq!(error.to_string(), "unknown change type `price_bumped`");
    }

    #[test]
    fn only_created_and_deleted_are_lifecycle_types() {
        let lifecycle: Vec<ChangeType> =
            ChangeType::ALL.into_iter().filter(|change_type| change_type.is_lifecycle()).collect();
        assert_eq!(lifecycle, vec![ChangeType::Created, ChangeType::Deleted]);
    }
}

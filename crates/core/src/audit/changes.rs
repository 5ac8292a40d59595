use serde::{Deserialize, Serialize};

use crate::domain::audit_record::{ChangeType, FieldValues};
use crate::domain::field::{FieldValue, TrackableField};
use crate::domain::snapshot::PriceSnapshot;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: TrackableField,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Fields whose values differ between two snapshots, in trackable-field
/// order regardless of how the snapshots were built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter()
    }

    pub fn get(&self, field: TrackableField) -> Option<&FieldChange> {
        self.changes.iter().find(|change| change.field == field)
    }

    pub fn contains(&self, field: TrackableField) -> bool {
        self.get(field).is_some()
    }

    pub fn fields(&self) -> Vec<TrackableField> {
        self.changes.iter().map(|change| change.field).collect()
    }

    pub fn old_values(&self) -> FieldValues {
        self.changes
            .iter()
            .filter(|change| !change.old.is_absent())
            .map(|change| (change.field, change.old.clone()))
            .collect()
    }

    pub fn new_values(&self) -> FieldValues {
        self.changes
            .iter()
            .filter(|change| !change.new.is_absent())
            .map(|change| (change.field, change.new.clone()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a FieldChange;
    type IntoIter = std::slice::Iter<'a, FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Compares every trackable field using loose equality (see
/// [`FieldValue::loosely_eq`]). Total: never fails, and a snapshot compared
/// with itself yields an empty set.
pub fn detect_changes(old: &PriceSnapshot, new: &PriceSnapshot) -> ChangeSet {
    let changes = TrackableField::ALL
        .into_iter()
        .filter_map(|field| {
            let old_value = field.value_of(old);
            let new_value = field.value_of(new);
            if old_value.loosely_eq(&new_value) {
                return None;
            }
            Some(FieldChange { field, old: old_value, new: new_value })
        })
        .collect();

    ChangeSet { changes }
}

/// Every present field of one snapshot; used for the full side of created
/// and deleted records.
pub fn present_values(snapshot: &PriceSnapshot) -> FieldValues {
    TrackableField::ALL
        .into_iter()
        .map(|field| (field, field.value_of(snapshot)))
        .filter(|(_, value)| !value.is_absent())
        .collect()
}

pub fn classify(requested: ChangeType, change_set: &ChangeSet) -> ChangeType {
    if requested.is_lifecycle() {
        return requested;
    }

    let mut changes = change_set.iter();
    let (Some(only), None) = (changes.next(), changes.next()) else {
        return if change_set.is_empty() { ChangeType::Updated } else { ChangeType::MultiUpdate };
    };

    match only.field {
        TrackableField::Amount | TrackableField::SetupFee => ChangeType::AmountChanged,
        TrackableField::Currency => ChangeType::CurrencyChanged,
        TrackableField::Unit => ChangeType::UnitChanged,
        TrackableField::PricingTierId | TrackableField::ServiceId => ChangeType::TierChanged,
        TrackableField::PricingModelId => ChangeType::ModelChanged,
        TrackableField::ApprovalStatus => ChangeType::StatusChanged,
        TrackableField::ApprovedBy | TrackableField::ApprovedAt => ChangeType::ApprovalChanged,
        TrackableField::ValidFrom | TrackableField::ValidTo | TrackableField::IsCurrent => {
            ChangeType::DatesChanged
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{classify, detect_changes, present_values};
    use crate::domain::audit_record::ChangeType;
    use crate::domain::field::{FieldValue, TrackableField};
    use crate::domain::snapshot::{
        ApprovalStatus, PriceSnapshot, PricingModelId, PricingTierId, ServiceId, UserId,
    };

    fn full_snapshot() -> PriceSnapshot {
        PriceSnapshot {
            amount: Some(Decimal::new(12_500, 2)),
            setup_fee: Some(Decimal::new(5_000, 2)),
            currency: Some("CAD".to_string()),
            unit: Some("hour".to_string()),
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1),
            valid_to: NaiveDate::from_ymd_opt(2024, 12, 31),
            is_current: Some(true),
            service_id: Some(ServiceId(4)),
            pricing_tier_id: Some(PricingTierId(2)),
            pricing_model_id: Some(PricingModelId(9)),
            approval_status: Some(ApprovalStatus::Approved),
            approved_by: Some(UserId(7)),
            approved_at: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).single(),
        }
    }

    fn amount_only(amount: i64, currency: &str) -> PriceSnapshot {
        PriceSnapshot {
            amount: Some(Decimal::new(amount, 0)),
            currency: Some(currency.to_string()),
            ..PriceSnapshot::default()
        }
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let snapshot = full_snapshot();
        assert!(detect_changes(&snapshot, &snapshot).is_empty());
        assert!(detect_changes(&PriceSnapshot::default(), &PriceSnapshot::default()).is_empty());
    }

    #[test]
    fn changes_follow_trackable_field_order() {
        let old = full_snapshot();
        let new = PriceSnapshot {
            approved_by: Some(UserId(8)),
            unit: Some("day".to_string()),
            amount: Some(Decimal::new(130, 0)),
            ..full_snapshot()
        };

        let changes = detect_changes(&old, &new);
        assert_eq!(
            changes.fields(),
            vec![TrackableField::Amount, TrackableField::Unit, TrackableField::ApprovedBy]
        );
        let amount = changes.get(TrackableField::Amount).expect("amount change");
        assert_eq!(amount.old, FieldValue::Money(Decimal::new(12_500, 2)));
        assert_eq!(amount.new, FieldValue::Money(Decimal::new(130, 0)));
    }

    #[test]
    fn loose_comparison_ignores_representation_drift() {
        let old = PriceSnapshot {
            amount: Some(Decimal::new(100, 0)),
            setup_fee: None,
            unit: Some(String::new()),
            is_current: None,
            ..PriceSnapshot::default()
        };
        let new = PriceSnapshot {
            amount: Some(Decimal::new(10_000, 2)),
            setup_fee: Some(Decimal::ZERO),
            unit: None,
            is_current: Some(false),
            ..PriceSnapshot::default()
        };

        assert!(detect_changes(&old, &new).is_empty());
    }

    #[test]
    fn clearing_a_field_is_a_change() {
        let old = full_snapshot();
        let new = PriceSnapshot { valid_to: None, ..full_snapshot() };

        let changes = detect_changes(&old, &new);
        assert_eq!(changes.fields(), vec![TrackableField::ValidTo]);
        assert!(changes.new_values().is_empty());
        assert_eq!(changes.old_values().len(), 1);
    }

    #[test]
    fn created_and_deleted_take_precedence() {
        let old = amount_only(100, "CAD");
        let new = amount_only(150, "USD");
        let changes = detect_changes(&old, &new);

        assert_eq!(classify(ChangeType::Created, &changes), ChangeType::Created);
        assert_eq!(classify(ChangeType::Deleted, &changes), ChangeType::Deleted);
        assert_eq!(classify(ChangeType::Deleted, &Default::default()), ChangeType::Deleted);
    }

    #[test]
    fn empty_set_is_updated_and_many_fields_are_multi_update() {
        assert_eq!(classify(ChangeType::Updated, &Default::default()), ChangeType::Updated);
        assert_eq!(classify(ChangeType::AmountChanged, &Default::default()), ChangeType::Updated);

        let changes = detect_changes(&amount_only(100, "CAD"), &amount_only(150, "USD"));
        assert_eq!(classify(ChangeType::Updated, &changes), ChangeType::MultiUpdate);
    }

    #[test]
    fn single_field_maps_to_specific_type() {
        let base = full_snapshot();
        let cases = [
            (PriceSnapshot { amount: Some(Decimal::ONE), ..base.clone() }, ChangeType::AmountChanged),
            (PriceSnapshot { setup_fee: None, ..base.clone() }, ChangeType::AmountChanged),
            (PriceSnapshot { currency: Some("USD".into()), ..base.clone() }, ChangeType::CurrencyChanged),
            (PriceSnapshot { unit: Some("day".into()), ..base.clone() }, ChangeType::UnitChanged),
            (PriceSnapshot { service_id: Some(ServiceId(5)), ..base.clone() }, ChangeType::TierChanged),
            (
                PriceSnapshot { pricing_tier_id: Some(PricingTierId(3)), ..base.clone() },
                ChangeType::TierChanged,
            ),
            (
                PriceSnapshot { pricing_model_id: Some(PricingModelId(1)), ..base.clone() },
                ChangeType::ModelChanged,
            ),
            (
                PriceSnapshot { approval_status: Some(ApprovalStatus::Rejected), ..base.clone() },
                ChangeType::StatusChanged,
            ),
            (PriceSnapshot { approved_by: None, ..base.clone() }, ChangeType::ApprovalChanged),
            (PriceSnapshot { approved_at: None, ..base.clone() }, ChangeType::ApprovalChanged),
            (PriceSnapshot { valid_from: None, ..base.clone() }, ChangeType::DatesChanged),
            (PriceSnapshot { is_current: Some(false), ..base.clone() }, ChangeType::DatesChanged),
        ];

        for (new, expected) in cases {
            let changes = detect_changes(&base, &new);
            assert_eq!(changes.len(), 1, "expected a single change for {expected}");
            assert_eq!(classify(ChangeType::Updated, &changes), expected);
        }
    }

    #[test]
    fn present_values_skip_absent_fields() {
        let values = present_values(&amount_only(100, "CAD"));
        assert_eq!(
            values.keys().copied().collect::<Vec<_>>(),
            vec![TrackableField::Amount, TrackableField::Currency]
        );
    }
}

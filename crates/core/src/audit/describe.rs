use crate::audit::changes::{ChangeSet, FieldChange};
use crate::audit::lookup::{EntityNameLookup, UserNameLookup};
use crate::domain::audit_record::ChangeType;
use crate::domain::currency::{format_money, DEFAULT_CURRENCY};
use crate::domain::field::{EntityKind, FieldKind, FieldValue};
use crate::domain::snapshot::{PriceSnapshot, UserId};

pub const CLAUSE_SEPARATOR: &str = " | ";
pub const MISSING_VALUE: &str = "N/A";

/// Renders audit descriptions. Name lookups that miss render as `N/A`, so
/// description generation always completes.
pub struct ChangeDescriber<'a> {
    entities: &'a dyn EntityNameLookup,
    users: &'a dyn UserNameLookup,
    fallback_currency: &'a str,
}

impl<'a> ChangeDescriber<'a> {
    pub fn new(entities: &'a dyn EntityNameLookup, users: &'a dyn UserNameLookup) -> Self {
        Self { entities, users, fallback_currency: DEFAULT_CURRENCY }
    }

    /// Currency used to format amounts when a snapshot carries none.
    pub fn with_fallback_currency(mut self, currency: &'a str) -> Self {
        self.fallback_currency = currency;
        self
    }

    pub async fn describe(
        &self,
        change_type: ChangeType,
        change_set: &ChangeSet,
        old: &PriceSnapshot,
        new: &PriceSnapshot,
        reason: Option<&str>,
    ) -> String {
        let mut clauses = Vec::new();

        match change_type {
            ChangeType::Created => clauses.push(self.created_clause(new)),
            ChangeType::Deleted => clauses.push("Price deleted".to_string()),
            _ => {
                for change in change_set {
                    clauses.push(self.field_clause(change, old, new).await);
                }
            }
        }

        if let Some(reason) = reason.map(str::trim).filter(|reason| !reason.is_empty()) {
            clauses.push(format!("Reason: {reason}"));
        }

        clauses.join(CLAUSE_SEPARATOR)
    }

    fn created_clause(&self, new: &PriceSnapshot) -> String {
        match new.amount {
            Some(amount) => {
                let currency = self.currency_of(new);
                format!("Price created: {} {currency}", format_money(amount, currency))
            }
            None => "Price created".to_string(),
        }
    }

    async fn field_clause(
        &self,
        change: &FieldChange,
        old: &PriceSnapshot,
        new: &PriceSnapshot,
    ) -> String {
        let (before, after) = match change.field.kind() {
            FieldKind::Money => (
                self.money(&change.old, self.currency_of(old)),
                self.money(&change.new, self.currency_of(new)),
            ),
            FieldKind::Entity(kind) => {
                (self.entity_name(kind, &change.old).await, self.entity_name(kind, &change.new).await)
            }
            FieldKind::User => (self.user(&change.old).await, self.user(&change.new).await),
            FieldKind::Plain => (change.old.to_string(), change.new.to_string()),
        };

        format!("{}: {before} → {after}", change.field.label())
    }

    fn currency_of<'s>(&'s self, snapshot: &'s PriceSnapshot) -> &'s str {
        snapshot
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .unwrap_or(self.fallback_currency)
    }

    fn money(&self, value: &FieldValue, currency: &str) -> String {
        match value.as_money() {
            Some(amount) => format_money(amount, currency),
            None => MISSING_VALUE.to_string(),
        }
    }

    async fn entity_name(&self, kind: EntityKind, value: &FieldValue) -> String {
        let Some(id) = value.as_id() else {
            return MISSING_VALUE.to_string();
        };
        self.entities.name_of(kind, id).await.unwrap_or_else(|| MISSING_VALUE.to_string())
    }

    async fn user(&self, value: &FieldValue) -> String {
        let Some(id) = value.as_id() else {
            return MISSING_VALUE.to_string();
        };
        self.users.user_name(UserId(id)).await.unwrap_or_else(|| MISSING_VALUE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::ChangeDescriber;
    use crate::audit::changes::{classify, detect_changes};
    use crate::audit::lookup::StaticNameDirectory;
    use crate::domain::audit_record::ChangeType;
    use crate::domain::field::EntityKind;
    use crate::domain::snapshot::{PriceSnapshot, PricingTierId, ServiceId, UserId};

    fn priced(amount: i64, currency: &str) -> PriceSnapshot {
        PriceSnapshot {
            amount: Some(Decimal::new(amount, 2)),
            currency: Some(currency.to_string()),
            ..PriceSnapshot::default()
        }
    }

    async fn describe(
        directory: &StaticNameDirectory,
        requested: ChangeType,
        old: &PriceSnapshot,
        new: &PriceSnapshot,
        reason: Option<&str>,
    ) -> String {
        let changes = detect_changes(old, new);
        let change_type = classify(requested, &changes);
        ChangeDescriber::new(directory, directory)
            .describe(change_type, &changes, old, new, reason)
            .await
    }

    #[tokio::test]
    async fn amount_clause_uses_formatted_currency() {
        let directory = StaticNameDirectory::default();
        let text = describe(
            &directory,
            ChangeType::Updated,
            &priced(123_456, "CAD"),
            &priced(150_000, "CAD"),
            None,
        )
        .await;

        assert_eq!(text, "Amount: $1,234.56 → $1,500.00");
    }

    #[tokio::test]
    async fn multiple_clauses_are_pipe_delimited_in_field_order() {
        let directory = StaticNameDirectory::default();
        let text = describe(
            &directory,
            ChangeType::Updated,
            &priced(10_000, "CAD"),
            &priced(15_000, "EUR"),
            Some("annual review"),
        )
        .await;

        assert_eq!(text, "Amount: $100.00 → €150.00 | Currency: CAD → EUR | Reason: annual review");
    }

    #[tokio::test]
    async fn identifiers_resolve_to_names_with_na_fallback() {
        let directory = StaticNameDirectory::default()
            .with_entity(EntityKind::Service, 1, "Lawn Care")
            .with_entity(EntityKind::Service, 2, "Snow Removal")
            .with_entity(EntityKind::PricingTier, 10, "Gold")
            .with_user(7, "Dana Reviewer");

        let old = PriceSnapshot {
            service_id: Some(ServiceId(1)),
            pricing_tier_id: Some(PricingTierId(10)),
            ..PriceSnapshot::default()
        };
        let new = PriceSnapshot {
            service_id: Some(ServiceId(2)),
            pricing_tier_id: Some(PricingTierId(99)),
            approved_by: Some(UserId(7)),
            ..PriceSnapshot::default()
        };

        let text = describe(&directory, ChangeType::Updated, &old, &new, None).await;
        assert_eq!(
            text,
            "Service: Lawn Care → Snow Removal | Pricing Tier: Gold → N/A | Approved By: N/A → Dana Reviewer"
        );
    }

    #[tokio::test]
    async fn plain_fields_render_raw_values_and_na_for_absent() {
        let directory = StaticNameDirectory::default();
        let old = PriceSnapshot {
            unit: Some("hour".to_string()),
            valid_to: NaiveDate::from_ymd_opt(2024, 12, 31),
            ..PriceSnapshot::default()
        };
        let new = PriceSnapshot { unit: Some("visit".to_string()), ..PriceSnapshot::default() };

        let text = describe(&directory, ChangeType::Updated, &old, &new, None).await;
        assert_eq!(text, "Unit: hour → visit | Valid To: 2024-12-31 → N/A");
    }

    #[tokio::test]
    async fn lifecycle_types_use_fixed_phrases() {
        let directory = StaticNameDirectory::default();
        let created = describe(
            &directory,
            ChangeType::Created,
            &PriceSnapshot::default(),
            &priced(9_900, "USD"),
            None,
        )
        .await;
        assert_eq!(created, "Price created: $99.00 USD");

        let deleted = describe(
            &directory,
            ChangeType::Deleted,
            &priced(9_900, "USD"),
            &PriceSnapshot::default(),
            Some("service retired"),
        )
        .await;
        assert_eq!(deleted, "Price deleted | Reason: service retired");
    }

    #[tokio::test]
    async fn missing_currency_falls_back_to_configured_default() {
        let directory = StaticNameDirectory::default();
        let old = PriceSnapshot { setup_fee: Some(Decimal::new(1_000, 0)), ..PriceSnapshot::default() };
        let new = PriceSnapshot { setup_fee: Some(Decimal::new(1_200, 0)), ..PriceSnapshot::default() };
        let changes = detect_changes(&old, &new);

        let text = ChangeDescriber::new(&directory, &directory)
            .with_fallback_currency("GBP")
            .describe(ChangeType::AmountChanged, &changes, &old, &new, Some("   "))
            .await;
        assert_eq!(text, "Setup Fee: £1,000.00 → £1,200.00");
    }
}

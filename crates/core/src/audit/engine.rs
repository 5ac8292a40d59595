use tracing::{debug, error, info};

use crate::audit::changes::{classify, detect_changes, present_values};
use crate::audit::describe::ChangeDescriber;
use crate::audit::lookup::{EntityNameLookup, UserNameLookup};
use crate::audit::sink::AuditSink;
use crate::domain::audit_record::{AuditRecord, ChangeType, NewAuditRecord};
use crate::domain::currency::{normalize_currency_code, DEFAULT_CURRENCY};
use crate::domain::snapshot::{PriceSnapshot, ServicePriceId, UserId};
use crate::errors::AuditError;

/// Turns a before/after pair of price snapshots into one persisted audit
/// record. Each call runs detect, classify, describe, persist in order and
/// awaits every collaborator inline.
pub struct PriceAuditEngine<E, U, S> {
    entities: E,
    users: U,
    sink: S,
    system_actor: UserId,
    base_currency: String,
}

impl<E, U, S> PriceAuditEngine<E, U, S>
where
    E: EntityNameLookup,
    U: UserNameLookup,
    S: AuditSink,
{
    pub fn new(entities: E, users: U, sink: S) -> Self {
        Self {
            entities,
            users,
            sink,
            system_actor: UserId::SYSTEM,
            base_currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Actor recorded when the caller supplies none (or id 0).
    pub fn with_system_actor(mut self, actor: UserId) -> Self {
        self.system_actor = actor;
        self
    }

    pub fn with_base_currency(mut self, currency: &str) -> Self {
        self.base_currency = normalize_currency_code(currency);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn system_actor(&self) -> UserId {
        self.system_actor
    }

    /// Returns `Ok(None)` without touching the sink when an update-style
    /// request carries no field changes.
    pub async fn record_change(
        &self,
        service_price_id: ServicePriceId,
        requested: ChangeType,
        old: &PriceSnapshot,
        new: &PriceSnapshot,
        reason: Option<&str>,
        actor: Option<UserId>,
    ) -> Result<Option<AuditRecord>, AuditError> {
        let change_set = detect_changes(old, new);
        if !requested.is_lifecycle() && change_set.is_empty() {
            debug!(
                event_name = "audit.change.skipped",
                service_price_id = service_price_id.0,
                requested = %requested,
                "no tracked fields changed; nothing recorded"
            );
            return Ok(None);
        }

        let change_type = classify(requested, &change_set);
        let description = ChangeDescriber::new(&self.entities, &self.users)
            .with_fallback_currency(&self.base_currency)
            .describe(change_type, &change_set, old, new, reason)
            .await;

        let (old_values, new_values) = match change_type {
            ChangeType::Created => (Default::default(), present_values(new)),
            ChangeType::Deleted => (present_values(old), Default::default()),
            _ => (change_set.old_values(), change_set.new_values()),
        };

        let changed_by = self.resolve_actor(actor);
        let record = NewAuditRecord {
            service_price_id,
            change_type,
            change_description: description,
            changed_by,
            old_values,
            new_values,
        };

        match self.sink.append(record).await {
            Ok(stored) => {
                info!(
                    event_name = "audit.change.recorded",
                    audit_record_id = stored.id.0,
                    service_price_id = service_price_id.0,
                    change_type = %stored.change_type,
                    changed_by = stored.changed_by.0,
                    changed_fields = change_set.len(),
                    "price change recorded"
                );
                Ok(Some(stored))
            }
            Err(persist_error) => {
                error!(
                    event_name = "audit.change.persist_failed",
                    service_price_id = service_price_id.0,
                    change_type = %change_type,
                    error = %persist_error,
                    "failed to persist price audit record"
                );
                Err(persist_error)
            }
        }
    }

    pub async fn record_created(
        &self,
        service_price_id: ServicePriceId,
        new: &PriceSnapshot,
        actor: Option<UserId>,
    ) -> Result<Option<AuditRecord>, AuditError> {
        let empty = PriceSnapshot::default();
        self.record_change(service_price_id, ChangeType::Created, &empty, new, None, actor).await
    }

    pub async fn record_deleted(
        &self,
        service_price_id: ServicePriceId,
        old: &PriceSnapshot,
        reason: Option<&str>,
        actor: Option<UserId>,
    ) -> Result<Option<AuditRecord>, AuditError> {
        let empty = PriceSnapshot::default();
        self.record_change(service_price_id, ChangeType::Deleted, old, &empty, reason, actor).await
    }

    fn resolve_actor(&self, actor: Option<UserId>) -> UserId {
        match actor {
            Some(actor) if actor.0 > 0 => actor,
            _ => self.system_actor,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::PriceAuditEngine;
    use crate::audit::lookup::StaticNameDirectory;
    use crate::audit::sink::InMemoryAuditSink;
    use crate::domain::audit_record::ChangeType;
    use crate::domain::field::{EntityKind, FieldValue, TrackableField};
    use crate::domain::snapshot::{ApprovalStatus, PriceSnapshot, ServiceId, ServicePriceId, UserId};
    use crate::errors::AuditError;

    type TestEngine = PriceAuditEngine<StaticNameDirectory, StaticNameDirectory, InMemoryAuditSink>;

    fn engine() -> (TestEngine, InMemoryAuditSink) {
        let directory = StaticNameDirectory::default()
            .with_entity(EntityKind::Service, 3, "Window Cleaning")
            .with_user(42, "Morgan Pricing");
        let sink = InMemoryAuditSink::default();
        (PriceAuditEngine::new(directory.clone(), directory, sink.clone()), sink)
    }

    fn price(amount: i64) -> PriceSnapshot {
        PriceSnapshot {
            amount: Some(Decimal::new(amount, 0)),
            currency: Some("CAD".to_string()),
            unit: Some("hour".to_string()),
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1),
            is_current: Some(true),
            service_id: Some(ServiceId(3)),
            approval_status: Some(ApprovalStatus::Approved),
            ..PriceSnapshot::default()
        }
    }

    #[tokio::test]
    async fn amount_change_records_both_sides() {
        let (engine, sink) = engine();

        let record = engine
            .record_change(
                ServicePriceId(11),
                ChangeType::Updated,
                &price(100),
                &price(150),
                None,
                Some(UserId(42)),
            )
            .await
            .expect("record")
            .expect("a change was recorded");

        assert_eq!(record.change_type, ChangeType::AmountChanged);
        assert_eq!(record.changed_by, UserId(42));
        assert!(record.change_description.contains("$100.00"));
        assert!(record.change_description.contains("$150.00"));
        assert_eq!(record.old_value(TrackableField::Amount), &FieldValue::Money(Decimal::new(100, 0)));
        assert_eq!(record.new_value(TrackableField::Amount), &FieldValue::Money(Decimal::new(150, 0)));
        assert_eq!(record.old_values.len(), 1);
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn multi_field_update_is_pipe_delimited() {
        let (engine, _sink) = engine();
        let new = PriceSnapshot {
            amount: Some(Decimal::new(120, 0)),
            unit: Some("visit".to_string()),
            ..price(100)
        };

        let record = engine
            .record_change(ServicePriceId(11), ChangeType::Updated, &price(100), &new, None, None)
            .await
            .expect("record")
            .expect("a change was recorded");

        assert_eq!(record.change_type, ChangeType::MultiUpdate);
        assert_eq!(record.change_description, "Amount: $100.00 → $120.00 | Unit: hour → visit");
    }

    #[tokio::test]
    async fn identical_update_records_nothing() {
        let (engine, sink) = engine();

        let outcome = engine
            .record_change(
                ServicePriceId(11),
                ChangeType::Updated,
                &price(100),
                &price(100),
                Some("no-op save"),
                Some(UserId(42)),
            )
            .await
            .expect("record");

        assert!(outcome.is_none());
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn missing_actor_falls_back_to_system_actor() {
        let (engine, _sink) = engine();
        let engine = engine.with_system_actor(UserId(9));

        let unnamed = engine
            .record_change(ServicePriceId(1), ChangeType::Updated, &price(1), &price(2), None, None)
            .await
            .expect("record")
            .expect("recorded");
        let zero = engine
            .record_change(
                ServicePriceId(1),
                ChangeType::Updated,
                &price(2),
                &price(3),
                None,
                Some(UserId(0)),
            )
            .await
            .expect("record")
            .expect("recorded");

        assert_eq!(unnamed.changed_by, UserId(9));
        assert_eq!(zero.changed_by, UserId(9));
    }

    #[tokio::test]
    async fn created_and_deleted_capture_full_snapshots() {
        let (engine, sink) = engine();

        let created =
            engine.record_created(ServicePriceId(5), &price(80), None).await.expect("record");
        let created = created.expect("created is always recorded");
        assert_eq!(created.change_type, ChangeType::Created);
        assert_eq!(created.change_description, "Price created: $80.00 CAD");
        assert!(created.old_values.is_empty());
        assert_eq!(
            created.new_value(TrackableField::ServiceId),
            &FieldValue::Id(3),
            "created records keep the whole new snapshot"
        );

        let deleted = engine
            .record_deleted(ServicePriceId(5), &price(80), Some("discontinued"), Some(UserId(42)))
            .await
            .expect("record")
            .expect("deleted is always recorded");
        assert_eq!(deleted.change_type, ChangeType::Deleted);
        assert_eq!(deleted.change_description, "Price deleted | Reason: discontinued");
        assert!(deleted.new_values.is_empty());
        assert_eq!(deleted.old_value(TrackableField::Unit), &FieldValue::Text("hour".to_string()));

        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test]
    async fn lifecycle_request_is_recorded_even_without_changes() {
        let (engine, sink) = engine();

        let record = engine
            .record_change(
                ServicePriceId(5),
                ChangeType::Deleted,
                &PriceSnapshot::default(),
                &PriceSnapshot::default(),
                None,
                None,
            )
            .await
            .expect("record");

        assert_eq!(record.map(|record| record.change_type), Some(ChangeType::Deleted));
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_propagates() {
        let (engine, sink) = engine();
        sink.set_unavailable(true);

        let error = engine
            .record_change(ServicePriceId(11), ChangeType::Updated, &price(100), &price(101), None, None)
            .await
            .expect_err("sink is down");

        assert!(matches!(error, AuditError::Persistence(_)));
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn configured_base_currency_formats_snapshots_without_currency() {
        let (engine, _sink) = engine();
        let engine = engine.with_base_currency("eur");
        let old = PriceSnapshot { amount: Some(Decimal::new(10, 0)), ..PriceSnapshot::default() };
        let new = PriceSnapshot { amount: Some(Decimal::new(12, 0)), ..PriceSnapshot::default() };

        let record = engine
            .record_change(ServicePriceId(2), ChangeType::Updated, &old, &new, None, None)
            .await
            .expect("record")
            .expect("recorded");

        assert_eq!(record.change_description, "Amount: €10.00 → €12.00");
    }
}

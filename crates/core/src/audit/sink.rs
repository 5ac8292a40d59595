use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::audit_record::{AuditRecord, AuditRecordId, ChangeType, NewAuditRecord};
use crate::domain::snapshot::{ServicePriceId, UserId};
use crate::errors::AuditError;

/// Append-only store for audit records. `append` returns only once the
/// record is durable, with `id` and `changed_at` assigned.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: NewAuditRecord) -> Result<AuditRecord, AuditError>;
}

/// Read side of the audit trail. Every list is newest first.
#[async_trait]
pub trait AuditHistory: Send + Sync {
    async fn history_for_price(
        &self,
        service_price_id: ServicePriceId,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, AuditError>;

    async fn recent(&self, limit: u32) -> Result<Vec<AuditRecord>, AuditError>;

    async fn by_change_type(
        &self,
        change_type: ChangeType,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, AuditError>;

    async fn by_actor(&self, actor: UserId, limit: u32) -> Result<Vec<AuditRecord>, AuditError>;

    /// Records with `from <= changed_at < to`.
    async fn between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, AuditError>;

    async fn change_summary(
        &self,
        service_price_id: ServicePriceId,
    ) -> Result<BTreeMap<ChangeType, u64>, AuditError>;
}

#[derive(Debug, Default)]
struct SinkState {
    records: Vec<AuditRecord>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    state: Arc<Mutex<SinkState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryAuditSink {
    /// Makes every later `append` fail with `AuditError::Persistence`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.state().records.clone()
    }

    /// Stores an already-persisted record as-is; used to seed histories
    /// with fixed timestamps.
    pub fn insert_existing(&self, record: AuditRecord) {
        let mut state = self.state();
        state.next_id = state.next_id.max(record.id.0);
        state.records.push(record);
    }

    fn state(&self) -> MutexGuard<'_, SinkState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn newest_first<F>(&self, limit: Option<u32>, keep: F) -> Vec<AuditRecord>
    where
        F: Fn(&AuditRecord) -> bool,
    {
        let state = self.state();
        let mut matching: Vec<AuditRecord> =
            state.records.iter().filter(|&record| keep(record)).cloned().collect();
        matching.sort_by(|left, right| {
            right.changed_at.cmp(&left.changed_at).then_with(|| right.id.cmp(&left.id))
        });
        if let Some(limit) = limit {
            matching.truncate(limit as usize);
        }
        matching
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, record: NewAuditRecord) -> Result<AuditRecord, AuditError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuditError::Persistence("audit store unavailable".to_string()));
        }

        let mut state = self.state();
        state.next_id += 1;
        let stored = record.into_record(AuditRecordId(state.next_id), Utc::now());
        state.records.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl AuditHistory for InMemoryAuditSink {
    async fn history_for_price(
        &self,
        service_price_id: ServicePriceId,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.newest_first(Some(limit), |record| record.service_price_id == service_price_id))
    }

    async fn recent(&self, limit: u32) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.newest_first(Some(limit), |_| true))
    }

    async fn by_change_type(
        &self,
        change_type: ChangeType,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.newest_first(Some(limit), |record| record.change_type == change_type))
    }

    async fn by_actor(&self, actor: UserId, limit: u32) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.newest_first(Some(limit), |record| record.changed_by == actor))
    }

    async fn between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self.newest_first(None, |record| record.changed_at >= from && record.changed_at < to))
    }

    async fn change_summary(
        &self,
        service_price_id: ServicePriceId,
    ) -> Result<BTreeMap<ChangeType, u64>, AuditError> {
        let state = self.state();
        let mut summary = BTreeMap::new();
        for record in &state.records {
            if record.service_price_id == service_price_id {
                *summary.entry(record.change_type).or_insert(0) += 1;
            }
        }
        Ok(summary)
    }
}

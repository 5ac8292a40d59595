use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use pricetrail_core::audit::lookup::{EntityNameLookup, UserNameLookup};
use pricetrail_core::domain::field::EntityKind;
use pricetrail_core::domain::snapshot::{PricingModelId, PricingTierId, ServiceId, UserId};

use super::RepositoryError;
use crate::DbPool;

/// Catalog entities (services, tiers, models, users). Doubles as the name
/// directory for audit descriptions.
#[derive(Clone)]
pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert_service(
        &self,
        name: &str,
        complexity_multiplier: Decimal,
    ) -> Result<ServiceId, RepositoryError> {
        let result = sqlx::query("INSERT INTO service (name, complexity_multiplier) VALUES (?, ?)")
            .bind(name)
            .bind(complexity_multiplier.to_string())
            .execute(&self.pool)
            .await?;
        Ok(ServiceId(result.last_insert_rowid()))
    }

    pub async fn insert_pricing_tier(
        &self,
        name: &str,
        discount_pct: Decimal,
    ) -> Result<PricingTierId, RepositoryError> {
        let result = sqlx::query("INSERT INTO pricing_tier (name, discount_pct) VALUES (?, ?)")
            .bind(name)
            .bind(discount_pct.to_string())
            .execute(&self.pool)
            .await?;
        Ok(PricingTierId(result.last_insert_rowid()))
    }

    pub async fn insert_pricing_model(&self, name: &str) -> Result<PricingModelId, RepositoryError> {
        let result = sqlx::query("INSERT INTO pricing_model (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(PricingModelId(result.last_insert_rowid()))
    }

    pub async fn insert_user(
        &self,
        display_name: &str,
        email: Option<&str>,
    ) -> Result<UserId, RepositoryError> {
        let result = sqlx::query("INSERT INTO app_user (display_name, email) VALUES (?, ?)")
            .bind(display_name)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(UserId(result.last_insert_rowid()))
    }

    pub async fn entity_name(
        &self,
        kind: EntityKind,
        id: i64,
    ) -> Result<Option<String>, RepositoryError> {
        let sql = match kind {
            EntityKind::Service => "SELECT name FROM service WHERE id = ?",
            EntityKind::PricingTier => "SELECT name FROM pricing_tier WHERE id = ?",
            EntityKind::PricingModel => "SELECT name FROM pricing_model WHERE id = ?",
        };
        let name = sqlx::query_scalar(sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(name)
    }

    pub async fn display_name(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let name = sqlx::query_scalar("SELECT display_name FROM app_user WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }
}

#[async_trait]
impl EntityNameLookup for SqlCatalogRepository {
    async fn name_of(&self, kind: EntityKind, id: i64) -> Option<String> {
        match self.entity_name(kind, id).await {
            Ok(name) => name,
            Err(error) => {
                warn!(
                    event_name = "audit.name_lookup.failed",
                    entity = kind.as_str(),
                    id,
                    error = %error,
                    "entity name lookup failed; rendering as N/A"
                );
                None
            }
        }
    }
}

#[async_trait]
impl UserNameLookup for SqlCatalogRepository {
    async fn user_name(&self, id: UserId) -> Option<String> {
        match self.display_name(id).await {
            Ok(name) => name,
            Err(error) => {
                warn!(
                    event_name = "audit.name_lookup.failed",
                    entity = "user",
                    id = id.0,
                    error = %error,
                    "user name lookup failed; rendering as N/A"
                );
                None
            }
        }
    }
}

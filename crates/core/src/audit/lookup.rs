use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::field::EntityKind;
use crate::domain::snapshot::UserId;

/// Resolves catalog identifiers to display names for audit descriptions.
/// A miss is `None`, never an error; lookups that fail underneath should
/// log and return `None`.
#[async_trait]
pub trait EntityNameLookup: Send + Sync {
    async fn name_of(&self, kind: EntityKind, id: i64) -> Option<String>;
}

#[async_trait]
pub trait UserNameLookup: Send + Sync {
    async fn user_name(&self, id: UserId) -> Option<String>;
}

/// Fixed name directory, used in tests and by callers that already hold the
/// names in memory.
#[derive(Clone, Debug, Default)]
pub struct StaticNameDirectory {
    entities: HashMap<(EntityKind, i64), String>,
    users: HashMap<i64, String>,
}

impl StaticNameDirectory {
    pub fn with_entity(mut self, kind: EntityKind, id: i64, name: impl Into<String>) -> Self {
        self.entities.insert((kind, id), name.into());
        self
    }

    pub fn with_user(mut self, id: i64, name: impl Into<String>) -> Self {
        self.users.insert(id, name.into());
        self
    }
}

#[async_trait]
impl EntityNameLookup for StaticNameDirectory {
    async fn name_of(&self, kind: EntityKind, id: i64) -> Option<String> {
        self.entities.get(&(kind, id)).cloned()
    }
}

#[async_trait]
impl UserNameLookup for StaticNameDirectory {
    async fn user_name(&self, id: UserId) -> Option<String> {
        self.users.get(&id.0).cloned()
    }
}

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{GuardScope, PermissionStore};
use crate::errors::{GuardianError, GuardianResult};

/// Process-local store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<(String, GuardScope)>>,
    role_permissions: Mutex<HashMap<Uuid, BTreeSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_to_role(&self, role_id: Uuid, keys: impl IntoIterator<Item = String>) -> GuardianResult<()> {
        let mut roles = self.role_permissions.lock().map_err(poisoned)?;
        roles.entry(role_id).or_default().extend(keys);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> GuardianError {
    GuardianError::internal("memory store lock poisoned")
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn exists(&self, key: &str, scope: &GuardScope) -> GuardianResult<bool> {
        let rows = self.rows.lock().map_err(poisoned)?;
        Ok(rows.iter().any(|(name, s)| name == key && s == scope))
    }

    async fn create_if_absent(&self, key: &str, scope: &GuardScope) -> GuardianResult<bool> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        if rows.iter().any(|(name, s)| name == key && s == scope) {
            return Ok(false);
        }
        rows.push((key.to_string(), scope.clone()));
        Ok(true)
    }

    async fn names(&self, scope: &GuardScope) -> GuardianResult<Vec<String>> {
        let rows = self.rows.lock().map_err(poisoned)?;
        Ok(rows
            .iter()
            .filter(|(_, s)| scope.sees(&s.guard, s.team.as_deref()))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn permissions_of_role(&self, role_id: Uuid) -> GuardianResult<BTreeSet<String>> {
        let roles = self.role_permissions.lock().map_err(poisoned)?;
        Ok(roles.get(&role_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_if_absent_is_idempotent_per_scope() {
        let store = MemoryStore::new();
        let web = GuardScope::new("web");
        let api = GuardScope::new("api");

        assert!(store.create_if_absent("View:Invoice", &web).await.unwrap());
        assert!(!store.create_if_absent("View:Invoice", &web).await.unwrap());
        assert!(store.create_if_absent("View:Invoice", &api).await.unwrap());

        assert!(store.exists("View:Invoice", &web).await.unwrap());
        assert_eq!(store.names(&web).await.unwrap(), vec!["View:Invoice"]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn role_permissions_round_trip() {
        let store = MemoryStore::new();
        let role = Uuid::new_v4();
        store.grant_to_role(role, vec!["View:Invoice".to_string()]).unwrap();

        let keys = store.permissions_of_role(role).await.unwrap();
        assert!(keys.contains("View:Invoice"));
        assert!(store.permissions_of_role(Uuid::new_v4()).await.unwrap().is_empty());
    }
}

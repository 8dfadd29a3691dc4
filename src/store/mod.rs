//! Permission persistence.
//!
//! Keys are unique per (name, guard, team). Rows are only ever inserted;
//! nothing in this crate renames or deletes a permission.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::GuardianResult;

/// Guard name plus optional team id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuardScope {
    pub guard: String,
    pub team: Option<String>,
}

impl GuardScope {
    pub fn new(guard: impl Into<String>) -> Self {
        Self {
            guard: guard.into(),
            team: None,
        }
    }

    pub fn with_team(mut self, team: Option<String>) -> Self {
        self.team = team;
        self
    }

    /// Whether a row stored under `team` is visible from this scope.
    /// Rows without a team are global.
    pub fn sees(&self, guard: &str, team: Option<&str>) -> bool {
        self.guard == guard && (team.is_none() || team == self.team.as_deref())
    }
}

impl fmt::Display for GuardScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.team {
            Some(team) => write!(f, "{}@{}", self.guard, team),
            None => f.write_str(&self.guard),
        }
    }
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn exists(&self, key: &str, scope: &GuardScope) -> GuardianResult<bool>;

    /// Inserts the key unless it already exists. Returns whether a row was created.
    async fn create_if_absent(&self, key: &str, scope: &GuardScope) -> GuardianResult<bool>;

    /// Keys visible from `scope`, in creation order.
    async fn names(&self, scope: &GuardScope) -> GuardianResult<Vec<String>>;

    async fn permissions_of_role(&self, role_id: Uuid) -> GuardianResult<BTreeSet<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_rows_are_visible_from_team_scopes() {
        let scope = GuardScope::new("web").with_team(Some("acme".to_string()));
        assert!(scope.sees("web", None));
        assert!(scope.sees("web", Some("acme")));
        assert!(!scope.sees("web", Some("globex")));
        assert!(!scope.sees("api", None));
        assert_eq!(scope.to_string(), "web@acme");
    }
}

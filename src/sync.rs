//! Reconciles the keys implied by panel catalogs against the permission store.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::catalog::{EntityCatalog, EntityKind};
use crate::config::GuardianConfig;
use crate::errors::GuardianResult;
use crate::keys::SharedKeyBuilder;
use crate::store::{GuardScope, PermissionStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PermissionOrigin {
    Resource { subject: String },
    Page { subject: String },
    Widget { subject: String },
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPermission {
    pub key: String,
    pub scope: GuardScope,
    pub panel: Option<String>,
    pub origin: PermissionOrigin,
}

/// Ordered list of keys to ensure: per panel resources, pages, widgets,
/// then custom keys for every distinct guard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub entries: Vec<PlannedPermission>,
    /// Panel guards missing from the configured guard list.
    pub unknown_guards: Vec<String>,
}

impl SyncPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GuardTally {
    pub created: usize,
    pub existing: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub key: String,
    pub guard: String,
    pub created: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub guards: IndexMap<String, GuardTally>,
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    pub fn created(&self) -> usize {
        self.guards.values().map(|t| t.created).sum()
    }

    pub fn existing(&self) -> usize {
        self.guards.values().map(|t| t.existing).sum()
    }
}

#[derive(Debug, Clone)]
pub struct SyncPlanner {
    builder: SharedKeyBuilder,
    custom_permissions: Vec<String>,
    known_guards: Vec<String>,
}

impl SyncPlanner {
    pub fn new(config: &GuardianConfig, builder: SharedKeyBuilder) -> Self {
        Self {
            builder,
            custom_permissions: config.custom_permissions.keys().cloned().collect(),
            known_guards: config.guards.clone(),
        }
    }

    pub fn plan(&self, catalogs: &[&EntityCatalog], team: Option<&str>) -> SyncPlan {
        let mut plan = SyncPlan::default();
        let mut guards: IndexSet<String> = IndexSet::new();

        for catalog in catalogs {
            let panel = catalog.panel();
            let scope = GuardScope::new(panel.guard.clone()).with_team(team.map(str::to_string));
            guards.insert(panel.guard.clone());

            for (kind, subject, key) in catalog.permission_keys(self.builder.as_ref()) {
                let origin = match kind {
                    EntityKind::Resource => PermissionOrigin::Resource { subject },
                    EntityKind::Page => PermissionOrigin::Page { subject },
                    EntityKind::Widget => PermissionOrigin::Widget { subject },
                };
                plan.entries.push(PlannedPermission {
                    key,
                    scope: scope.clone(),
                    panel: Some(panel.id.clone()),
                    origin,
                });
            }
        }

        for guard in &guards {
            if !self.known_guards.is_empty() && !self.known_guards.contains(guard) {
                tracing::warn!(guard = %guard, "guard is not configured, permissions may not be usable");
                plan.unknown_guards.push(guard.clone());
            }
        }

        for key in &self.custom_permissions {
            for guard in &guards {
                plan.entries.push(PlannedPermission {
                    key: key.clone(),
                    scope: GuardScope::new(guard.clone()).with_team(team.map(str::to_string)),
                    panel: None,
                    origin: PermissionOrigin::Custom,
                });
            }
        }

        plan
    }

    /// Applies the plan in order. Safe to repeat; a second run creates nothing.
    pub async fn reconcile(&self, plan: &SyncPlan, store: &dyn PermissionStore) -> GuardianResult<SyncReport> {
        let mut report = SyncReport::default();

        for entry in &plan.entries {
            let created = store.create_if_absent(&entry.key, &entry.scope).await?;
            let tally = report.guards.entry(entry.scope.guard.clone()).or_default();
            if created {
                tally.created += 1;
                tracing::debug!(key = %entry.key, scope = %entry.scope, "created permission");
            } else {
                tally.existing += 1;
                tracing::debug!(key = %entry.key, scope = %entry.scope, "permission exists");
            }
            report.outcomes.push(SyncOutcome {
                key: entry.key.clone(),
                guard: entry.scope.guard.clone(),
                created,
            });
        }

        for (guard, tally) in &report.guards {
            tracing::info!(
                guard = %guard,
                created = tally.created,
                existing = tally.existing,
                "permission sync finished"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ConfigRegistry;
    use crate::config::{EntityEntry, PanelConfig};
    use crate::keys::KeyCodec;
    use crate::store::MemoryStore;

    fn panel(id: &str, guard: &str) -> PanelConfig {
        PanelConfig {
            id: id.to_string(),
            guard: guard.to_string(),
            tenancy: false,
            super_admin: Default::default(),
            resources: vec![EntityEntry::new("App\\Resources\\InvoiceResource").with_model("App\\Models\\Invoice")],
            pages: vec![EntityEntry::new("App\\Pages\\Report")],
            widgets: vec![EntityEntry::new("App\\Widgets\\Revenue")],
        }
    }

    fn setup() -> (GuardianConfig, Vec<EntityCatalog>) {
        let mut config = GuardianConfig::default();
        config.policies.methods = vec!["viewAny".to_string(), "view".to_string()];
        config.custom_permissions.insert("impersonate-user".to_string(), "Impersonate".to_string());
        config.guards = vec!["web".to_string()];
        config.panels = vec![panel("admin", "web"), panel("partner", "partner")];

        let codec = KeyCodec::default();
        let registry = ConfigRegistry::new(&config);
        let catalogs = ["admin", "partner"]
            .iter()
            .map(|id| EntityCatalog::build(&registry, id, &config, &codec).unwrap())
            .collect();
        (config, catalogs)
    }

    #[test]
    fn plan_orders_entities_then_custom() {
        let (config, catalogs) = setup();
        let planner = SyncPlanner::new(&config, KeyCodec::default().shared());
        let refs: Vec<&EntityCatalog> = catalogs.iter().collect();
        let plan = planner.plan(&refs, None);

        let keys: Vec<(&str, &str)> = plan
            .entries
            .iter()
            .map(|e| (e.key.as_str(), e.scope.guard.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("ViewAny:Invoice", "web"),
                ("View:Invoice", "web"),
                ("View:Report", "web"),
                ("View:Revenue", "web"),
                ("ViewAny:Invoice", "partner"),
                ("View:Invoice", "partner"),
                ("View:Report", "partner"),
                ("View:Revenue", "partner"),
                ("impersonate-user", "web"),
                ("impersonate-user", "partner"),
            ]
        );
        assert_eq!(plan.unknown_guards, vec!["partner"]);
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let (config, catalogs) = setup();
        let planner = SyncPlanner::new(&config, KeyCodec::default().shared());
        let refs: Vec<&EntityCatalog> = catalogs.iter().collect();
        let plan = planner.plan(&refs, None);
        let store = MemoryStore::new();

        let first = planner.reconcile(&plan, &store).await.unwrap();
        assert_eq!(first.created(), 10);
        assert_eq!(first.guards["web"], GuardTally { created: 5, existing: 0 });

        let second = planner.reconcile(&plan, &store).await.unwrap();
        assert_eq!(second.created(), 0);
        assert_eq!(second.existing(), 10);
        assert_eq!(store.len(), 10);
    }
}

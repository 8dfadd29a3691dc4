//! Request-scoped memo of catalogs and categorized permission sets.
//!
//! One `Evaluation` lives for one HTTP request or one CLI invocation and is
//! dropped with it. Nothing here is shared between evaluations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{EntityCatalog, RegistryProvider};
use crate::categorizer::{categorize, CategorizedPermissions};
use crate::config::GuardianConfig;
use crate::errors::GuardianResult;
use crate::keys::SharedKeyBuilder;
use crate::labels::{LabelResolver, Translator};
use crate::store::{GuardScope, PermissionStore};
use crate::view::RolePermissionView;

pub struct Evaluation {
    config: Arc<GuardianConfig>,
    registry: Arc<dyn RegistryProvider>,
    builder: SharedKeyBuilder,
    translator: Arc<dyn Translator>,
    catalogs: HashMap<String, Arc<EntityCatalog>>,
    categorized: HashMap<(String, GuardScope), Arc<CategorizedPermissions>>,
}

impl Evaluation {
    pub fn new(
        config: Arc<GuardianConfig>,
        registry: Arc<dyn RegistryProvider>,
        builder: SharedKeyBuilder,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            config,
            registry,
            builder,
            translator,
            catalogs: HashMap::new(),
            categorized: HashMap::new(),
        }
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }

    pub fn builder(&self) -> &SharedKeyBuilder {
        &self.builder
    }

    pub fn labels(&self) -> LabelResolver {
        LabelResolver::new(
            self.builder.clone(),
            self.translator.clone(),
            self.config.custom_permissions.clone(),
        )
    }

    pub fn catalog(&mut self, panel_id: &str) -> GuardianResult<Arc<EntityCatalog>> {
        if let Some(catalog) = self.catalogs.get(panel_id) {
            return Ok(catalog.clone());
        }

        let catalog = Arc::new(EntityCatalog::build(
            self.registry.as_ref(),
            panel_id,
            &self.config,
            self.builder.as_ref(),
        )?);
        self.catalogs.insert(panel_id.to_string(), catalog.clone());
        Ok(catalog)
    }

    /// Stored keys visible from `scope`, partitioned against the panel.
    pub async fn categorized(
        &mut self,
        panel_id: &str,
        scope: &GuardScope,
        store: &dyn PermissionStore,
    ) -> GuardianResult<Arc<CategorizedPermissions>> {
        let memo_key = (panel_id.to_string(), scope.clone());
        if let Some(parts) = self.categorized.get(&memo_key) {
            return Ok(parts.clone());
        }

        let catalog = self.catalog(panel_id)?;
        let names = store.names(scope).await?;
        let parts = Arc::new(categorize(names, &catalog, self.builder.as_ref()));
        self.categorized.insert(memo_key, parts.clone());
        Ok(parts)
    }

    pub async fn role_view(
        &mut self,
        panel_id: &str,
        scope: &GuardScope,
        store: &dyn PermissionStore,
    ) -> GuardianResult<RolePermissionView> {
        let catalog = self.catalog(panel_id)?;
        let parts = self.categorized(panel_id, scope, store).await?;
        Ok(RolePermissionView::new(
            catalog,
            parts,
            self.labels(),
            self.config.role_resource.tabs.clone(),
        ))
    }
}

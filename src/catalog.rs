//! Entity discovery per panel.
//!
//! A [`RegistryProvider`] lists the resources, pages and widgets registered
//! in a panel. [`EntityCatalog`] turns those entries into formatted subjects,
//! the actions each one exposes, and display labels.

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::{EntityEntry, GuardianConfig, PanelConfig, SubjectPolicy};
use crate::errors::{GuardianError, GuardianResult};
use crate::keys::PermissionKeyBuilder;
use crate::strings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Resource,
    Page,
    Widget,
}

/// Panel metadata the catalog needs besides its entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelInfo {
    pub id: String,
    pub guard: String,
    pub tenancy: bool,
}

/// Source of registered entities, keyed by panel id.
pub trait RegistryProvider: Send + Sync {
    fn panel(&self, panel_id: &str) -> GuardianResult<PanelInfo>;

    fn list_resources(&self, panel_id: &str) -> GuardianResult<Vec<EntityEntry>>;

    fn list_pages(&self, panel_id: &str) -> GuardianResult<Vec<EntityEntry>>;

    fn list_widgets(&self, panel_id: &str) -> GuardianResult<Vec<EntityEntry>>;
}

/// Registry backed by the `[[panels]]` tables of the config file.
#[derive(Debug, Clone)]
pub struct ConfigRegistry {
    panels: Vec<PanelConfig>,
}

impl ConfigRegistry {
    pub fn new(config: &GuardianConfig) -> Self {
        Self {
            panels: config.panels.clone(),
        }
    }

    fn find(&self, panel_id: &str) -> GuardianResult<&PanelConfig> {
        self.panels
            .iter()
            .find(|panel| panel.id == panel_id)
            .ok_or_else(|| GuardianError::configuration(format!("panel '{}' not found", panel_id)))
    }
}

impl RegistryProvider for ConfigRegistry {
    fn panel(&self, panel_id: &str) -> GuardianResult<PanelInfo> {
        let panel = self.find(panel_id)?;
        Ok(PanelInfo {
            id: panel.id.clone(),
            guard: panel.guard.clone(),
            tenancy: panel.tenancy,
        })
    }

    fn list_resources(&self, panel_id: &str) -> GuardianResult<Vec<EntityEntry>> {
        Ok(self.find(panel_id)?.resources.clone())
    }

    fn list_pages(&self, panel_id: &str) -> GuardianResult<Vec<EntityEntry>> {
        Ok(self.find(panel_id)?.pages.clone())
    }

    fn list_widgets(&self, panel_id: &str) -> GuardianResult<Vec<EntityEntry>> {
        Ok(self.find(panel_id)?.widgets.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub class: String,
    /// Class or model basename the keys are built from.
    #[serde(skip)]
    pub basename: String,
    /// Subject after the key codec's case transform.
    pub subject: String,
    /// Unformatted actions; resources get the effective policy methods,
    /// pages and widgets the configured prefix.
    pub actions: Vec<String>,
    pub label: String,
    pub icon: Option<String>,
    pub model: Option<String>,
    pub authenticatable: bool,
}

/// Every entity of one panel, keyed by formatted subject.
///
/// Two entries of the same kind that format to the same subject collapse
/// into one; the later entry wins.
#[derive(Debug, Clone)]
pub struct EntityCatalog {
    panel: PanelInfo,
    resources: IndexMap<String, EntityDescriptor>,
    pages: IndexMap<String, EntityDescriptor>,
    widgets: IndexMap<String, EntityDescriptor>,
}

impl EntityCatalog {
    pub fn build(
        registry: &dyn RegistryProvider,
        panel_id: &str,
        config: &GuardianConfig,
        builder: &dyn PermissionKeyBuilder,
    ) -> GuardianResult<Self> {
        let panel = registry.panel(panel_id)?;

        let mut resources = IndexMap::new();
        for entry in registry.list_resources(panel_id)? {
            if config.resources.exclude.contains(&entry.class) {
                continue;
            }
            let raw = resource_subject(&entry, config.resources.subject);
            let descriptor = EntityDescriptor {
                kind: EntityKind::Resource,
                subject: builder.format(&raw),
                actions: config.resource_methods(&entry.class),
                label: entry.label.clone().unwrap_or_else(|| strings::headline(&raw)),
                basename: raw,
                icon: entry.icon.clone(),
                model: entry.model.clone(),
                authenticatable: entry.authenticatable,
                class: entry.class,
            };
            resources.insert(descriptor.subject.clone(), descriptor);
        }

        let pages = Self::simple_entities(
            EntityKind::Page,
            registry.list_pages(panel_id)?,
            &config.pages.exclude,
            &config.pages.prefix,
            builder,
        );
        let widgets = Self::simple_entities(
            EntityKind::Widget,
            registry.list_widgets(panel_id)?,
            &config.widgets.exclude,
            &config.widgets.prefix,
            builder,
        );

        tracing::debug!(
            panel = %panel.id,
            resources = resources.len(),
            pages = pages.len(),
            widgets = widgets.len(),
            "built entity catalog"
        );

        Ok(Self {
            panel,
            resources,
            pages,
            widgets,
        })
    }

    fn simple_entities(
        kind: EntityKind,
        entries: Vec<EntityEntry>,
        exclude: &[String],
        prefix: &str,
        builder: &dyn PermissionKeyBuilder,
    ) -> IndexMap<String, EntityDescriptor> {
        let mut out = IndexMap::new();
        for entry in entries {
            if exclude.contains(&entry.class) {
                continue;
            }
            let raw = strings::class_basename(&entry.class).to_string();
            let descriptor = EntityDescriptor {
                kind,
                subject: builder.format(&raw),
                actions: vec![prefix.to_string()],
                label: entry.label.clone().unwrap_or_else(|| strings::headline(&raw)),
                basename: raw,
                icon: entry.icon.clone(),
                model: None,
                authenticatable: false,
                class: entry.class,
            };
            out.insert(descriptor.subject.clone(), descriptor);
        }
        out
    }

    pub fn panel(&self) -> &PanelInfo {
        &self.panel
    }

    pub fn resource_subjects(&self) -> &IndexMap<String, EntityDescriptor> {
        &self.resources
    }

    pub fn page_subjects(&self) -> &IndexMap<String, EntityDescriptor> {
        &self.pages
    }

    pub fn widget_subjects(&self) -> &IndexMap<String, EntityDescriptor> {
        &self.widgets
    }

    pub fn entities(&self, kind: EntityKind) -> &IndexMap<String, EntityDescriptor> {
        match kind {
            EntityKind::Resource => &self.resources,
            EntityKind::Page => &self.pages,
            EntityKind::Widget => &self.widgets,
        }
    }

    /// Display label for a subject of the given kind, or the subject itself.
    pub fn label_of(&self, kind: EntityKind, subject: &str) -> String {
        self.entities(kind)
            .get(subject)
            .map(|descriptor| descriptor.label.clone())
            .unwrap_or_else(|| subject.to_string())
    }

    pub fn icon_of(&self, subject: &str) -> Option<&str> {
        self.resources.get(subject).and_then(|d| d.icon.as_deref())
    }

    /// Every key this panel's entities expose, in catalog order.
    pub fn permission_keys(&self, builder: &dyn PermissionKeyBuilder) -> Vec<(EntityKind, String, String)> {
        [&self.resources, &self.pages, &self.widgets]
            .into_iter()
            .flat_map(|entities| entities.values())
            .flat_map(move |descriptor| {
                descriptor.actions.iter().map(move |action| {
                    (descriptor.kind, descriptor.subject.clone(), builder.build(action, &descriptor.basename))
                })
            })
            .collect()
    }
}

fn resource_subject(entry: &EntityEntry, policy: SubjectPolicy) -> String {
    let source = match (policy, entry.model.as_deref()) {
        (SubjectPolicy::Model, Some(model)) => model,
        (SubjectPolicy::Model, None) => {
            tracing::warn!(resource = %entry.class, "resource has no model, using class name as subject");
            &entry.class
        }
        (SubjectPolicy::Class, _) => &entry.class,
    };
    strings::class_basename(source).to_string()
}

//! Read-only projection of a panel's categorized permissions for the role
//! management screens, plus the editable checkbox form built from it.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{EntityCatalog, EntityKind};
use crate::categorizer::{BucketKind, CategorizedPermissions};
use crate::config::TabsConfig;
use crate::errors::{GuardianError, GuardianResult};
use crate::labels::LabelResolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionOption {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceGroup {
    pub subject: String,
    pub label: String,
    pub icon: Option<String>,
    pub options: Vec<PermissionOption>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssignedCounts {
    pub resources: usize,
    pub pages: usize,
    pub widgets: usize,
    pub custom: usize,
}

impl AssignedCounts {
    pub fn total(&self) -> usize {
        self.resources + self.pages + self.widgets + self.custom
    }
}

/// Assigned keys of one resource, labelled by action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignedResource {
    pub subject: String,
    pub label: String,
    pub icon: Option<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSummary {
    pub counts: AssignedCounts,
    pub resources: Vec<AssignedResource>,
    pub pages: Vec<String>,
    pub widgets: Vec<String>,
    pub custom: Vec<String>,
}

/// How a form was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditMode {
    Role,
    /// Direct permissions of a user. Keys the user already inherits through
    /// a role are neither offered nor selected.
    User { role_based: BTreeSet<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    Role,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: String,
    pub bucket: BucketKind,
    pub label: String,
    pub icon: Option<String>,
    pub options: Vec<PermissionOption>,
    pub selected: BTreeSet<String>,
}

impl FormField {
    pub fn offers(&self, key: &str) -> bool {
        self.options.iter().any(|option| option.key == key)
    }

    pub fn is_fully_selected(&self) -> bool {
        !self.options.is_empty() && self.options.iter().all(|option| self.selected.contains(&option.key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionForm {
    pub mode: FormMode,
    pub fields: Vec<FormField>,
    /// Keys inherited through roles; only populated in user mode.
    pub inherited: BTreeSet<String>,
}

impl PermissionForm {
    /// True iff some field has options and every field with options is
    /// fully selected.
    pub fn is_all_selected(&self) -> bool {
        let mut offered = self.fields.iter().filter(|field| !field.options.is_empty()).peekable();
        offered.peek().is_some() && offered.all(FormField::is_fully_selected)
    }

    pub fn set_all(&mut self, on: bool) {
        for field in &mut self.fields {
            field.selected = if on {
                field.options.iter().map(|option| option.key.clone()).collect()
            } else {
                BTreeSet::new()
            };
        }
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn toggle(&mut self, key: &str, on: bool) -> GuardianResult<()> {
        let field = self
            .fields
            .iter_mut()
            .find(|field| field.offers(key))
            .ok_or_else(|| GuardianError::bad_request(format!("permission '{}' is not offered by this form", key)))?;

        if on {
            field.selected.insert(key.to_string());
        } else {
            field.selected.remove(key);
        }
        Ok(())
    }

    pub fn selected(&self) -> BTreeSet<String> {
        self.fields.iter().flat_map(|field| field.selected.iter().cloned()).collect()
    }

    /// Replaces the selection with `keys`. Every key must be offered.
    pub fn submit<I, S>(&mut self, keys: I) -> GuardianResult<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_all(false);
        for key in keys {
            self.toggle(key.as_ref(), true)?;
        }
        Ok(self.selected())
    }
}

#[derive(Debug, Clone)]
pub struct RolePermissionView {
    catalog: Arc<EntityCatalog>,
    categorized: Arc<CategorizedPermissions>,
    labels: LabelResolver,
    tabs: TabsConfig,
}

impl RolePermissionView {
    pub fn new(
        catalog: Arc<EntityCatalog>,
        categorized: Arc<CategorizedPermissions>,
        labels: LabelResolver,
        tabs: TabsConfig,
    ) -> Self {
        Self {
            catalog,
            categorized,
            labels,
            tabs,
        }
    }

    pub fn categorized(&self) -> &CategorizedPermissions {
        &self.categorized
    }

    pub fn has_resources(&self) -> bool {
        self.tabs.resources.visible && !self.categorized.resources.is_empty()
    }

    pub fn has_pages(&self) -> bool {
        self.tabs.pages.visible && !self.categorized.pages.is_empty()
    }

    pub fn has_widgets(&self) -> bool {
        self.tabs.widgets.visible && !self.categorized.widgets.is_empty()
    }

    pub fn has_custom(&self) -> bool {
        self.tabs.custom.visible && !self.categorized.custom.is_empty()
    }

    pub fn counts(&self, assigned: &BTreeSet<String>) -> AssignedCounts {
        let count = |keys: &[String]| keys.iter().filter(|k| assigned.contains(*k)).count();
        AssignedCounts {
            resources: self.categorized.resources.values().map(|keys| count(keys.as_slice())).sum(),
            pages: count(self.categorized.pages.as_slice()),
            widgets: count(self.categorized.widgets.as_slice()),
            custom: count(self.categorized.custom.as_slice()),
        }
    }

    pub fn assigned_resources(&self, assigned: &BTreeSet<String>) -> Vec<AssignedResource> {
        self.categorized
            .resources
            .iter()
            .filter_map(|(subject, keys)| {
                let permissions: Vec<String> = keys
                    .iter()
                    .filter(|key| assigned.contains(*key))
                    .map(|key| self.labels.short_label(key))
                    .collect();
                if permissions.is_empty() {
                    return None;
                }
                Some(AssignedResource {
                    subject: subject.clone(),
                    label: self.catalog.label_of(EntityKind::Resource, subject),
                    icon: self.catalog.icon_of(subject).map(str::to_string),
                    permissions,
                })
            })
            .collect()
    }

    pub fn assigned_pages(&self, assigned: &BTreeSet<String>) -> Vec<String> {
        self.assigned_entities(&self.categorized.pages, EntityKind::Page, assigned)
    }

    pub fn assigned_widgets(&self, assigned: &BTreeSet<String>) -> Vec<String> {
        self.assigned_entities(&self.categorized.widgets, EntityKind::Widget, assigned)
    }

    pub fn assigned_custom(&self, assigned: &BTreeSet<String>) -> Vec<String> {
        self.categorized
            .custom
            .iter()
            .filter(|key| assigned.contains(*key))
            .map(|key| self.labels.label(key))
            .collect()
    }

    fn assigned_entities(&self, keys: &[String], kind: EntityKind, assigned: &BTreeSet<String>) -> Vec<String> {
        keys.iter()
            .filter(|key| assigned.contains(*key))
            .map(|key| self.entity_label(kind, key))
            .collect()
    }

    pub fn summary(&self, assigned: &BTreeSet<String>) -> RoleSummary {
        RoleSummary {
            counts: self.counts(assigned),
            resources: self.assigned_resources(assigned),
            pages: self.assigned_pages(assigned),
            widgets: self.assigned_widgets(assigned),
            custom: self.assigned_custom(assigned),
        }
    }

    pub fn resource_groups(&self) -> Vec<ResourceGroup> {
        self.categorized
            .resources
            .iter()
            .map(|(subject, keys)| ResourceGroup {
                subject: subject.clone(),
                label: self.catalog.label_of(EntityKind::Resource, subject),
                icon: self.catalog.icon_of(subject).map(str::to_string),
                options: keys
                    .iter()
                    .map(|key| PermissionOption {
                        key: key.clone(),
                        label: self.labels.short_label(key),
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn page_options(&self) -> Vec<PermissionOption> {
        self.entity_options(&self.categorized.pages, EntityKind::Page)
    }

    pub fn widget_options(&self) -> Vec<PermissionOption> {
        self.entity_options(&self.categorized.widgets, EntityKind::Widget)
    }

    pub fn custom_options(&self) -> Vec<PermissionOption> {
        self.categorized
            .custom
            .iter()
            .map(|key| PermissionOption {
                key: key.clone(),
                label: self.labels.label(key),
            })
            .collect()
    }

    fn entity_options(&self, keys: &[String], kind: EntityKind) -> Vec<PermissionOption> {
        keys.iter()
            .map(|key| PermissionOption {
                key: key.clone(),
                label: self.entity_label(kind, key),
            })
            .collect()
    }

    fn entity_label(&self, kind: EntityKind, key: &str) -> String {
        self.catalog.label_of(kind, self.labels.subject(key))
    }

    /// Builds the checkbox form. `assigned` is the role's set in role mode
    /// and the user's direct permissions in user mode.
    pub fn form(&self, mode: EditMode, assigned: &BTreeSet<String>) -> PermissionForm {
        let (form_mode, inherited) = match mode {
            EditMode::Role => (FormMode::Role, BTreeSet::new()),
            EditMode::User { role_based } => (FormMode::User, role_based),
        };

        let mut fields = Vec::new();
        let mut push = |name: String, bucket: BucketKind, label: String, icon: Option<String>, options: Vec<PermissionOption>| {
            let options: Vec<PermissionOption> = options
                .into_iter()
                .filter(|option| !inherited.contains(&option.key))
                .collect();
            if options.is_empty() {
                return;
            }
            let selected = options
                .iter()
                .filter(|option| assigned.contains(&option.key))
                .map(|option| option.key.clone())
                .collect();
            fields.push(FormField {
                name,
                bucket,
                label,
                icon,
                options,
                selected,
            });
        };

        if self.tabs.resources.visible {
            for group in self.resource_groups() {
                push(
                    format!("resource_{}_permissions", group.subject.to_lowercase()),
                    BucketKind::Resources,
                    group.label,
                    group.icon,
                    group.options,
                );
            }
        }
        if self.tabs.pages.visible {
            push("page_permissions".to_string(), BucketKind::Pages, "Pages".to_string(), None, self.page_options());
        }
        if self.tabs.widgets.visible {
            push(
                "widget_permissions".to_string(),
                BucketKind::Widgets,
                "Widgets".to_string(),
                None,
                self.widget_options(),
            );
        }
        if self.tabs.custom.visible {
            push(
                "custom_permissions".to_string(),
                BucketKind::Custom,
                "Custom Permissions".to_string(),
                None,
                self.custom_options(),
            );
        }

        PermissionForm {
            mode: form_mode,
            fields,
            inherited,
        }
    }
}

//! Guardian configuration.
//!
//! # Load Order
//!
//! 1. Compile-time defaults (every section is `#[serde(default)]`)
//! 2. TOML file at `GUARDIAN_CONFIG` (falls back to `./guardian.toml`)
//! 3. `GUARDIAN_KEY_SEPARATOR` / `GUARDIAN_KEY_CASE` environment overrides

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{GuardianError, GuardianResult};

pub const CONFIG_ENV_VAR: &str = "GUARDIAN_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "guardian.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    pub super_admin: SuperAdminConfig,
    pub permission_key: PermissionKeyConfig,
    pub policies: PoliciesConfig,
    pub resources: ResourcesConfig,
    pub pages: EntityKindConfig,
    pub widgets: EntityKindConfig,
    /// `permission-key = "Label"` pairs for permissions outside any entity.
    pub custom_permissions: IndexMap<String, String>,
    /// Translation overrides, e.g. `"actions.viewAny" = "Voir tout"`.
    pub translations: IndexMap<String, String>,
    pub role_resource: RoleResourceConfig,
    /// Known auth guards. Empty disables the guard check during sync.
    pub guards: Vec<String>,
    pub panels: Vec<PanelConfig>,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            super_admin: SuperAdminConfig::default(),
            permission_key: PermissionKeyConfig::default(),
            policies: PoliciesConfig::default(),
            resources: ResourcesConfig::default(),
            pages: EntityKindConfig::pages(),
            widgets: EntityKindConfig::widgets(),
            custom_permissions: IndexMap::new(),
            translations: IndexMap::new(),
            role_resource: RoleResourceConfig::default(),
            guards: Vec::new(),
            panels: Vec::new(),
        }
    }
}

/// When the super-admin callback runs relative to policy evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterceptMode {
    /// Super-admin bypasses every check.
    #[default]
    Before,
    /// Super-admin only applies when no policy decided explicitly.
    After,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuperAdminConfig {
    pub enabled: bool,
    pub role_name: String,
    pub intercept: InterceptMode,
}

impl Default for SuperAdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            role_name: "Super Admin".to_string(),
            intercept: InterceptMode::Before,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionKeyConfig {
    pub separator: String,
    /// Validated when the key codec is built, not while parsing.
    pub case: String,
}

impl Default for PermissionKeyConfig {
    fn default() -> Self {
        Self {
            separator: ":".to_string(),
            case: "pascal".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoliciesConfig {
    pub path: PathBuf,
    /// Merge per-resource methods into `methods` (true) or replace them (false).
    pub merge: bool,
    pub methods: Vec<String>,
    pub single_parameter_methods: Vec<String>,
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        let methods = [
            "viewAny",
            "view",
            "create",
            "update",
            "delete",
            "restore",
            "forceDelete",
            "deleteAny",
            "restoreAny",
            "forceDeleteAny",
            "replicate",
            "reorder",
        ];
        let single = ["viewAny", "create", "deleteAny", "restoreAny", "forceDeleteAny", "reorder"];

        Self {
            path: PathBuf::from("policies"),
            merge: true,
            methods: methods.iter().map(|m| m.to_string()).collect(),
            single_parameter_methods: single.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Where a resource's permission subject comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectPolicy {
    #[default]
    Model,
    Class,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    pub subject: SubjectPolicy,
    /// Per-resource overrides keyed by resource class.
    pub manage: IndexMap<String, ManagedResource>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedResource {
    pub methods: Option<Vec<String>>,
}

pub const DEFAULT_PAGE_EXCLUDES: [&str; 1] = ["Filament\\Pages\\Dashboard"];
pub const DEFAULT_WIDGET_EXCLUDES: [&str; 2] = [
    "Filament\\Widgets\\AccountWidget",
    "Filament\\Widgets\\FilamentInfoWidget",
];

/// Page or widget settings. Leaving out the whole `[pages]`/`[widgets]`
/// table keeps the built-in excludes; a table without `exclude` excludes
/// nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityKindConfig {
    pub prefix: String,
    pub exclude: Vec<String>,
}

impl EntityKindConfig {
    pub fn pages() -> Self {
        Self::excluding(&DEFAULT_PAGE_EXCLUDES)
    }

    pub fn widgets() -> Self {
        Self::excluding(&DEFAULT_WIDGET_EXCLUDES)
    }

    fn excluding(classes: &[&str]) -> Self {
        Self {
            exclude: classes.iter().map(|class| class.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl Default for EntityKindConfig {
    fn default() -> Self {
        Self {
            prefix: "view".to_string(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleResourceConfig {
    pub tabs: TabsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabsConfig {
    pub resources: TabConfig,
    pub pages: TabConfig,
    pub widgets: TabConfig,
    pub custom: TabConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabConfig {
    pub visible: bool,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self { visible: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub id: String,
    #[serde(default = "default_guard")]
    pub guard: String,
    #[serde(default)]
    pub tenancy: bool,
    #[serde(default)]
    pub super_admin: PanelSuperAdminConfig,
    #[serde(default)]
    pub resources: Vec<EntityEntry>,
    #[serde(default)]
    pub pages: Vec<EntityEntry>,
    #[serde(default)]
    pub widgets: Vec<EntityEntry>,
}

fn default_guard() -> String {
    "web".to_string()
}

/// Panel-level super-admin overrides. Unset fields inherit the global value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSuperAdminConfig {
    pub enabled: Option<bool>,
    pub role_name: Option<String>,
    pub intercept: Option<InterceptMode>,
}

/// One entity registered in a panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityEntry {
    pub class: String,
    /// Model class backing a resource.
    pub model: Option<String>,
    /// Resource plural label, page navigation label or widget heading.
    pub label: Option<String>,
    pub icon: Option<String>,
    /// The resource model is an authenticatable user model.
    pub authenticatable: bool,
}

impl EntityEntry {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl GuardianConfig {
    /// Loads from `GUARDIAN_CONFIG`, or `./guardian.toml` when present, then
    /// applies environment overrides.
    pub fn from_env() -> GuardianResult<Self> {
        let mut config = match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE)?,
            Err(_) => {
                tracing::warn!("no {} found, using default configuration", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };

        if let Ok(separator) = std::env::var("GUARDIAN_KEY_SEPARATOR") {
            config.permission_key.separator = separator;
        }
        if let Ok(case) = std::env::var("GUARDIAN_KEY_CASE") {
            config.permission_key.case = case;
        }

        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> GuardianResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| GuardianError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&raw).map_err(|source| GuardianError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), panels = config.panels.len(), "loaded guardian config");
        Ok(config)
    }

    pub fn panel(&self, id: &str) -> GuardianResult<&PanelConfig> {
        self.panels
            .iter()
            .find(|panel| panel.id == id)
            .ok_or_else(|| GuardianError::configuration(format!("panel '{}' not found", id)))
    }

    /// Every panel when `requested` is empty, else the requested ones in
    /// registry order. Unknown ids are a configuration error.
    pub fn select_panels(&self, requested: &[String]) -> GuardianResult<Vec<&PanelConfig>> {
        if let Some(unknown) = requested.iter().find(|id| self.panel(id).is_err()) {
            return Err(GuardianError::configuration(format!("panel '{}' not found", unknown)));
        }

        Ok(self
            .panels
            .iter()
            .filter(|panel| requested.is_empty() || requested.contains(&panel.id))
            .collect())
    }

    /// Super-admin settings for a panel, or the global ones when `panel_id`
    /// is `None` or unknown.
    pub fn super_admin_for(&self, panel_id: Option<&str>) -> SuperAdminConfig {
        let global = self.super_admin.clone();
        let Some(panel) = panel_id.and_then(|id| self.panel(id).ok()) else {
            return global;
        };

        let overrides = &panel.super_admin;
        SuperAdminConfig {
            enabled: overrides.enabled.unwrap_or(global.enabled),
            role_name: overrides.role_name.clone().unwrap_or(global.role_name),
            intercept: overrides.intercept.unwrap_or(global.intercept),
        }
    }

    /// `policies.methods`, merged with or replaced by the resource override.
    pub fn resource_methods(&self, resource_class: &str) -> Vec<String> {
        let defaults = &self.policies.methods;
        let Some(overrides) = self
            .resources
            .manage
            .get(resource_class)
            .and_then(|managed| managed.methods.as_ref())
        else {
            return defaults.clone();
        };

        if !self.policies.merge {
            return overrides.clone();
        }

        let mut merged: Vec<String> = Vec::with_capacity(defaults.len() + overrides.len());
        for method in defaults.iter().chain(overrides) {
            if !merged.contains(method) {
                merged.push(method.clone());
            }
        }
        merged
    }
}

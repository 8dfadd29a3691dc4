//! Per-resource policy documents mapping each method to the permission key
//! it checks.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::catalog::EntityCatalog;
use crate::config::GuardianConfig;
use crate::errors::GuardianResult;
use crate::keys::SharedKeyBuilder;
use crate::strings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMethod {
    pub method: String,
    pub permission: String,
    /// The method takes only the user, not a model instance.
    pub single_parameter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    pub name: String,
    pub model: String,
    pub resource: String,
    pub subject: String,
    pub methods: Vec<PolicyMethod>,
}

impl ResourcePolicy {
    pub fn permission_for(&self, method: &str) -> Option<&str> {
        self.methods
            .iter()
            .find(|m| m.method == method)
            .map(|m| m.permission.as_str())
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.name)
    }

    /// Matches the resource class, its basename, or the basename without
    /// the `Resource` suffix (`InvoiceResource` answers to `Invoice`).
    pub fn matches_resource(&self, requested: &str) -> bool {
        let requested = requested.trim();
        let basename = strings::class_basename(&self.resource);
        self.resource == requested || basename == requested || basename.replace("Resource", "") == requested
    }
}

/// Outcome of [`PolicyGenerator::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    /// Files that already existed and were left untouched.
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PolicyGenerator {
    builder: SharedKeyBuilder,
    single_parameter_methods: Vec<String>,
    path: PathBuf,
}

impl PolicyGenerator {
    pub fn new(config: &GuardianConfig, builder: SharedKeyBuilder) -> Self {
        Self {
            builder,
            single_parameter_methods: config.policies.single_parameter_methods.clone(),
            path: config.policies.path.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn generate(&self, catalog: &EntityCatalog) -> Vec<ResourcePolicy> {
        catalog
            .resource_subjects()
            .values()
            .map(|resource| {
                let model = strings::class_basename(resource.model.as_deref().unwrap_or(&resource.class)).to_string();
                let methods = resource
                    .actions
                    .iter()
                    .map(|method| PolicyMethod {
                        method: method.clone(),
                        permission: self.builder.build(method, &resource.basename),
                        single_parameter: resource.authenticatable
                            || self.single_parameter_methods.contains(method),
                    })
                    .collect();

                ResourcePolicy {
                    name: format!("{}Policy", model),
                    model,
                    resource: resource.class.clone(),
                    subject: resource.subject.clone(),
                    methods,
                }
            })
            .collect()
    }

    /// Writes one pretty-printed JSON document per policy, creating the
    /// target directory when missing. Existing files are only replaced when
    /// `force` is set.
    pub fn write(&self, policies: &[ResourcePolicy], force: bool) -> GuardianResult<WriteReport> {
        std::fs::create_dir_all(&self.path)
            .with_context(|| format!("failed to create policy directory {}", self.path.display()))?;

        let mut report = WriteReport::default();
        for policy in policies {
            let target = self.path.join(policy.file_name());
            if target.exists() && !force {
                tracing::info!(policy = %policy.name, path = %target.display(), "policy exists, skipping");
                report.skipped.push(target);
                continue;
            }

            let body = serde_json::to_string_pretty(policy).context("failed to serialize policy")?;
            std::fs::write(&target, body).with_context(|| format!("failed to write {}", target.display()))?;
            tracing::info!(policy = %policy.name, path = %target.display(), "wrote policy");
            report.written.push(target);
        }
        Ok(report)
    }
}

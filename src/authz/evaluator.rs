use std::sync::Arc;

use crate::config::{InterceptMode, SuperAdminConfig};
use crate::policy::ResourcePolicy;

use super::principal::Principal;

/// Outcome of a single policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    /// The policy has no opinion.
    Abstain,
}

/// Policy evaluator trait for pluggable authorization logic
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(&self, principal: &Principal, ability: &str) -> Decision;
}

/// Allows abilities the principal holds as a permission key and abstains
/// on everything else.
#[derive(Debug, Clone, Default)]
pub struct PermissionPolicy;

impl PolicyEvaluator for PermissionPolicy {
    fn evaluate(&self, principal: &Principal, ability: &str) -> Decision {
        if principal.has_permission(ability) {
            Decision::Allow
        } else {
            Decision::Abstain
        }
    }
}

/// Super-admin aware gate.
///
/// Evaluation order in `before` mode:
/// 1. super-admin role -> allow
/// 2. policy decision, abstain counts as deny
///
/// In `after` mode an explicit policy decision stands and the super-admin
/// role only fills in when the policy abstains.
#[derive(Clone)]
pub struct Gate {
    settings: SuperAdminConfig,
    policy: Arc<dyn PolicyEvaluator>,
}

impl Gate {
    pub fn new(settings: SuperAdminConfig) -> Self {
        Self::with_policy(settings, Arc::new(PermissionPolicy))
    }

    pub fn with_policy(settings: SuperAdminConfig, policy: Arc<dyn PolicyEvaluator>) -> Self {
        Self { settings, policy }
    }

    pub fn settings(&self) -> &SuperAdminConfig {
        &self.settings
    }

    pub fn is_super_admin_role(&self, role: &str) -> bool {
        self.settings.enabled && role == self.settings.role_name
    }

    pub fn is_super_admin(&self, principal: &Principal) -> bool {
        self.settings.enabled && principal.has_role(&self.settings.role_name)
    }

    pub fn allows(&self, principal: &Principal, ability: &str) -> bool {
        let super_admin = self.is_super_admin(principal);

        if super_admin && self.settings.intercept == InterceptMode::Before {
            tracing::debug!(
                user_id = %principal.user_id,
                ability = %ability,
                "super_admin bypass"
            );
            return true;
        }

        let allowed = match self.policy.evaluate(principal, ability) {
            Decision::Allow => true,
            Decision::Deny => false,
            Decision::Abstain => super_admin,
        };

        if allowed {
            tracing::debug!(user_id = %principal.user_id, ability = %ability, "ability allowed");
        } else {
            tracing::debug!(user_id = %principal.user_id, ability = %ability, "ability denied");
        }
        allowed
    }

    pub fn denies(&self, principal: &Principal, ability: &str) -> bool {
        !self.allows(principal, ability)
    }

    /// Checks the permission a generated policy maps `method` to. Unknown
    /// methods are denied.
    pub fn allows_policy(&self, principal: &Principal, policy: &ResourcePolicy, method: &str) -> bool {
        match policy.permission_for(method) {
            Some(permission) => self.allows(principal, permission),
            None => {
                tracing::debug!(policy = %policy.name, method = %method, "policy has no such method");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GuardScope;
    use uuid::Uuid;

    struct DenyDelete;

    impl PolicyEvaluator for DenyDelete {
        fn evaluate(&self, principal: &Principal, ability: &str) -> Decision {
            if ability.starts_with("Delete") {
                Decision::Deny
            } else {
                PermissionPolicy.evaluate(principal, ability)
            }
        }
    }

    fn principal(roles: &[&str], perms: &[&str]) -> Principal {
        Principal::new(Uuid::new_v4(), GuardScope::new("web"))
            .with_roles(roles.iter().map(|r| r.to_string()))
            .with_permissions(perms.iter().map(|p| p.to_string()))
    }

    #[test]
    fn test_super_admin_bypasses_all_in_before_mode() {
        let gate = Gate::with_policy(SuperAdminConfig::default(), Arc::new(DenyDelete));
        let root = principal(&["Super Admin"], &[]);

        assert!(gate.allows(&root, "Delete:Invoice"));
        assert!(gate.allows(&root, "anything"));
    }

    #[test]
    fn test_after_mode_respects_explicit_denial() {
        let settings = SuperAdminConfig {
            intercept: InterceptMode::After,
            ..SuperAdminConfig::default()
        };
        let gate = Gate::with_policy(settings, Arc::new(DenyDelete));
        let root = principal(&["Super Admin"], &[]);

        assert!(!gate.allows(&root, "Delete:Invoice"));
        assert!(gate.allows(&root, "Update:Invoice"));
    }

    #[test]
    fn test_permission_policy_allows_held_keys_only() {
        let gate = Gate::new(SuperAdminConfig::default());
        let editor = principal(&["Editor"], &["View:Invoice"]);

        assert!(gate.allows(&editor, "View:Invoice"));
        assert!(gate.denies(&editor, "Update:Invoice"));
    }

    #[test]
    fn test_disabled_super_admin_is_ordinary_role() {
        let settings = SuperAdminConfig {
            enabled: false,
            ..SuperAdminConfig::default()
        };
        let gate = Gate::new(settings);
        let root = principal(&["Super Admin"], &[]);

        assert!(!gate.is_super_admin_role("Super Admin"));
        assert!(!gate.allows(&root, "View:Invoice"));
    }
}

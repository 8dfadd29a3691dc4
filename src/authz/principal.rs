use std::collections::HashSet;

use uuid::Uuid;

use crate::store::GuardScope;

/// Principal represents the authenticated user with the roles and effective
/// permissions loaded for one guard scope.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub scope: GuardScope,
    pub roles: HashSet<String>,
    /// Role-based and direct permissions combined.
    pub permissions: HashSet<String>,
}

impl Principal {
    pub fn new(user_id: Uuid, scope: GuardScope) -> Self {
        Self {
            user_id,
            scope,
            roles: HashSet::new(),
            permissions: HashSet::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = String>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_permissions(mut self, perms: impl IntoIterator<Item = String>) -> Self {
        self.permissions = perms.into_iter().collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_roles_and_permissions() {
        let principal = Principal::new(Uuid::new_v4(), GuardScope::new("web"))
            .with_roles(vec!["Editor".to_string()])
            .with_permissions(vec!["View:Invoice".to_string(), "View:Invoice".to_string()]);

        assert!(principal.has_role("Editor"));
        assert!(!principal.has_role("editor"));
        assert!(principal.has_permission("View:Invoice"));
        assert_eq!(principal.permissions.len(), 1);
    }
}

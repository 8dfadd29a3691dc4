pub mod auth;
pub mod health;
pub mod permissions;
pub mod roles;
pub mod users;

use axum::http::HeaderMap;
use serde::Serialize;

use crate::app::AppState;
use crate::authz::{abilities, Gate, Principal};
use crate::catalog::PanelInfo;
use crate::errors::{GuardianError, GuardianResult};
use crate::evaluation::Evaluation;
use crate::jwt::AuthUser;
use crate::models::rbac::Role;
use crate::roles::RoleService;
use crate::store::{GuardScope, SqliteStore};
use crate::view::PermissionForm;

pub const TEAM_HEADER: &str = "x-team-id";

/// Everything a panel-scoped handler needs, resolved once per request.
pub(crate) struct PanelContext {
    pub panel: PanelInfo,
    pub scope: GuardScope,
    pub principal: Principal,
    pub gate: Gate,
    pub evaluation: Evaluation,
    pub roles: RoleService,
    pub store: SqliteStore,
    state: AppState,
}

impl PanelContext {
    pub async fn resolve(state: &AppState, panel_id: &str, headers: &HeaderMap, auth: &AuthUser) -> GuardianResult<Self> {
        let panel = state
            .registry
            .panel(panel_id)
            .map_err(|_| GuardianError::not_found(format!("panel '{}' not found", panel_id)))?;

        let team = headers
            .get(TEAM_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        if panel.tenancy && team.is_none() {
            return Err(GuardianError::bad_request(format!("panel '{}' requires the X-Team-Id header", panel.id)));
        }

        let scope = GuardScope::new(panel.guard.clone()).with_team(team);
        let roles = state.roles(&panel.id);
        let principal = roles.principal_for(auth.user_id, &scope).await?;
        let gate = Gate::new(state.config.super_admin_for(Some(&panel.id)));

        Ok(Self {
            panel,
            scope,
            principal,
            gate,
            evaluation: state.evaluation(),
            roles,
            store: state.store(),
            state: state.clone(),
        })
    }

    /// Checks a role-management ability such as `update`.
    pub fn authorize(&self, ability: &str) -> GuardianResult<()> {
        let key = self.state.builder.build(ability, abilities::ROLE_SUBJECT);
        if self.gate.allows(&self.principal, &key) {
            Ok(())
        } else {
            Err(GuardianError::forbidden(format!("missing permission '{}'", key)))
        }
    }

    /// Loads a role and hides roles from other guards or teams.
    pub async fn role(&self, role_id: uuid::Uuid) -> GuardianResult<Role> {
        let role = self.roles.find_role(role_id).await?;
        if !self.scope.sees(&role.guard_name, role.team_id.as_deref()) {
            return Err(GuardianError::not_found("Role not found"));
        }
        Ok(role)
    }
}

#[derive(Debug, Serialize)]
pub struct FormResponse {
    pub form: PermissionForm,
    pub select_all: bool,
}

impl From<PermissionForm> for FormResponse {
    fn from(form: PermissionForm) -> Self {
        Self {
            select_all: form.is_all_selected(),
            form,
        }
    }
}

//! Role and permission mutations.
//!
//! The super-admin role is protected: renaming it, deleting it or replacing
//! its permissions fails with a protection violation before anything is
//! written.

use std::collections::BTreeSet;

use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::authz::Principal;
use crate::catalog::PanelInfo;
use crate::config::SuperAdminConfig;
use crate::errors::{GuardianError, GuardianResult};
use crate::models::rbac::{HasAssignableRoles, HasDirectPermissions, Role, ROLE_COLUMNS};
use crate::store::GuardScope;
use crate::utils::utc_now;

const CANNOT_MODIFY: &str = "The super-admin role cannot be modified.";
const CANNOT_DELETE: &str = "The super-admin role cannot be deleted.";

#[derive(Debug, Clone)]
pub struct RoleService {
    pool: SqlitePool,
    super_admin: SuperAdminConfig,
}

impl RoleService {
    pub fn new(pool: SqlitePool, super_admin: SuperAdminConfig) -> Self {
        Self { pool, super_admin }
    }

    pub fn is_protected(&self, role: &Role) -> bool {
        self.super_admin.enabled && role.name == self.super_admin.role_name
    }

    fn ensure_not_protected(&self, role: &Role, message: &str) -> GuardianResult<()> {
        if self.is_protected(role) {
            tracing::warn!(role_id = %role.id, role = %role.name, "blocked change to super-admin role");
            return Err(GuardianError::protected(message));
        }
        Ok(())
    }

    pub async fn list_roles(&self, scope: &GuardScope) -> GuardianResult<Vec<Role>> {
        let rows = sqlx::query(&format!(
            "{ROLE_COLUMNS} WHERE guard_name = ? AND (team_id IS NULL OR team_id = ?) ORDER BY name"
        ))
        .bind(&scope.guard)
        .bind(&scope.team)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Role::from_row).collect()
    }

    pub async fn find_role(&self, role_id: Uuid) -> GuardianResult<Role> {
        let row = sqlx::query(&format!("{ROLE_COLUMNS} WHERE id = ?"))
            .bind(role_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| GuardianError::not_found("Role not found"))?;

        Role::from_row(&row)
    }

    pub async fn find_role_by_name(&self, name: &str, scope: &GuardScope) -> GuardianResult<Option<Role>> {
        let row = sqlx::query(&format!(
            "{ROLE_COLUMNS} WHERE name = ? AND guard_name = ? AND IFNULL(team_id, '') = IFNULL(?, '')"
        ))
        .bind(name)
        .bind(&scope.guard)
        .bind(&scope.team)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Role::from_row).transpose()
    }

    pub async fn create_role(&self, name: &str, scope: &GuardScope, permissions: &[String]) -> GuardianResult<Role> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GuardianError::bad_request("role name must not be empty"));
        }
        if self.find_role_by_name(name, scope).await?.is_some() {
            return Err(GuardianError::conflict(format!("role '{}' already exists", name)));
        }

        let ids = self.permission_ids(permissions, scope).await?;
        let id = Uuid::new_v4();
        let now = utc_now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO roles (id, name, guard_name, team_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(name)
        .bind(&scope.guard)
        .bind(&scope.team)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        write_role_permissions(&mut tx, id, &ids).await?;
        tx.commit().await?;

        tracing::info!(role_id = %id, role = %name, scope = %scope, "created role");
        self.find_role(id).await
    }

    pub async fn rename_role(&self, role_id: Uuid, new_name: &str) -> GuardianResult<Role> {
        self.update_role(role_id, Some(new_name), None).await
    }

    /// Renames the role and/or replaces its permissions. Both inputs are
    /// checked before anything is written and the changes commit together.
    pub async fn update_role(
        &self,
        role_id: Uuid,
        name: Option<&str>,
        permissions: Option<&[String]>,
    ) -> GuardianResult<Role> {
        let role = self.find_role(role_id).await?;
        if name.is_none() && permissions.is_none() {
            return Ok(role);
        }
        self.ensure_not_protected(&role, CANNOT_MODIFY)?;

        let scope = GuardScope::new(role.guard_name.clone()).with_team(role.team_id.clone());
        let new_name = match name {
            Some(name) => self.checked_rename(&role, name, &scope).await?,
            None => None,
        };
        let ids = match permissions {
            Some(keys) => Some(self.permission_ids(keys, &scope).await?),
            None => None,
        };

        let mut tx = self.pool.begin().await?;
        if let Some(new_name) = new_name {
            sqlx::query("UPDATE roles SET name = ?, updated_at = ? WHERE id = ?")
                .bind(new_name)
                .bind(utc_now())
                .bind(role_id.to_string())
                .execute(&mut *tx)
                .await?;
            tracing::info!(role_id = %role_id, from = %role.name, to = %new_name, "renamed role");
        }
        if let Some(ids) = &ids {
            write_role_permissions(&mut tx, role_id, ids).await?;
            tracing::debug!(role_id = %role_id, count = ids.len(), "synced role permissions");
        }
        tx.commit().await?;

        self.find_role(role_id).await
    }

    /// The trimmed new name, or `None` when it equals the current one.
    async fn checked_rename<'n>(
        &self,
        role: &Role,
        name: &'n str,
        scope: &GuardScope,
    ) -> GuardianResult<Option<&'n str>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GuardianError::bad_request("role name must not be empty"));
        }
        if name == role.name {
            return Ok(None);
        }
        if self.find_role_by_name(name, scope).await?.is_some() {
            return Err(GuardianError::conflict(format!("role '{}' already exists", name)));
        }
        Ok(Some(name))
    }

    pub async fn delete_role(&self, role_id: Uuid) -> GuardianResult<()> {
        let role = self.find_role(role_id).await?;
        self.ensure_not_protected(&role, CANNOT_DELETE)?;

        let mut tx = self.pool.begin().await?;
        for statement in [
            "DELETE FROM role_has_permissions WHERE role_id = ?",
            "DELETE FROM model_has_roles WHERE role_id = ?",
            "DELETE FROM roles WHERE id = ?",
        ] {
            sqlx::query(statement).bind(role_id.to_string()).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::info!(role_id = %role_id, role = %role.name, "deleted role");
        Ok(())
    }

    /// Replaces the role's permissions. Every key must exist in the role's scope.
    pub async fn sync_role_permissions(&self, role_id: Uuid, keys: &[String]) -> GuardianResult<BTreeSet<String>> {
        self.update_role(role_id, None, Some(keys)).await?;
        self.role_permissions(role_id).await
    }

    pub async fn role_permissions(&self, role_id: Uuid) -> GuardianResult<BTreeSet<String>> {
        let rows = sqlx::query(
            "SELECT p.name FROM permissions p \
             JOIN role_has_permissions rp ON rp.permission_id = p.id \
             WHERE rp.role_id = ?",
        )
        .bind(role_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }

    /// First-or-create of the super-admin role for a panel. Panels with
    /// tenancy need a team.
    pub async fn create_super_admin_role(&self, panel: &PanelInfo, team: Option<&str>) -> GuardianResult<Role> {
        if !self.super_admin.enabled {
            return Err(GuardianError::configuration(format!(
                "super-admin is disabled for panel '{}'",
                panel.id
            )));
        }
        if panel.tenancy && team.is_none() {
            return Err(GuardianError::configuration(format!(
                "panel '{}' uses tenancy, a team id is required",
                panel.id
            )));
        }

        let scope = GuardScope::new(panel.guard.clone()).with_team(team.map(str::to_string));
        if let Some(role) = self.find_role_by_name(&self.super_admin.role_name, &scope).await? {
            return Ok(role);
        }
        self.create_role(&self.super_admin.role_name, &scope, &[]).await
    }

    pub async fn assign_role<H>(&self, holder: &H, role_id: Uuid) -> GuardianResult<()>
    where
        H: HasAssignableRoles + Sync,
    {
        let role = self.find_role(role_id).await?;
        sqlx::query("INSERT OR IGNORE INTO model_has_roles (role_id, user_id) VALUES (?, ?)")
            .bind(role.id.to_string())
            .bind(holder.holder_id().to_string())
            .execute(&self.pool)
            .await?;

        tracing::info!(role = %role.name, holder = %holder.holder_id(), "assigned role");
        Ok(())
    }

    pub async fn roles_of(&self, user_id: Uuid, scope: &GuardScope) -> GuardianResult<Vec<Role>> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.guard_name, r.team_id, r.created_at, r.updated_at FROM roles r \
             JOIN model_has_roles mr ON mr.role_id = r.id \
             WHERE mr.user_id = ? AND r.guard_name = ? AND (r.team_id IS NULL OR r.team_id = ?) \
             ORDER BY r.name",
        )
        .bind(user_id.to_string())
        .bind(&scope.guard)
        .bind(&scope.team)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Role::from_row).collect()
    }

    /// Replaces the holder's direct permissions in `scope`.
    pub async fn sync_direct_permissions<H>(
        &self,
        holder: &H,
        scope: &GuardScope,
        keys: &[String],
    ) -> GuardianResult<BTreeSet<String>>
    where
        H: HasDirectPermissions + Sync,
    {
        let user_id = holder.holder_id();
        let ids = self.permission_ids(keys, scope).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM model_has_permissions WHERE user_id = ? AND permission_id IN \
             (SELECT id FROM permissions WHERE guard_name = ? AND (team_id IS NULL OR team_id = ?))",
        )
        .bind(user_id.to_string())
        .bind(&scope.guard)
        .bind(&scope.team)
        .execute(&mut *tx)
        .await?;

        for id in &ids {
            sqlx::query("INSERT OR IGNORE INTO model_has_permissions (permission_id, user_id) VALUES (?, ?)")
                .bind(id)
                .bind(user_id.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::debug!(user_id = %user_id, count = ids.len(), "synced direct permissions");
        self.direct_permissions(user_id, scope).await
    }

    pub async fn direct_permissions(&self, user_id: Uuid, scope: &GuardScope) -> GuardianResult<BTreeSet<String>> {
        let rows = sqlx::query(
            "SELECT p.name FROM permissions p \
             JOIN model_has_permissions mp ON mp.permission_id = p.id \
             WHERE mp.user_id = ? AND p.guard_name = ? AND (p.team_id IS NULL OR p.team_id = ?)",
        )
        .bind(user_id.to_string())
        .bind(&scope.guard)
        .bind(&scope.team)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }

    /// Keys the user holds through any of their roles in `scope`.
    pub async fn role_based_permissions(&self, user_id: Uuid, scope: &GuardScope) -> GuardianResult<BTreeSet<String>> {
        let mut keys = BTreeSet::new();
        for role in self.roles_of(user_id, scope).await? {
            keys.extend(self.role_permissions(role.id).await?);
        }
        Ok(keys)
    }

    pub async fn principal_for(&self, user_id: Uuid, scope: &GuardScope) -> GuardianResult<Principal> {
        let roles = self.roles_of(user_id, scope).await?;
        let mut permissions = self.direct_permissions(user_id, scope).await?;
        for role in &roles {
            permissions.extend(self.role_permissions(role.id).await?);
        }

        Ok(Principal::new(user_id, scope.clone())
            .with_roles(roles.into_iter().map(|role| role.name))
            .with_permissions(permissions))
    }

    async fn permission_ids(&self, keys: &[String], scope: &GuardScope) -> GuardianResult<Vec<i64>> {
        let mut ids = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();

        for key in keys {
            let id: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM permissions WHERE name = ? AND guard_name = ? AND (team_id IS NULL OR team_id = ?) \
                 ORDER BY team_id IS NULL LIMIT 1",
            )
            .bind(key)
            .bind(&scope.guard)
            .bind(&scope.team)
            .fetch_optional(&self.pool)
            .await?;

            match id {
                Some(id) if !ids.contains(&id) => ids.push(id),
                Some(_) => {}
                None => missing.push(key.as_str()),
            }
        }

        if !missing.is_empty() {
            return Err(GuardianError::bad_request(format!(
                "unknown permissions for guard '{}': {}",
                scope,
                missing.join(", ")
            )));
        }
        Ok(ids)
    }
}

async fn write_role_permissions(conn: &mut SqliteConnection, role_id: Uuid, ids: &[i64]) -> GuardianResult<()> {
    sqlx::query("DELETE FROM role_has_permissions WHERE role_id = ?")
        .bind(role_id.to_string())
        .execute(&mut *conn)
        .await?;

    for id in ids {
        sqlx::query("INSERT INTO role_has_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(role_id.to_string())
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("UPDATE roles SET updated_at = ? WHERE id = ?")
        .bind(utc_now())
        .bind(role_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

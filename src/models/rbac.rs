use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::errors::{GuardianError, GuardianResult};

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Anything that can hold roles or permissions, keyed by its id.
pub trait PermissionHolder {
    fn holder_id(&self) -> Uuid;
}

/// Holders that roles can be assigned to.
pub trait HasAssignableRoles: PermissionHolder {}

/// Holders that can be granted permissions directly, outside any role.
pub trait HasDirectPermissions: PermissionHolder {}

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub guard_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const ROLE_COLUMNS: &str = "SELECT id, name, guard_name, team_id, created_at, updated_at FROM roles";

impl Role {
    pub(crate) fn from_row(row: &sqlx::sqlite::SqliteRow) -> GuardianResult<Self> {
        let id: String = row.try_get("id")?;
        Ok(Self {
            id: Uuid::parse_str(&id).map_err(|err| GuardianError::internal(format!("invalid role id '{id}': {err}")))?,
            name: row.try_get("name")?,
            guard_name: row.try_get("guard_name")?,
            team_id: row.try_get("team_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleCreateRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    pub name: Option<String>,
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionsUpdateRequest {
    pub permissions: Vec<String>,
}

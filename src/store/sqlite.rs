use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{GuardScope, PermissionStore};
use crate::errors::GuardianResult;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PermissionStore for SqliteStore {
    async fn exists(&self, key: &str, scope: &GuardScope) -> GuardianResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM permissions WHERE name = ? AND guard_name = ? AND IFNULL(team_id, '') = IFNULL(?, '')",
        )
        .bind(key)
        .bind(&scope.guard)
        .bind(&scope.team)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn create_if_absent(&self, key: &str, scope: &GuardScope) -> GuardianResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO permissions (name, guard_name, team_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(key)
        .bind(&scope.guard)
        .bind(&scope.team)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn names(&self, scope: &GuardScope) -> GuardianResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM permissions WHERE guard_name = ? AND (team_id IS NULL OR team_id = ?) ORDER BY id",
        )
        .bind(&scope.guard)
        .bind(&scope.team)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>("name")).collect())
    }

    async fn permissions_of_role(&self, role_id: Uuid) -> GuardianResult<BTreeSet<String>> {
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
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{GuardianError, GuardianResult};
use crate::models::rbac::{HasAssignableRoles, HasDirectPermissions, PermissionHolder};
use crate::utils::{hash_password, utc_now};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PermissionHolder for User {
    fn holder_id(&self) -> Uuid {
        self.id
    }
}

impl HasAssignableRoles for User {}

impl HasDirectPermissions for User {}

#[derive(Debug, Clone)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbUser {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> GuardianResult<Self> {
        let id: String = row.try_get("id")?;
        Ok(Self {
            id: Uuid::parse_str(&id).map_err(|err| GuardianError::internal(format!("invalid user id '{id}': {err}")))?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<DbUser> for User {
    fn from(value: DbUser) -> Self {
        User {
            id: value.id,
            name: value.name,
            email: value.email,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Hook used by `create-user` and the super-admin command to persist a user.
#[async_trait]
pub trait UserFactory: Send + Sync {
    async fn create_user(&self, pool: &SqlitePool, new_user: NewUser) -> GuardianResult<User>;
}

/// Stores the password as an Argon2 hash.
#[derive(Debug, Clone, Default)]
pub struct Argon2UserFactory;

#[async_trait]
impl UserFactory for Argon2UserFactory {
    async fn create_user(&self, pool: &SqlitePool, new_user: NewUser) -> GuardianResult<User> {
        ensure_email_available(pool, &new_user.email).await?;

        let password_hash = hash_password(&new_user.password)?;
        let now = utc_now();
        let user_id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id.to_string())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        tracing::info!(user_id = %user_id, email = %new_user.email, "created user");
        Ok(fetch_user(pool, user_id).await?.into())
    }
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> GuardianResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(GuardianError::conflict(format!("email '{}' already in use", email)));
    }
    Ok(())
}

const USER_COLUMNS: &str = "SELECT id, name, email, password_hash, created_at, updated_at FROM users";

pub async fn fetch_user(pool: &SqlitePool, user_id: Uuid) -> GuardianResult<DbUser> {
    let row = sqlx::query(&format!("{USER_COLUMNS} WHERE id = ?"))
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| GuardianError::not_found("User not found"))?;

    DbUser::from_row(&row)
}

pub async fn fetch_user_by_email(pool: &SqlitePool, email: &str) -> GuardianResult<Option<DbUser>> {
    let row = sqlx::query(&format!("{USER_COLUMNS} WHERE email = ?"))
        .bind(email)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(DbUser::from_row).transpose()
}

use anyhow::Result;
use pretty_assertions::assert_eq;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use panel_guardian::catalog::PanelInfo;
use panel_guardian::config::SuperAdminConfig;
use panel_guardian::models::user::{Argon2UserFactory, NewUser, User, UserFactory};
use panel_guardian::roles::RoleService;
use panel_guardian::store::{GuardScope, PermissionStore, SqliteStore};
use panel_guardian::GuardianError;

async fn setup() -> Result<(SqlitePool, RoleService)> {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
    panel_guardian::db::migrate(&pool).await?;

    let store = SqliteStore::new(pool.clone());
    for key in ["ViewAny:Invoice", "View:Invoice", "Delete:Invoice", "impersonate-user"] {
        store.create_if_absent(key, &GuardScope::new("web")).await?;
    }

    let roles = RoleService::new(pool.clone(), SuperAdminConfig::default());
    Ok((pool, roles))
}

fn admin_panel() -> PanelInfo {
    PanelInfo {
        id: "admin".to_string(),
        guard: "web".to_string(),
        tenancy: false,
    }
}

async fn user(pool: &SqlitePool, email: &str) -> Result<User> {
    let new_user = NewUser {
        name: "Test User".to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
    };
    Ok(Argon2UserFactory.create_user(pool, new_user).await?)
}

#[tokio::test]
async fn super_admin_role_cannot_be_changed() -> Result<()> {
    let (_pool, roles) = setup().await?;
    let super_admin = roles.create_super_admin_role(&admin_panel(), None).await?;
    assert_eq!(super_admin.name, "Super Admin");
    assert!(roles.is_protected(&super_admin));

    let renamed = roles.rename_role(super_admin.id, "Root").await;
    assert!(matches!(renamed, Err(GuardianError::ProtectionViolation(_))));

    let synced = roles.sync_role_permissions(super_admin.id, &["View:Invoice".to_string()]).await;
    assert!(matches!(synced, Err(GuardianError::ProtectionViolation(_))));

    match roles.delete_role(super_admin.id).await {
        Err(GuardianError::ProtectionViolation(message)) => {
            assert_eq!(message, "The super-admin role cannot be deleted.")
        }
        other => panic!("expected protection violation, got {:?}", other),
    }

    // nothing was written
    let reloaded = roles.find_role(super_admin.id).await?;
    assert_eq!(reloaded.name, "Super Admin");
    assert!(roles.role_permissions(super_admin.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn super_admin_role_creation_is_first_or_create() -> Result<()> {
    let (_pool, roles) = setup().await?;
    let first = roles.create_super_admin_role(&admin_panel(), None).await?;
    let second = roles.create_super_admin_role(&admin_panel(), None).await?;
    assert_eq!(first.id, second.id);

    let tenant_panel = PanelInfo {
        tenancy: true,
        ..admin_panel()
    };
    let missing_team = roles.create_super_admin_role(&tenant_panel, None).await;
    assert!(matches!(missing_team, Err(GuardianError::Configuration(_))));

    let team_role = roles.create_super_admin_role(&tenant_panel, Some("team-a")).await?;
    assert_eq!(team_role.team_id.as_deref(), Some("team-a"));
    assert!(first.id != team_role.id);
    Ok(())
}

#[tokio::test]
async fn ordinary_roles_can_be_managed() -> Result<()> {
    let (_pool, roles) = setup().await?;
    let scope = GuardScope::new("web");

    let editor = roles
        .create_role("Editor", &scope, &["ViewAny:Invoice".to_string(), "View:Invoice".to_string()])
        .await?;
    assert!(!roles.is_protected(&editor));
    assert_eq!(roles.role_permissions(editor.id).await?.len(), 2);

    let duplicate = roles.create_role("Editor", &scope, &[]).await;
    assert!(matches!(duplicate, Err(GuardianError::Conflict(_))));

    let renamed = roles.rename_role(editor.id, "Reviewer").await?;
    assert_eq!(renamed.name, "Reviewer");

    let synced = roles.sync_role_permissions(editor.id, &["Delete:Invoice".to_string()]).await?;
    assert_eq!(synced.into_iter().collect::<Vec<_>>(), vec!["Delete:Invoice".to_string()]);

    let unknown = roles.sync_role_permissions(editor.id, &["Export:Orders".to_string()]).await;
    assert!(matches!(unknown, Err(GuardianError::BadRequest(_))));

    let partial = roles
        .update_role(editor.id, Some("Auditor"), Some(&["Export:Orders".to_string()]))
        .await;
    assert!(matches!(partial, Err(GuardianError::BadRequest(_))));
    assert_eq!(roles.find_role(editor.id).await?.name, "Reviewer");

    let updated = roles
        .update_role(editor.id, Some(" Auditor "), Some(&["View:Invoice".to_string()]))
        .await?;
    assert_eq!(updated.name, "Auditor");
    assert_eq!(roles.role_permissions(editor.id).await?.len(), 1);

    roles.delete_role(editor.id).await?;
    assert!(matches!(roles.find_role(editor.id).await, Err(GuardianError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn principal_combines_role_and_direct_permissions() -> Result<()> {
    let (pool, roles) = setup().await?;
    let scope = GuardScope::new("web");
    let alice = user(&pool, "alice@example.com").await?;

    let viewer = roles.create_role("Viewer", &scope, &["ViewAny:Invoice".to_string()]).await?;
    roles.assign_role(&alice, viewer.id).await?;
    roles
        .sync_direct_permissions(&alice, &scope, &["impersonate-user".to_string()])
        .await?;

    let principal = roles.principal_for(alice.id, &scope).await?;
    assert!(principal.has_role("Viewer"));
    assert!(principal.has_permission("ViewAny:Invoice"));
    assert!(principal.has_permission("impersonate-user"));
    assert!(!principal.has_permission("Delete:Invoice"));

    let role_based = roles.role_based_permissions(alice.id, &scope).await?;
    assert_eq!(role_based.into_iter().collect::<Vec<_>>(), vec!["ViewAny:Invoice".to_string()]);

    // replacing direct permissions drops the previous set
    let direct = roles.sync_direct_permissions(&alice, &scope, &[]).await?;
    assert!(direct.is_empty());
    assert!(!roles.principal_for(alice.id, &scope).await?.has_permission("impersonate-user"));
    Ok(())
}

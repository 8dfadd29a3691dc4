use anyhow::Context;
use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::util::ServiceExt; // for `oneshot`

use panel_guardian::catalog::{ConfigRegistry, EntityCatalog, RegistryProvider};
use panel_guardian::jwt::AccessTokens;
use panel_guardian::models::user::{Argon2UserFactory, NewUser, User, UserFactory};
use panel_guardian::roles::RoleService;
use panel_guardian::store::{GuardScope, SqliteStore};
use panel_guardian::sync::SyncPlanner;
use panel_guardian::{router, AppState, GuardianConfig, KeyCodec};

const CONFIG: &str = r#"
guards = ["web"]

[policies]
methods = ["viewAny", "view", "create", "update", "delete"]

[custom_permissions]
"impersonate-user" = "Impersonate User"

[[panels]]
id = "admin"

[[panels.resources]]
class = "App\\Filament\\Resources\\InvoiceResource"
model = "App\\Models\\Invoice"
label = "Invoices"

[[panels.resources]]
class = "App\\Filament\\Resources\\RoleResource"
model = "App\\Models\\Role"

[[panels.pages]]
class = "App\\Filament\\Pages\\SalesReport"

[[panels]]
id = "partner"
tenancy = true
"#;

struct TestApp {
    app: Router,
    tokens: AccessTokens,
    admin_token: String,
    bob: User,
    super_admin_id: String,
    roles: RoleService,
}

async fn setup() -> Result<TestApp> {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await?;
    panel_guardian::db::migrate(&pool).await?;

    let config: GuardianConfig = toml::from_str(CONFIG)?;
    let codec = KeyCodec::from_config(&config.permission_key)?;
    let registry = ConfigRegistry::new(&config);
    let admin = EntityCatalog::build(&registry, "admin", &config, &codec)?;

    let planner = SyncPlanner::new(&config, codec.shared());
    planner.reconcile(&planner.plan(&[&admin], None), &SqliteStore::new(pool.clone())).await?;

    let factory = Argon2UserFactory;
    let root = factory
        .create_user(
            &pool,
            NewUser {
                name: "Root".to_string(),
                email: "root@example.com".to_string(),
                password: "password123".to_string(),
            },
        )
        .await?;
    let bob = factory
        .create_user(
            &pool,
            NewUser {
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
                password: "password123".to_string(),
            },
        )
        .await?;

    let roles = RoleService::new(pool.clone(), config.super_admin_for(Some("admin")));
    let super_admin = roles.create_super_admin_role(&registry.panel("admin")?, None).await?;
    roles.assign_role(&root, super_admin.id).await?;

    let tokens = AccessTokens::new(b"test-secret", 1);
    let app = router(AppState::new(pool, tokens.clone(), config)?);

    let (status, login) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "root@example.com", "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "login failed: {}", login);
    let admin_token = login.get("token").and_then(|v| v.as_str()).context("missing token")?.to_string();

    Ok(TestApp {
        app,
        tokens,
        admin_token,
        bob,
        super_admin_id: super_admin.id.to_string(),
        roles,
    })
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, payload: Option<Value>) -> Result<(StatusCode, Value)> {
    send_with_team(app, method, uri, token, None, payload).await
}

async fn send_with_team(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    team: Option<&str>,
    payload: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    if let Some(team) = team {
        builder = builder.header("x-team-id", team);
    }
    let request_body = match payload {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let resp = app.clone().oneshot(builder.body(request_body)?).await?;
    let status = resp.status();
    let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes)?
    };
    Ok((status, value))
}

fn field<'a>(form: &'a Value, name: &str) -> Option<&'a Value> {
    form["form"]["fields"]
        .as_array()?
        .iter()
        .find(|field| field["name"] == name)
}

fn option_keys(field: &Value) -> Vec<String> {
    field["options"]
        .as_array()
        .map(|options| {
            options
                .iter()
                .filter_map(|option| option["key"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn super_admin_manages_roles() -> Result<()> {
    let t = setup().await?;
    let token = Some(t.admin_token.as_str());

    let (status, me) = send(&t.app, "GET", "/api/auth/me", token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "root@example.com");

    let (status, created) = send(
        &t.app,
        "POST",
        "/api/panels/admin/roles",
        token,
        Some(json!({ "name": "Editor", "permissions": ["ViewAny:Role", "View:Invoice", "impersonate-user"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", created);
    assert_eq!(created["protected"], false);
    assert_eq!(created["summary"]["counts"]["resources"], 2);
    assert_eq!(created["summary"]["counts"]["custom"], 1);
    assert_eq!(created["summary"]["custom"], json!(["Impersonate User"]));
    let editor_id = created["id"].as_str().context("missing role id")?.to_string();

    let (status, list) = send(&t.app, "GET", "/api/panels/admin/roles", token, None).await?;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = list
        .as_array()
        .context("roles list")?
        .iter()
        .filter_map(|role| role["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Editor", "Super Admin"]);
    assert_eq!(list[0]["permissions_count"], 3);
    assert_eq!(list[1]["protected"], true);

    let (status, form) = send(&t.app, "GET", &format!("/api/panels/admin/roles/{}/form", editor_id), token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["select_all"], false);
    let invoices = field(&form, "resource_invoice_permissions").context("invoice field")?;
    assert_eq!(invoices["label"], "Invoices");
    assert_eq!(option_keys(invoices).len(), 5);
    assert_eq!(invoices["selected"], json!(["View:Invoice"]));
    assert!(field(&form, "page_permissions").is_some());
    assert!(field(&form, "widget_permissions").is_none());

    let (status, updated) = send(
        &t.app,
        "PUT",
        &format!("/api/panels/admin/roles/{}", editor_id),
        token,
        Some(json!({ "name": "Reviewer", "permissions": ["View:SalesReport"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "update failed: {}", updated);
    assert_eq!(updated["name"], "Reviewer");
    assert_eq!(updated["summary"]["pages"], json!(["Sales Report"]));

    let (status, _) = send(
        &t.app,
        "PUT",
        &format!("/api/panels/admin/roles/{}", editor_id),
        token,
        Some(json!({ "permissions": ["Export:Orders"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&t.app, "DELETE", &format!("/api/panels/admin/roles/{}", editor_id), token, None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn super_admin_role_is_protected() -> Result<()> {
    let t = setup().await?;
    let token = Some(t.admin_token.as_str());
    let uri = format!("/api/panels/admin/roles/{}", t.super_admin_id);

    let (status, err) = send(&t.app, "DELETE", &uri, token, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "protected");

    let (status, _) = send(&t.app, "PUT", &uri, token, Some(json!({ "name": "Root" }))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, role) = send(&t.app, "GET", &uri, token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(role["name"], "Super Admin");
    Ok(())
}

#[tokio::test]
async fn rejected_role_update_changes_nothing() -> Result<()> {
    let t = setup().await?;
    let token = Some(t.admin_token.as_str());

    let (status, created) = send(
        &t.app,
        "POST",
        "/api/panels/admin/roles",
        token,
        Some(json!({ "name": "Editor", "permissions": ["View:Invoice"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", created);
    let uri = format!("/api/panels/admin/roles/{}", created["id"].as_str().context("missing role id")?);

    let (status, err) = send(
        &t.app,
        "PUT",
        &uri,
        token,
        Some(json!({ "name": "Renamed", "permissions": ["No:Such"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "bad_request");

    // a taken name must not let the permission list through either
    let (status, _) = send(
        &t.app,
        "PUT",
        &uri,
        token,
        Some(json!({ "name": "Super Admin", "permissions": ["View:SalesReport"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, role) = send(&t.app, "GET", &uri, token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(role["name"], "Editor");
    assert_eq!(role["summary"]["counts"]["resources"], 1);
    assert_eq!(role["summary"]["counts"]["pages"], 0);
    Ok(())
}

#[tokio::test]
async fn permissions_are_checked_per_ability() -> Result<()> {
    let t = setup().await?;
    let bob_token = t.tokens.issue(t.bob.id)?;
    let bob = Some(bob_token.as_str());

    let (status, _) = send(&t.app, "GET", "/api/panels/admin/roles", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, err) = send(&t.app, "GET", "/api/panels/admin/roles", bob, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "forbidden");

    let scope = GuardScope::new("web");
    let viewer = t.roles.create_role("Viewer", &scope, &["ViewAny:Role".to_string()]).await?;
    t.roles.assign_role(&t.bob, viewer.id).await?;

    let (status, _) = send(&t.app, "GET", "/api/panels/admin/roles", bob, None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&t.app, "DELETE", &format!("/api/panels/admin/roles/{}", viewer.id), bob, None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn user_form_hides_role_based_permissions() -> Result<()> {
    let t = setup().await?;
    let token = Some(t.admin_token.as_str());

    let (status, created) = send(
        &t.app,
        "POST",
        "/api/panels/admin/roles",
        token,
        Some(json!({ "name": "Viewer", "permissions": ["View:Invoice"] })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let viewer_id = created["id"].as_str().context("missing role id")?.parse()?;

    t.roles.assign_role(&t.bob, viewer_id).await?;

    let uri = format!("/api/panels/admin/users/{}/permissions", t.bob.id);
    let (status, form) = send(&t.app, "GET", &uri, token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["form"]["mode"], "user");
    assert_eq!(form["form"]["inherited"], json!(["View:Invoice"]));
    let invoices = field(&form, "resource_invoice_permissions").context("invoice field")?;
    assert!(!option_keys(invoices).contains(&"View:Invoice".to_string()));

    // inherited keys are not offered, so they cannot be granted directly
    let (status, _) = send(&t.app, "PUT", &uri, token, Some(json!({ "permissions": ["View:Invoice"] }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, saved) = send(&t.app, "PUT", &uri, token, Some(json!({ "permissions": ["impersonate-user"] }))).await?;
    assert_eq!(status, StatusCode::OK, "update failed: {}", saved);
    let custom = field(&saved, "custom_permissions").context("custom field")?;
    assert_eq!(custom["selected"], json!(["impersonate-user"]));
    assert_eq!(saved["select_all"], false);
    Ok(())
}

#[tokio::test]
async fn permission_listing_and_panel_resolution() -> Result<()> {
    let t = setup().await?;
    let token = Some(t.admin_token.as_str());

    let (status, listing) = send(&t.app, "GET", "/api/panels/admin/permissions", token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["guard"], "web");
    assert_eq!(listing["categorized"]["pages"], json!(["View:SalesReport"]));
    assert_eq!(listing["categorized"]["custom"], json!(["impersonate-user"]));
    assert_eq!(listing["resources"].as_array().map(Vec::len), Some(2));
    assert_eq!(listing["custom"][0]["label"], "Impersonate User");

    let (status, _) = send(&t.app, "GET", "/api/panels/missing/roles", token, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.app, "GET", "/api/panels/partner/roles", token, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // global roles stay visible inside a team scope
    let (status, roles) = send_with_team(&t.app, "GET", "/api/panels/partner/roles", token, Some("team-a"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roles[0]["name"], "Super Admin");
    Ok(())
}

#[tokio::test]
async fn health_reports_database_and_panels() -> Result<()> {
    let t = setup().await?;
    let (status, health) = send(&t.app, "GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["db_ok"], true);
    assert_eq!(health["panels"], 2);
    Ok(())
}

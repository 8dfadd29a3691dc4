use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::catalog::{ConfigRegistry, RegistryProvider};
use crate::config::GuardianConfig;
use crate::errors::GuardianResult;
use crate::evaluation::Evaluation;
use crate::jwt::AccessTokens;
use crate::keys::{KeyCodec, SharedKeyBuilder};
use crate::labels::{MapTranslator, Translator};
use crate::roles::RoleService;
use crate::routes::{auth, health, permissions, roles, users};
use crate::store::SqliteStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub tokens: Arc<AccessTokens>,
    pub config: Arc<GuardianConfig>,
    pub registry: Arc<dyn RegistryProvider>,
    pub builder: SharedKeyBuilder,
    pub translator: Arc<dyn Translator>,
}

impl AppState {
    /// Fails when the configured key case is invalid.
    pub fn new(pool: SqlitePool, tokens: AccessTokens, config: GuardianConfig) -> GuardianResult<Self> {
        let builder = KeyCodec::from_config(&config.permission_key)?.shared();
        let translator = MapTranslator::english().with_overrides(config.translations.clone());
        let registry = ConfigRegistry::new(&config);

        Ok(Self {
            pool,
            tokens: Arc::new(tokens),
            config: Arc::new(config),
            registry: Arc::new(registry),
            builder,
            translator: Arc::new(translator),
        })
    }

    /// Fresh request-scoped cache.
    pub fn evaluation(&self) -> Evaluation {
        Evaluation::new(
            self.config.clone(),
            self.registry.clone(),
            self.builder.clone(),
            self.translator.clone(),
        )
    }

    pub fn store(&self) -> SqliteStore {
        SqliteStore::new(self.pool.clone())
    }

    pub fn roles(&self, panel_id: &str) -> RoleService {
        RoleService::new(self.pool.clone(), self.config.super_admin_for(Some(panel_id)))
    }
}

pub async fn create_app(pool: SqlitePool, config: GuardianConfig) -> GuardianResult<Router> {
    let tokens = AccessTokens::from_env()?;
    let state = AppState::new(pool, tokens, config)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let panel_routes = Router::new()
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/:role_id",
            get(roles::get_role).put(roles::update_role).delete(roles::delete_role),
        )
        .route("/roles/:role_id/form", get(roles::role_form))
        .route(
            "/users/:user_id/permissions",
            get(users::user_permissions).put(users::update_user_permissions),
        )
        .route("/permissions", get(permissions::list_permissions));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/auth", auth_routes)
        .nest("/api/panels/:panel", panel_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

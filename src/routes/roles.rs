//! Role management endpoints, scoped to one panel.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use super::{FormResponse, PanelContext};
use crate::app::AppState;
use crate::authz::abilities;
use crate::errors::GuardianResult;
use crate::jwt::AuthUser;
use crate::models::rbac::{Role, RoleCreateRequest, RoleUpdateRequest};
use crate::view::{EditMode, RoleSummary};

#[derive(Debug, Serialize)]
pub struct RoleListItem {
    #[serde(flatten)]
    pub role: Role,
    pub protected: bool,
    pub permissions_count: usize,
}

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    #[serde(flatten)]
    pub role: Role,
    pub protected: bool,
    pub summary: RoleSummary,
}

pub async fn list_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(panel_id): Path<String>,
) -> GuardianResult<Json<Vec<RoleListItem>>> {
    let ctx = PanelContext::resolve(&state, &panel_id, &headers, &auth).await?;
    ctx.authorize(abilities::VIEW_ANY)?;

    let mut items = Vec::new();
    for role in ctx.roles.list_roles(&ctx.scope).await? {
        let permissions_count = ctx.roles.role_permissions(role.id).await?.len();
        items.push(RoleListItem {
            protected: ctx.roles.is_protected(&role),
            permissions_count,
            role,
        });
    }

    Ok(Json(items))
}

pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(panel_id): Path<String>,
    Json(req): Json<RoleCreateRequest>,
) -> GuardianResult<(StatusCode, Json<RoleResponse>)> {
    let mut ctx = PanelContext::resolve(&state, &panel_id, &headers, &auth).await?;
    ctx.authorize(abilities::CREATE)?;

    let role = ctx.roles.create_role(&req.name, &ctx.scope, &req.permissions).await?;
    let response = role_response(&mut ctx, role).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((panel_id, role_id)): Path<(String, Uuid)>,
) -> GuardianResult<Json<RoleResponse>> {
    let mut ctx = PanelContext::resolve(&state, &panel_id, &headers, &auth).await?;
    ctx.authorize(abilities::VIEW)?;

    let role = ctx.role(role_id).await?;
    Ok(Json(role_response(&mut ctx, role).await?))
}

pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((panel_id, role_id)): Path<(String, Uuid)>,
    Json(req): Json<RoleUpdateRequest>,
) -> GuardianResult<Json<RoleResponse>> {
    let mut ctx = PanelContext::resolve(&state, &panel_id, &headers, &auth).await?;
    ctx.authorize(abilities::UPDATE)?;

    let role = ctx.role(role_id).await?;
    let role = ctx
        .roles
        .update_role(role.id, req.name.as_deref(), req.permissions.as_deref())
        .await?;

    Ok(Json(role_response(&mut ctx, role).await?))
}

pub async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((panel_id, role_id)): Path<(String, Uuid)>,
) -> GuardianResult<StatusCode> {
    let ctx = PanelContext::resolve(&state, &panel_id, &headers, &auth).await?;
    ctx.authorize(abilities::DELETE)?;

    let role = ctx.role(role_id).await?;
    ctx.roles.delete_role(role.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn role_form(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((panel_id, role_id)): Path<(String, Uuid)>,
) -> GuardianResult<Json<FormResponse>> {
    let mut ctx = PanelContext::resolve(&state, &panel_id, &headers, &auth).await?;
    ctx.authorize(abilities::UPDATE)?;

    let role = ctx.role(role_id).await?;
    let assigned = ctx.roles.role_permissions(role.id).await?;
    let view = ctx.evaluation.role_view(&ctx.panel.id, &ctx.scope, &ctx.store).await?;

    Ok(Json(view.form(EditMode::Role, &assigned).into()))
}

async fn role_response(ctx: &mut PanelContext, role: Role) -> GuardianResult<RoleResponse> {
    let assigned = ctx.roles.role_permissions(role.id).await?;
    let view = ctx.evaluation.role_view(&ctx.panel.id, &ctx.scope, &ctx.store).await?;

    Ok(RoleResponse {
        protected: ctx.roles.is_protected(&role),
        summary: view.summary(&assigned),
        role,
    })
}

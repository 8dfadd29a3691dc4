//! Direct (non role-based) permissions of a user.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use super::{FormResponse, PanelContext};
use crate::app::AppState;
use crate::authz::abilities;
use crate::errors::GuardianResult;
use crate::jwt::AuthUser;
use crate::models::rbac::PermissionsUpdateRequest;
use crate::models::user::{fetch_user, User};
use crate::view::{EditMode, PermissionForm};

pub async fn user_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((panel_id, user_id)): Path<(String, Uuid)>,
) -> GuardianResult<Json<FormResponse>> {
    let mut ctx = PanelContext::resolve(&state, &panel_id, &headers, &auth).await?;
    ctx.authorize(abilities::UPDATE)?;

    let user: User = fetch_user(&state.pool, user_id).await?.into();
    let form = user_form(&mut ctx, &user).await?;
    Ok(Json(form.into()))
}

pub async fn update_user_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((panel_id, user_id)): Path<(String, Uuid)>,
    Json(req): Json<PermissionsUpdateRequest>,
) -> GuardianResult<Json<FormResponse>> {
    let mut ctx = PanelContext::resolve(&state, &panel_id, &headers, &auth).await?;
    ctx.authorize(abilities::UPDATE)?;

    let user: User = fetch_user(&state.pool, user_id).await?.into();
    let mut form = user_form(&mut ctx, &user).await?;
    let selected: Vec<String> = form.submit(&req.permissions)?.into_iter().collect();

    ctx.roles.sync_direct_permissions(&user, &ctx.scope, &selected).await?;
    tracing::info!(user_id = %user.id, panel = %ctx.panel.id, count = selected.len(), "updated direct permissions");

    Ok(Json(form.into()))
}

async fn user_form(ctx: &mut PanelContext, user: &User) -> GuardianResult<PermissionForm> {
    let role_based = ctx.roles.role_based_permissions(user.id, &ctx.scope).await?;
    let direct = ctx.roles.direct_permissions(user.id, &ctx.scope).await?;
    let view = ctx.evaluation.role_view(&ctx.panel.id, &ctx.scope, &ctx.store).await?;

    Ok(view.form(EditMode::User { role_based }, &direct))
}

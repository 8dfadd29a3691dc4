use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use super::PanelContext;
use crate::app::AppState;
use crate::authz::abilities;
use crate::categorizer::CategorizedPermissions;
use crate::errors::GuardianResult;
use crate::jwt::AuthUser;
use crate::view::{PermissionOption, ResourceGroup};

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub panel: String,
    pub guard: String,
    pub categorized: CategorizedPermissions,
    pub resources: Vec<ResourceGroup>,
    pub pages: Vec<PermissionOption>,
    pub widgets: Vec<PermissionOption>,
    pub custom: Vec<PermissionOption>,
}

/// Stored permissions of the panel's guard, partitioned and labelled.
pub async fn list_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(panel_id): Path<String>,
) -> GuardianResult<Json<PermissionsResponse>> {
    let mut ctx = PanelContext::resolve(&state, &panel_id, &headers, &auth).await?;
    ctx.authorize(abilities::VIEW_ANY)?;

    let view = ctx.evaluation.role_view(&ctx.panel.id, &ctx.scope, &ctx.store).await?;

    Ok(Json(PermissionsResponse {
        panel: ctx.panel.id.clone(),
        guard: ctx.scope.guard.clone(),
        categorized: view.categorized().clone(),
        resources: view.resource_groups(),
        pages: view.page_options(),
        widgets: view.widget_options(),
        custom: view.custom_options(),
    }))
}

use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::errors::{GuardianError, GuardianResult};
use crate::jwt::AuthUser;
use crate::models::user::{fetch_user, fetch_user_by_email, AuthResponse, LoginRequest, User};
use crate::utils::verify_password;

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> GuardianResult<Json<AuthResponse>> {
    let db_user = fetch_user_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| GuardianError::unauthorized("invalid credentials"))?;

    let password_ok = verify_password(&payload.password, &db_user.password_hash)?;
    if !password_ok {
        return Err(GuardianError::unauthorized("invalid credentials"));
    }

    let token = state.tokens.issue(db_user.id)?;
    let user: User = db_user.into();

    Ok(Json(AuthResponse { token, user }))
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> GuardianResult<Json<User>> {
    let user = fetch_user(&state.pool, auth.user_id).await?;
    Ok(Json(user.into()))
}

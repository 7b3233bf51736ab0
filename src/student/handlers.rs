use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::auth::jwt::AuthUser;
use crate::error::{internal, AppError};
use crate::state::AppState;
use crate::student::dto::DashboardResponse;
use crate::users::dto::Profile;
use crate::users::repo;

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/dashboard", get(dashboard))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Profile>, AppError> {
    let row = repo::find_by_id(&state.db, user.id)
        .await
        .map_err(internal)?
        .ok_or(AppError::NotFound("User not found"))?;
    Ok(Json(Profile::from(row)))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let row = repo::find_by_id(&state.db, user.id)
        .await
        .map_err(internal)?
        .ok_or(AppError::NotFound("User not found"))?;
    Ok(Json(DashboardResponse::from(row)))
}

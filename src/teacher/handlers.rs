use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::auth::jwt::AuthUser;
use crate::error::{internal, AppError};
use crate::state::AppState;
use crate::teacher::dto::{DirectoryQuery, DirectoryResponse, TeacherListItem};
use crate::teacher::services;
use crate::users::dto::Profile;
use crate::users::repo;

const MAX_LIMIT: i64 = 100;

pub fn teacher_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/users", get(list_teachers))
        // Intro videos dominate the body size.
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024))
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

#[instrument(skip(state, user, multipart), fields(user_id = user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Profile>, AppError> {
    let form = services::collect_update_form(&mut multipart).await?;
    let profile = services::apply_update(&state, user.id, form).await?;
    info!(user_id = user.id, "profile updated");
    Ok(Json(profile))
}

/// Public directory: no auth, offset pagination, substring search over name
/// and subjects.
#[instrument(skip(state))]
pub async fn list_teachers(
    State(state): State<AppState>,
    Query(q): Query<DirectoryQuery>,
) -> Result<Json<DirectoryResponse>, AppError> {
    let limit = q.limit.clamp(1, MAX_LIMIT);
    let page = q.page.max(1);
    let offset = (page - 1) * limit;

    let (rows, total) = repo::list_teachers(&state.db, limit, offset, &q.search)
        .await
        .map_err(internal)?;

    let teachers = rows.into_iter().map(TeacherListItem::from).collect();
    Ok(Json(DirectoryResponse { teachers, total }))
}

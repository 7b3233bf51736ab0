use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::types::Json as SqlJson;
use tracing::{debug, info, instrument, warn};

use crate::auth::{
    dto::{AuthResponse, LoginRequest, SignupForm, UploadedFile},
    ids,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
};
use crate::error::{internal, AppError};
use crate::media;
use crate::state::AppState;
use crate::users::dto::PublicUser;
use crate::users::repo::{self, NewUser};
use crate::users::types::{parse_wire_date, Role};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, multipart))]
pub async fn signup(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let form = collect_signup_form(&mut multipart).await?;

    let name = form
        .name
        .ok_or_else(|| AppError::BadRequest("name is required".into()))?;
    let email = form
        .email
        .map(|e| e.trim().to_lowercase())
        .ok_or_else(|| AppError::BadRequest("email is required".into()))?;
    let password = form
        .password
        .ok_or_else(|| AppError::BadRequest("password is required".into()))?;
    let role = match form.role.as_deref() {
        Some("teacher") => Role::Teacher,
        Some("student") => Role::Student,
        _ => {
            return Err(AppError::BadRequest(
                "role must be student or teacher".into(),
            ))
        }
    };

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    if password.len() < 8 {
        warn!("password too short");
        return Err(AppError::BadRequest("Password too short".into()));
    }

    if repo::find_by_email(&state.db, &email)
        .await
        .map_err(internal)?
        .is_some()
    {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let mut unique_id = ids::issue(&state.db, role).await.map_err(internal)?;
    let hash = hash_password(&password).map_err(internal)?;

    let date_of_birth = form.date_of_birth.as_deref().and_then(|raw| {
        parse_wire_date(raw)
            .map_err(|err| warn!(error = %err, "unparseable dateOfBirth, skipping"))
            .ok()
    });

    let subjects = form
        .subjects
        .as_deref()
        .and_then(|raw| {
            serde_json::from_str::<Vec<String>>(raw)
                .map_err(|err| warn!(error = %err, "unparseable subjects, skipping"))
                .ok()
        })
        .unwrap_or_default();

    let profile_picture = match form.picture {
        Some(file) => Some(
            media::store_upload(state.storage.as_ref(), &file.original_name, file.body)
                .await
                .map_err(internal)?,
        ),
        None => None,
    };

    // Two requests can race the email pre-check or collide on a freshly
    // issued role ID; the unique indexes settle both. Whatever way the
    // insert fails, the already-stored picture must not be left orphaned.
    let mut retried_id = false;
    let user = loop {
        let (teacher_id, student_id) = match role {
            Role::Teacher => (Some(unique_id.as_str()), None),
            Role::Student => (None, Some(unique_id.as_str())),
        };
        let attempt = repo::create(
            &state.db,
            NewUser {
                name: &name,
                email: &email,
                password_hash: &hash,
                role,
                teacher_id,
                student_id,
                date_of_birth,
                gender: form.gender.as_deref(),
                nationality: form.nationality.as_deref(),
                subjects: SqlJson(subjects.clone()),
                profile_picture: profile_picture.as_deref(),
            },
        )
        .await;
        match attempt {
            Ok(user) => break user,
            Err(e) if repo::is_unique_violation(&e, "users_email_key") => {
                discard_upload(&state, profile_picture.as_deref()).await;
                warn!(email = %email, "email already registered");
                return Err(AppError::DuplicateEmail);
            }
            Err(e) if !retried_id && repo::is_unique_violation(&e, role_id_constraint(role)) => {
                warn!(id = %unique_id, "role id collided, reissuing");
                retried_id = true;
                unique_id = match ids::issue(&state.db, role).await {
                    Ok(id) => id,
                    Err(e) => {
                        discard_upload(&state, profile_picture.as_deref()).await;
                        return Err(internal(e));
                    }
                };
            }
            Err(e) => {
                discard_upload(&state, profile_picture.as_deref()).await;
                return Err(internal(e));
            }
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let token = keys
        .sign_signup(user.id, user.role, user.unique_id())
        .map_err(internal)?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: Some("User registered successfully".into()),
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

async fn collect_signup_form(multipart: &mut Multipart) -> Result<SignupForm, AppError> {
    let mut form = SignupForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        if name == "profilePicture" {
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let body = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            form.picture = Some(UploadedFile {
                original_name,
                body,
            });
            continue;
        }
        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        match name.as_str() {
            "name" => form.name = Some(value),
            "email" => form.email = Some(value),
            "password" => form.password = Some(value),
            "role" => form.role = Some(value),
            "dateOfBirth" => form.date_of_birth = Some(value),
            "gender" => form.gender = Some(value),
            "nationality" => form.nationality = Some(value),
            "subjects" => form.subjects = Some(value),
            other => debug!(field = other, "ignoring unknown signup field"),
        }
    }
    Ok(form)
}

fn role_id_constraint(role: Role) -> &'static str {
    match role {
        Role::Teacher => "users_teacher_id_key",
        Role::Student => "users_student_id_key",
    }
}

/// Drops a file stored ahead of an insert that never happened.
async fn discard_upload(state: &AppState, stored: Option<&str>) {
    media::delete_stale(state.storage.as_ref(), stored).await;
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    // No format pre-check here: a malformed address is just an address that
    // cannot be found, and every miss must look the same to the caller.
    let user = match repo::find_by_email(&state.db, &payload.email)
        .await
        .map_err(internal)?
    {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(internal)?;
    if !ok {
        warn!(email = %payload.email, user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys
        .sign_session(user.id, user.role, user.unique_id())
        .map_err(internal)?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        message: None,
        token,
        user: PublicUser::from(&user),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ada@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@x.com"));
        assert!(!is_valid_email("spaces in@x.com"));
        assert!(!is_valid_email("ada@nodot"));
    }

    #[tokio::test]
    async fn login_misses_share_one_wire_shape() {
        use axum::response::IntoResponse;

        // A malformed address is handled as an address that does not exist,
        // so every credential miss surfaces as the same 401 body.
        let response = AppError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Invalid credentials");
    }

    #[test]
    fn role_id_constraint_matches_role() {
        assert_eq!(role_id_constraint(Role::Teacher), "users_teacher_id_key");
        assert_eq!(role_id_constraint(Role::Student), "users_student_id_key");
    }

    #[tokio::test]
    async fn failed_signup_discards_stored_upload() {
        use crate::storage::StorageClient;

        let state = AppState::fake();
        let stored = media::store_upload(
            state.storage.as_ref(),
            "pic.jpg",
            bytes::Bytes::from_static(b"img"),
        )
        .await
        .expect("store");
        assert!(state.storage.object_exists(&stored).await);

        discard_upload(&state, Some(&stored)).await;
        assert!(!state.storage.object_exists(&stored).await);
    }

    #[test]
    fn auth_response_omits_message_when_absent() {
        use crate::users::dto::PublicUser;
        use crate::users::types::Role;

        let response = AuthResponse {
            message: None,
            token: "tok".into(),
            user: PublicUser {
                id: 1,
                name: "Ada".into(),
                email: "ada@x.com".into(),
                role: Role::Teacher,
                unique_id: "T123456789".into(),
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("message").is_none());
        assert_eq!(json["user"]["uniqueId"], "T123456789");
        assert_eq!(json["user"]["role"], "teacher");
    }
}

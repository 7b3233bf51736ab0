use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::users::dto::PublicUser;

/// A file field lifted out of a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub body: Bytes,
}

/// Text fields accepted by the multipart signup form. Everything is optional
/// at the parsing stage; the handler decides what is required.
#[derive(Debug, Default)]
pub struct SignupForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub subjects: Option<String>,
    pub picture: Option<UploadedFile>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after signup or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub token: String,
    pub user: PublicUser,
}

use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::dto::UploadedFile;
use crate::users::repo::{ProfileUpdate, TeacherListRow};

/// Query string of the public directory listing. A missing or unparseable
/// `page`/`limit` falls back to its default instead of failing the request.
#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    #[serde(default = "default_page", deserialize_with = "lenient_page")]
    pub page: i64,
    #[serde(default = "default_limit", deserialize_with = "lenient_limit")]
    pub limit: i64,
    #[serde(default)]
    pub search: String,
}

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    6
}

fn lenient_page<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(lenient_i64(d)?.unwrap_or_else(default_page))
}

fn lenient_limit<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(lenient_i64(d)?.unwrap_or_else(default_limit))
}

// Query-string values arrive as strings; direct JSON gives numbers.
fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::Int(v) => Some(v),
        Raw::Str(s) => s.trim().parse().ok(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherListItem {
    pub id: i64,
    pub name: String,
    pub profile_picture: Option<String>,
    pub subjects: Vec<String>,
}

impl From<TeacherListRow> for TeacherListItem {
    fn from(row: TeacherListRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            profile_picture: row.profile_picture,
            subjects: row.subjects.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DirectoryResponse {
    pub teachers: Vec<TeacherListItem>,
    pub total: i64,
}

/// A parsed profile-update request: the sparse column changes plus any
/// replacement media still waiting to be stored.
#[derive(Debug, Default)]
pub struct UpdateForm {
    pub changes: ProfileUpdate,
    pub picture: Option<UploadedFile>,
    pub video: Option<UploadedFile>,
}

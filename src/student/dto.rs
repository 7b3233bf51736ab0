use serde::Serialize;

use crate::users::repo::UserRow;

/// Reduced projection backing the student dashboard header.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub gender: Option<String>,
}

impl From<UserRow> for DashboardResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            profile_picture: row.profile_picture,
            gender: row.gender,
        }
    }
}

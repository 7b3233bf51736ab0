use serde::Serialize;
use time::{Date, OffsetDateTime};

use super::repo::UserRow;
use super::types::{
    date_fmt, CertificateEntry, EducationEntry, Role, Visibility, WorkExperienceEntry,
};

/// Public-safe user projection returned by signup and login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub unique_id: String,
}

impl From<&UserRow> for PublicUser {
    fn from(row: &UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            email: row.email.clone(),
            role: row.role,
            unique_id: row.unique_id().to_string(),
        }
    }
}

/// Role-specific slice of the profile. Flattened into the wire JSON so the
/// external shape stays a single flat record.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RoleDetails {
    #[serde(rename_all = "camelCase")]
    Teacher {
        teacher_id: String,
        title: Option<String>,
        standard_class_rate: Option<f64>,
        trial_class_rate: Option<f64>,
        paypal_email: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Student { student_id: String },
}

/// Full profile projection: everything except the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "date_fmt")]
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub time_zone: Option<String>,
    pub profile_visibility: Visibility,
    pub introduction_writeup: Option<String>,
    pub profile_picture: Option<String>,
    pub introduction_video: Option<String>,
    pub student_age_group: Option<String>,
    pub student_proficiency: Option<String>,
    pub selected_style: Option<String>,
    pub education: Vec<EducationEntry>,
    pub work_experience: Vec<WorkExperienceEntry>,
    pub certificates: Vec<CertificateEntry>,
    pub subjects: Vec<String>,
    pub interests: Vec<String>,
    pub languages: Vec<String>,
    pub teaching_styles: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(flatten)]
    pub details: RoleDetails,
}

impl From<UserRow> for Profile {
    fn from(row: UserRow) -> Self {
        let details = match row.role {
            Role::Teacher => RoleDetails::Teacher {
                teacher_id: row.teacher_id.clone().unwrap_or_default(),
                title: row.title.clone(),
                standard_class_rate: row.standard_class_rate,
                trial_class_rate: row.trial_class_rate,
                paypal_email: row.paypal_email.clone(),
            },
            Role::Student => RoleDetails::Student {
                student_id: row.student_id.clone().unwrap_or_default(),
            },
        };
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
            date_of_birth: row.date_of_birth,
            gender: row.gender,
            nationality: row.nationality,
            time_zone: row.time_zone,
            profile_visibility: row.profile_visibility,
            introduction_writeup: row.introduction_writeup,
            profile_picture: row.profile_picture,
            introduction_video: row.introduction_video,
            student_age_group: row.student_age_group,
            student_proficiency: row.student_proficiency,
            selected_style: row.selected_style,
            education: row.education.0,
            work_experience: row.work_experience.0,
            certificates: row.certificates.0,
            subjects: row.subjects.0,
            interests: row.interests.0,
            languages: row.languages.0,
            teaching_styles: row.teaching_styles.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlx::types::Json;
    use time::macros::datetime;

    use super::*;

    fn teacher_row() -> UserRow {
        UserRow {
            id: 1,
            name: "Ada".into(),
            email: "ada@x.com".into(),
            password_hash: "$argon2id$stub".into(),
            role: Role::Teacher,
            teacher_id: Some("T123456789".into()),
            student_id: None,
            date_of_birth: None,
            gender: None,
            nationality: None,
            time_zone: Some("UTC".into()),
            profile_visibility: Visibility::Public,
            title: Some("Math tutor".into()),
            paypal_email: None,
            standard_class_rate: Some(25.0),
            trial_class_rate: None,
            introduction_writeup: None,
            profile_picture: Some("1700000000000.jpg".into()),
            introduction_video: None,
            student_age_group: None,
            student_proficiency: None,
            selected_style: None,
            education: Json(vec![]),
            work_experience: Json(vec![]),
            certificates: Json(vec![]),
            subjects: Json(vec!["Math".into(), "Science".into()]),
            interests: Json(vec![]),
            languages: Json(vec![]),
            teaching_styles: Json(vec![]),
            created_at: datetime!(2026-01-01 00:00:00 UTC),
            updated_at: datetime!(2026-01-02 00:00:00 UTC),
        }
    }

    fn student_row() -> UserRow {
        let mut row = teacher_row();
        row.role = Role::Student;
        row.teacher_id = None;
        row.student_id = Some("S987654321".into());
        row.title = None;
        row.standard_class_rate = None;
        row
    }

    #[test]
    fn teacher_profile_is_flat_and_omits_password() {
        let json = serde_json::to_value(Profile::from(teacher_row())).unwrap();
        assert_eq!(json["teacherId"], "T123456789");
        assert_eq!(json["role"], "teacher");
        assert_eq!(json["standardClassRate"], 25.0);
        assert_eq!(json["subjects"], serde_json::json!(["Math", "Science"]));
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("details").is_none(), "union must be flattened");
    }

    #[test]
    fn student_profile_has_no_teacher_fields() {
        let json = serde_json::to_value(Profile::from(student_row())).unwrap();
        assert_eq!(json["studentId"], "S987654321");
        assert!(json.get("teacherId").is_none());
        assert!(json.get("standardClassRate").is_none());
        assert!(json.get("paypalEmail").is_none());
    }

    #[test]
    fn list_fields_serialize_as_arrays_even_when_empty() {
        let json = serde_json::to_value(Profile::from(teacher_row())).unwrap();
        assert!(json["education"].is_array());
        assert!(json["workExperience"].is_array());
        assert!(json["certificates"].is_array());
        assert!(json["languages"].is_array());
    }

    #[test]
    fn public_user_carries_role_scoped_id() {
        let row = teacher_row();
        let user = PublicUser::from(&row);
        assert_eq!(user.unique_id, "T123456789");
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["uniqueId"], "T123456789");
    }

    #[test]
    fn timestamps_serialize_rfc3339() {
        let json = serde_json::to_value(Profile::from(teacher_row())).unwrap();
        assert_eq!(json["createdAt"], "2026-01-01T00:00:00Z");
    }
}

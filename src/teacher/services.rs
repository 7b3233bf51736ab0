use axum::extract::Multipart;
use serde::de::DeserializeOwned;
use sqlx::types::Json as SqlJson;
use tracing::{debug, warn};

use crate::auth::dto::UploadedFile;
use crate::error::{internal, AppError};
use crate::media;
use crate::state::AppState;
use crate::teacher::dto::UpdateForm;
use crate::users::dto::Profile;
use crate::users::repo;
use crate::users::types::{
    parse_wire_date, CertificateEntry, EducationEntry, Visibility, WorkExperienceEntry,
};

/// Walk the multipart request and build the sparse update. A field that is
/// absent stays untouched; a field that is present but unparseable is
/// skipped with a warning while the rest of the update proceeds.
pub async fn collect_update_form(multipart: &mut Multipart) -> Result<UpdateForm, AppError> {
    let mut form = UpdateForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };

        if name == "profilePicture" || name == "introductionVideo" {
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let body = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            let file = UploadedFile {
                original_name,
                body,
            };
            if name == "profilePicture" {
                form.picture = Some(file);
            } else {
                form.video = Some(file);
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let changes = &mut form.changes;
        match name.as_str() {
            "name" => changes.name = Some(value),
            "title" => changes.title = Some(value),
            "gender" => changes.gender = Some(value),
            "nationality" => changes.nationality = Some(value),
            "timeZone" => changes.time_zone = Some(value),
            "paypalEmail" => changes.paypal_email = Some(value),
            "introductionWriteup" => changes.introduction_writeup = Some(value),
            "studentAgeGroup" => changes.student_age_group = Some(value),
            "studentProficiency" => changes.student_proficiency = Some(value),
            "selectedStyle" => changes.selected_style = Some(value),
            "dateOfBirth" => match parse_wire_date(&value) {
                Ok(date) => changes.date_of_birth = Some(date),
                Err(err) => warn!(error = %err, "unparseable dateOfBirth, skipping"),
            },
            "profileVisibility" => match value.as_str() {
                "public" => changes.profile_visibility = Some(Visibility::Public),
                "private" => changes.profile_visibility = Some(Visibility::Private),
                other => warn!(value = other, "unknown profileVisibility, skipping"),
            },
            "standardClassRate" => changes.standard_class_rate = parse_rate(&name, &value),
            "trialClassRate" => changes.trial_class_rate = parse_rate(&name, &value),
            "education" => {
                changes.education = parse_json_field::<Vec<EducationEntry>>(&name, &value)
            }
            "workExperience" => {
                changes.work_experience =
                    parse_json_field::<Vec<WorkExperienceEntry>>(&name, &value)
            }
            "certificates" => {
                changes.certificates = parse_json_field::<Vec<CertificateEntry>>(&name, &value)
            }
            "subjects" => changes.subjects = parse_json_field::<Vec<String>>(&name, &value),
            "interests" => changes.interests = parse_json_field::<Vec<String>>(&name, &value),
            "languages" => changes.languages = parse_json_field::<Vec<String>>(&name, &value),
            "teachingStyles" => {
                changes.teaching_styles = parse_json_field::<Vec<String>>(&name, &value)
            }
            other => debug!(field = other, "ignoring unknown profile field"),
        }
    }

    Ok(form)
}

/// Empty string clears the rate; anything unparseable is skipped.
fn parse_rate(field: &str, raw: &str) -> Option<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(None);
    }
    match trimmed.parse::<f64>() {
        Ok(v) => Some(Some(v)),
        Err(err) => {
            warn!(field, error = %err, "unparseable rate, skipping");
            None
        }
    }
}

fn parse_json_field<T: DeserializeOwned>(field: &str, raw: &str) -> Option<SqlJson<T>> {
    match serde_json::from_str::<T>(raw) {
        Ok(v) => Some(SqlJson(v)),
        Err(err) => {
            warn!(field, error = %err, "failed to parse JSON field, skipping");
            None
        }
    }
}

/// Apply the update. Media replacement follows a fixed ordering contract:
/// the new file is written to storage first, the row is updated second, and
/// the superseded file is deleted last — so a crash mid-way can orphan a
/// file but never leaves the row pointing at a missing one.
pub async fn apply_update(
    state: &AppState,
    user_id: i64,
    form: UpdateForm,
) -> Result<Profile, AppError> {
    let mut changes = form.changes;

    let previous = repo::find_by_id(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or(AppError::NotFound("User not found"))?;

    if let Some(file) = form.picture {
        let stored = media::store_upload(state.storage.as_ref(), &file.original_name, file.body)
            .await
            .map_err(internal)?;
        changes.profile_picture = Some(stored);
    }
    if let Some(file) = form.video {
        let stored = media::store_upload(state.storage.as_ref(), &file.original_name, file.body)
            .await
            .map_err(internal)?;
        changes.introduction_video = Some(stored);
    }

    let replaced_picture = changes.profile_picture.is_some();
    let replaced_video = changes.introduction_video.is_some();

    let updated = repo::update(&state.db, user_id, changes)
        .await
        .map_err(internal)?
        .ok_or(AppError::NotFound("User not found"))?;

    if replaced_picture {
        media::delete_stale(state.storage.as_ref(), previous.profile_picture.as_deref()).await;
    }
    if replaced_video {
        media::delete_stale(
            state.storage.as_ref(),
            previous.introduction_video.as_deref(),
        )
        .await;
    }

    Ok(Profile::from(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_parsing() {
        assert_eq!(parse_rate("standardClassRate", "25.50"), Some(Some(25.5)));
        assert_eq!(parse_rate("standardClassRate", " 30 "), Some(Some(30.0)));
        // Present but empty clears the stored value.
        assert_eq!(parse_rate("trialClassRate", ""), Some(None));
        assert_eq!(parse_rate("trialClassRate", "   "), Some(None));
        // Unparseable input is skipped, not nulled.
        assert_eq!(parse_rate("trialClassRate", "cheap"), None);
    }

    #[test]
    fn json_field_parses_entry_lists() {
        let parsed = parse_json_field::<Vec<EducationEntry>>(
            "education",
            r#"[{"institution":"MIT","degree":"BSc","startYear":"2018","endYear":"Present"}]"#,
        )
        .expect("valid JSON");
        assert_eq!(parsed.0.len(), 1);
        assert_eq!(parsed.0[0].end_year, "Present");
    }

    #[test]
    fn malformed_json_field_is_skipped() {
        assert!(parse_json_field::<Vec<String>>("subjects", "not json").is_none());
        assert!(parse_json_field::<Vec<EducationEntry>>("education", "[{\"bad\":true}]").is_none());
    }

    #[test]
    fn json_field_replaces_wholesale_not_merged() {
        let parsed =
            parse_json_field::<Vec<String>>("subjects", r#"["Math","Science"]"#).expect("valid");
        assert_eq!(parsed.0, vec!["Math".to_string(), "Science".to_string()]);
    }
}

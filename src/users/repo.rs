use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};

use super::types::{
    CertificateEntry, EducationEntry, Role, Visibility, WorkExperienceEntry,
};

const COLUMNS: &str = "id, name, email, password_hash, role, teacher_id, student_id, \
    date_of_birth, gender, nationality, time_zone, profile_visibility, title, paypal_email, \
    standard_class_rate, trial_class_rate, introduction_writeup, profile_picture, \
    introduction_video, student_age_group, student_proficiency, selected_style, education, \
    work_experience, certificates, subjects, interests, languages, teaching_styles, \
    created_at, updated_at";

/// Full user record as stored.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub teacher_id: Option<String>,
    pub student_id: Option<String>,
    pub date_of_birth: Option<Date>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub time_zone: Option<String>,
    pub profile_visibility: Visibility,
    pub title: Option<String>,
    pub paypal_email: Option<String>,
    pub standard_class_rate: Option<f64>,
    pub trial_class_rate: Option<f64>,
    pub introduction_writeup: Option<String>,
    pub profile_picture: Option<String>,
    pub introduction_video: Option<String>,
    pub student_age_group: Option<String>,
    pub student_proficiency: Option<String>,
    pub selected_style: Option<String>,
    pub education: Json<Vec<EducationEntry>>,
    pub work_experience: Json<Vec<WorkExperienceEntry>>,
    pub certificates: Json<Vec<CertificateEntry>>,
    pub subjects: Json<Vec<String>>,
    pub interests: Json<Vec<String>>,
    pub languages: Json<Vec<String>>,
    pub teaching_styles: Json<Vec<String>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl UserRow {
    /// Role-scoped ID column matching the row's role. The schema guarantees
    /// exactly one of the two is populated.
    pub fn unique_id(&self) -> &str {
        match self.role {
            Role::Teacher => self.teacher_id.as_deref().unwrap_or_default(),
            Role::Student => self.student_id.as_deref().unwrap_or_default(),
        }
    }
}

/// Fields persisted at signup; everything else starts at its column default.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub teacher_id: Option<&'a str>,
    pub student_id: Option<&'a str>,
    pub date_of_birth: Option<Date>,
    pub gender: Option<&'a str>,
    pub nationality: Option<&'a str>,
    pub subjects: Json<Vec<String>>,
    pub profile_picture: Option<&'a str>,
}

/// Sparse field set for a partial profile update. `None` means "not
/// supplied, leave untouched". The nested `Option` on rate fields
/// distinguishes "supplied empty" (set NULL) from absent.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub title: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<Date>,
    pub time_zone: Option<String>,
    pub profile_visibility: Option<Visibility>,
    pub paypal_email: Option<String>,
    pub standard_class_rate: Option<Option<f64>>,
    pub trial_class_rate: Option<Option<f64>>,
    pub introduction_writeup: Option<String>,
    pub student_age_group: Option<String>,
    pub student_proficiency: Option<String>,
    pub selected_style: Option<String>,
    pub education: Option<Json<Vec<EducationEntry>>>,
    pub work_experience: Option<Json<Vec<WorkExperienceEntry>>>,
    pub certificates: Option<Json<Vec<CertificateEntry>>>,
    pub subjects: Option<Json<Vec<String>>>,
    pub interests: Option<Json<Vec<String>>>,
    pub languages: Option<Json<Vec<String>>>,
    pub teaching_styles: Option<Json<Vec<String>>>,
    pub profile_picture: Option<String>,
    pub introduction_video: Option<String>,
}

/// Directory projection of a public teacher row.
#[derive(Debug, Clone, FromRow)]
pub struct TeacherListRow {
    pub id: i64,
    pub name: String,
    pub profile_picture: Option<String>,
    pub subjects: Json<Vec<String>>,
}

pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<UserRow>> {
    let sql = format!("SELECT {COLUMNS} FROM users WHERE email = $1");
    let user = sqlx::query_as::<_, UserRow>(&sql)
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<UserRow>> {
    let sql = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
    let user = sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn create(db: &PgPool, user: NewUser<'_>) -> anyhow::Result<UserRow> {
    let sql = format!(
        "INSERT INTO users (name, email, password_hash, role, teacher_id, student_id, \
         date_of_birth, gender, nationality, subjects, profile_picture) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {COLUMNS}"
    );
    let row = sqlx::query_as::<_, UserRow>(&sql)
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.role)
        .bind(user.teacher_id)
        .bind(user.student_id)
        .bind(user.date_of_birth)
        .bind(user.gender)
        .bind(user.nationality)
        .bind(user.subjects)
        .bind(user.profile_picture)
        .fetch_one(db)
        .await?;
    Ok(row)
}

/// True when `err` wraps a Postgres unique violation on `constraint`.
pub fn is_unique_violation(err: &anyhow::Error, constraint: &str) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| match e {
            sqlx::Error::Database(db) => db.constraint().map(|c| c == constraint),
            _ => None,
        })
        .unwrap_or(false)
}

pub async fn role_id_exists(db: &PgPool, role: Role, candidate: &str) -> anyhow::Result<bool> {
    let column = match role {
        Role::Teacher => "teacher_id",
        Role::Student => "student_id",
    };
    let sql = format!("SELECT EXISTS (SELECT 1 FROM users WHERE {column} = $1)");
    let (exists,): (bool,) = sqlx::query_as(&sql).bind(candidate).fetch_one(db).await?;
    Ok(exists)
}

/// Apply a sparse update: only supplied fields appear in the SET clause.
/// `updated_at` strictly advances even when the clock has not moved past the
/// previous write.
pub async fn update(
    db: &PgPool,
    user_id: i64,
    changes: ProfileUpdate,
) -> anyhow::Result<Option<UserRow>> {
    let mut qb = build_update(user_id, changes);
    let row = qb
        .build_query_as::<UserRow>()
        .fetch_optional(db)
        .await?;
    Ok(row)
}

fn build_update(user_id: i64, changes: ProfileUpdate) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "UPDATE users SET updated_at = GREATEST(now(), updated_at + interval '1 microsecond')",
    );

    macro_rules! set_field {
        ($field:ident, $column:literal) => {
            if let Some(value) = changes.$field {
                qb.push(concat!(", ", $column, " = "));
                qb.push_bind(value);
            }
        };
    }

    set_field!(name, "name");
    set_field!(title, "title");
    set_field!(gender, "gender");
    set_field!(nationality, "nationality");
    set_field!(date_of_birth, "date_of_birth");
    set_field!(time_zone, "time_zone");
    set_field!(profile_visibility, "profile_visibility");
    set_field!(paypal_email, "paypal_email");
    set_field!(standard_class_rate, "standard_class_rate");
    set_field!(trial_class_rate, "trial_class_rate");
    set_field!(introduction_writeup, "introduction_writeup");
    set_field!(student_age_group, "student_age_group");
    set_field!(student_proficiency, "student_proficiency");
    set_field!(selected_style, "selected_style");
    set_field!(education, "education");
    set_field!(work_experience, "work_experience");
    set_field!(certificates, "certificates");
    set_field!(subjects, "subjects");
    set_field!(interests, "interests");
    set_field!(languages, "languages");
    set_field!(teaching_styles, "teaching_styles");
    set_field!(profile_picture, "profile_picture");
    set_field!(introduction_video, "introduction_video");

    qb.push(" WHERE id = ");
    qb.push_bind(user_id);
    qb.push(format!(" RETURNING {COLUMNS}"));
    qb
}

/// LIKE wildcards in a search term must match literally.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// One page of public teacher rows plus the total matching count. Ordered by
/// insertion (`id`); page boundaries may drift under concurrent signups.
pub async fn list_teachers(
    db: &PgPool,
    limit: i64,
    offset: i64,
    search: &str,
) -> anyhow::Result<(Vec<TeacherListRow>, i64)> {
    let pattern = like_pattern(search);

    let rows = sqlx::query_as::<_, TeacherListRow>(
        r#"
        SELECT id, name, profile_picture, subjects
        FROM users
        WHERE role = 'teacher'
          AND (name ILIKE $1 OR subjects::text ILIKE $1)
        ORDER BY id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT count(*)
        FROM users
        WHERE role = 'teacher'
          AND (name ILIKE $1 OR subjects::text ILIKE $1)
        "#,
    )
    .bind(&pattern)
    .fetch_one(db)
    .await?;

    Ok((rows, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_update_sets_only_supplied_columns() {
        let changes = ProfileUpdate {
            name: Some("Ada".into()),
            ..Default::default()
        };
        let qb = build_update(7, changes);
        let sql = qb.sql();

        assert!(sql.contains(
            "updated_at = GREATEST(now(), updated_at + interval '1 microsecond')"
        ));
        assert!(sql.contains(", name = $1"));
        assert!(sql.contains("WHERE id = $2"));
        // No third bind, and no stray SET entries for untouched columns.
        assert!(!sql.contains("$3"));
        for column in [
            "title = ",
            "gender = ",
            "date_of_birth = ",
            "subjects = ",
            "education = ",
            "profile_picture = ",
            "standard_class_rate = ",
            "paypal_email = ",
        ] {
            assert!(!sql.contains(column), "unexpected SET entry: {column}");
        }
    }

    #[test]
    fn empty_update_still_advances_updated_at() {
        let qb = build_update(7, ProfileUpdate::default());
        let sql = qb.sql();

        assert!(sql.contains("updated_at = GREATEST"));
        assert!(sql.contains("WHERE id = $1"));
        assert!(!sql.contains("$2"));
    }

    #[test]
    fn cleared_rate_is_bound_not_dropped() {
        let changes = ProfileUpdate {
            trial_class_rate: Some(None),
            ..Default::default()
        };
        let qb = build_update(7, changes);
        let sql = qb.sql();

        // Supplied-but-empty binds NULL; absent would not appear at all.
        assert!(sql.contains(", trial_class_rate = $1"));
        assert!(!sql.contains("standard_class_rate = "));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("math"), "%math%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("back\\slash"), "%back\\\\slash%");
        assert_eq!(like_pattern(""), "%%");
    }
}

use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::Date;

/// Account role, fixed at signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn id_prefix(self) -> char {
        match self {
            Role::Teacher => 'T',
            Role::Student => 'S',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "profile_visibility", rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    pub start_year: String,
    /// A year, or the literal "Present" for ongoing studies.
    pub end_year: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkExperienceEntry {
    pub company: String,
    pub job_title: String,
    pub start_year: String,
    pub end_year: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateEntry {
    pub institution: String,
    pub name: String,
    pub year: String,
}

pub const WIRE_DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn parse_wire_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw, WIRE_DATE)
}

/// `YYYY-MM-DD` (de)serialization for optional date-of-birth fields.
pub mod date_fmt {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    use super::WIRE_DATE;

    pub fn serialize<S: Serializer>(date: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => {
                let formatted = d.format(WIRE_DATE).map_err(serde::ser::Error::custom)?;
                s.serialize_some(&formatted)
            }
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Date>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|v| Date::parse(&v, WIRE_DATE).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_prefixes() {
        assert_eq!(Role::Teacher.id_prefix(), 'T');
        assert_eq!(Role::Student.id_prefix(), 'S');
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"teacher\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"student\"").unwrap(),
            Role::Student
        );
    }

    #[test]
    fn education_entry_uses_camel_case_wire_names() {
        let entry: EducationEntry = serde_json::from_str(
            r#"{"institution":"MIT","degree":"BSc","startYear":"2018","endYear":"Present"}"#,
        )
        .unwrap();
        assert_eq!(entry.end_year, "Present");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("startYear"));
        assert!(json.contains("endYear"));
    }

    #[test]
    fn wire_date_roundtrip() {
        let date = parse_wire_date("1990-04-07").unwrap();
        assert_eq!(date.format(WIRE_DATE).unwrap(), "1990-04-07");
        assert!(parse_wire_date("04/07/1990").is_err());
    }
}

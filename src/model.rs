use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{encode::IsNull, Sqlite};
use ts_rs::TS;

pub const VALIDATION_REQUIRED: &str = "VALIDATION/REQUIRED";
pub const VALIDATION_EMAIL_FORMAT: &str = "VALIDATION/EMAIL_FORMAT";
pub const VALIDATION_OUT_OF_RANGE: &str = "VALIDATION/OUT_OF_RANGE";
pub const VALIDATION_TOO_LONG: &str = "VALIDATION/TOO_LONG";
pub const VALIDATION_FUTURE_DATE: &str = "VALIDATION/FUTURE_DATE";
pub const VALIDATION_EMAIL_TAKEN: &str = "VALIDATION/EMAIL_TAKEN";

pub const PATIENT_NOT_FOUND: &str = "PATIENTS/NOT_FOUND";
pub const NOTE_NOT_FOUND: &str = "NOTES/NOT_FOUND";
pub const CONTACT_NOT_FOUND: &str = "CONTACTS/NOT_FOUND";
pub const TUTOR_NOT_FOUND: &str = "TUTORS/NOT_FOUND";

pub const INTEGRITY_CREATE_FETCH: &str = "INTEGRITY/CREATE_FETCH";
pub const RECORDS_DECODE_ERROR: &str = "RECORDS/DECODE";

pub const BACKUP_FILE_EXISTS: &str = "BACKUP/FILE_EXISTS";
pub const BACKUP_CORRUPT_ARCHIVE: &str = "BACKUP/CORRUPT_ARCHIVE";
pub const BACKUP_UNSUPPORTED_VERSION: &str = "BACKUP/UNSUPPORTED_VERSION";

pub const APP_NOT_READY: &str = "APP/NOT_READY";

macro_rules! text_enum_sqlx {
    ($name:ident) => {
        impl sqlx::Type<Sqlite> for $name {
            fn type_info() -> SqliteTypeInfo {
                <&str as sqlx::Type<Sqlite>>::type_info()
            }

            fn compatible(ty: &SqliteTypeInfo) -> bool {
                <&str as sqlx::Type<Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<SqliteArgumentValue<'q>>,
            ) -> Result<IsNull, BoxDynError> {
                <&str as sqlx::Encode<'q, Sqlite>>::encode_by_ref(&self.as_str(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, Sqlite> for $name {
            fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
                let raw = <&str as sqlx::Decode<'r, Sqlite>>::decode(value)?;
                raw.parse::<$name>().map_err(Into::into)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/", rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
    Cohabiting,
    Divorced,
    Widowed,
    Separated,
    Other,
}

impl MaritalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaritalStatus::Single => "single",
            MaritalStatus::Married => "married",
            MaritalStatus::Cohabiting => "cohabiting",
            MaritalStatus::Divorced => "divorced",
            MaritalStatus::Widowed => "widowed",
            MaritalStatus::Separated => "separated",
            MaritalStatus::Other => "other",
        }
    }
}

impl FromStr for MaritalStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "single" => Ok(MaritalStatus::Single),
            "married" => Ok(MaritalStatus::Married),
            "cohabiting" => Ok(MaritalStatus::Cohabiting),
            "divorced" => Ok(MaritalStatus::Divorced),
            "widowed" => Ok(MaritalStatus::Widowed),
            "separated" => Ok(MaritalStatus::Separated),
            "other" => Ok(MaritalStatus::Other),
            other => Err(format!("invalid marital status: {other}")),
        }
    }
}

text_enum_sqlx!(MaritalStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/", rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    NonBinary,
    Other,
    PreferNotToSay,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::NonBinary => "non_binary",
            Gender::Other => "other",
            Gender::PreferNotToSay => "prefer_not_to_say",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "female" => Ok(Gender::Female),
            "male" => Ok(Gender::Male),
            "non_binary" => Ok(Gender::NonBinary),
            "other" => Ok(Gender::Other),
            "prefer_not_to_say" => Ok(Gender::PreferNotToSay),
            other => Err(format!("invalid gender: {other}")),
        }
    }
}

text_enum_sqlx!(Gender);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/", rename_all = "snake_case")]
pub enum SexualOrientation {
    Heterosexual,
    Homosexual,
    Bisexual,
    Asexual,
    Other,
    #[default]
    PreferNotToSay,
}

impl SexualOrientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SexualOrientation::Heterosexual => "heterosexual",
            SexualOrientation::Homosexual => "homosexual",
            SexualOrientation::Bisexual => "bisexual",
            SexualOrientation::Asexual => "asexual",
            SexualOrientation::Other => "other",
            SexualOrientation::PreferNotToSay => "prefer_not_to_say",
        }
    }
}

impl FromStr for SexualOrientation {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "heterosexual" => Ok(SexualOrientation::Heterosexual),
            "homosexual" => Ok(SexualOrientation::Homosexual),
            "bisexual" => Ok(SexualOrientation::Bisexual),
            "asexual" => Ok(SexualOrientation::Asexual),
            "other" => Ok(SexualOrientation::Other),
            "prefer_not_to_say" => Ok(SexualOrientation::PreferNotToSay),
            other => Err(format!("invalid sexual orientation: {other}")),
        }
    }
}

text_enum_sqlx!(SexualOrientation);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/", rename_all = "snake_case")]
pub enum PatientStatus {
    #[default]
    Active,
    Paused,
    MedicalDischarge,
    Abandoned,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "active",
            PatientStatus::Paused => "paused",
            PatientStatus::MedicalDischarge => "medical_discharge",
            PatientStatus::Abandoned => "abandoned",
        }
    }
}

impl FromStr for PatientStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "active" => Ok(PatientStatus::Active),
            "paused" => Ok(PatientStatus::Paused),
            "medical_discharge" => Ok(PatientStatus::MedicalDischarge),
            "abandoned" => Ok(PatientStatus::Abandoned),
            other => Err(format!("invalid patient status: {other}")),
        }
    }
}

text_enum_sqlx!(PatientStatus);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Patient {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    #[ts(type = "number")]
    pub age: i64,
    pub email: String,
    pub phone_number: String,
    #[ts(type = "string")]
    pub birth_date: NaiveDate,
    pub marital_status: MaritalStatus,
    pub gender: Gender,
    pub sexual_orientation: SexualOrientation,
    pub educational_level: String,
    pub profession: String,
    pub lives_with: String,
    #[ts(type = "number")]
    pub children: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub previous_psychological_experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "string")]
    pub first_appointment_date: Option<NaiveDate>,
    pub status: PatientStatus,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PatientInput {
    pub name: String,
    #[ts(type = "number")]
    pub age: i64,
    pub email: String,
    pub phone_number: String,
    #[ts(type = "string")]
    pub birth_date: NaiveDate,
    pub marital_status: MaritalStatus,
    pub gender: Gender,
    #[serde(default)]
    pub sexual_orientation: SexualOrientation,
    #[serde(default)]
    pub educational_level: String,
    #[serde(default)]
    pub profession: String,
    #[serde(default)]
    pub lives_with: String,
    #[serde(default)]
    #[ts(type = "number")]
    pub children: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub previous_psychological_experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "string")]
    pub first_appointment_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: PatientStatus,
}

/// Partial update for a patient. `None` fields are left untouched; a patch
/// cannot clear a nullable column back to NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct PatientPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "string")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub marital_status: Option<MaritalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub sexual_orientation: Option<SexualOrientation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub educational_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub profession: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub lives_with: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "number")]
    pub children: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub previous_psychological_experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "string")]
    pub first_appointment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub status: Option<PatientStatus>,
}

impl PatientPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.email.is_none()
            && self.phone_number.is_none()
            && self.birth_date.is_none()
            && self.marital_status.is_none()
            && self.gender.is_none()
            && self.sexual_orientation.is_none()
            && self.educational_level.is_none()
            && self.profession.is_none()
            && self.lives_with.is_none()
            && self.children.is_none()
            && self.previous_psychological_experience.is_none()
            && self.first_appointment_date.is_none()
            && self.status.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Note {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub patient_id: i64,
    pub title: String,
    /// Rich text serialized as HTML by the editor.
    pub content: String,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct NoteInput {
    #[ts(type = "number")]
    pub patient_id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub content: Option<String>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct EmergencyContact {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub patient_id: i64,
    pub full_name: String,
    pub phone_number: String,
    pub relation: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub address: Option<String>,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct EmergencyContactInput {
    #[ts(type = "number")]
    pub patient_id: i64,
    pub full_name: String,
    pub phone_number: String,
    pub relation: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct EmergencyContactPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub address: Option<String>,
}

impl EmergencyContactPatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone_number.is_none()
            && self.relation.is_none()
            && self.email.is_none()
            && self.address.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LegalTutor {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub patient_id: i64,
    pub full_name: String,
    pub phone_number: String,
    pub relation: String,
    pub email: String,
    #[ts(type = "string")]
    pub birth_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub address: Option<String>,
    #[ts(type = "number")]
    pub created_at: i64,
    #[ts(type = "number")]
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LegalTutorInput {
    #[ts(type = "number")]
    pub patient_id: i64,
    pub full_name: String,
    pub phone_number: String,
    pub relation: String,
    pub email: String,
    #[ts(type = "string")]
    pub birth_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct LegalTutorPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub relation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional, type = "string")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub address: Option<String>,
}

impl LegalTutorPatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone_number.is_none()
            && self.relation.is_none()
            && self.email.is_none()
            && self.birth_date.is_none()
            && self.address.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_their_wire_strings() {
        for status in [
            PatientStatus::Active,
            PatientStatus::Paused,
            PatientStatus::MedicalDischarge,
            PatientStatus::Abandoned,
        ] {
            assert_eq!(status.as_str().parse::<PatientStatus>(), Ok(status));
        }
        assert!("retired".parse::<PatientStatus>().is_err());
        assert_eq!(
            "non_binary".parse::<Gender>(),
            Ok(Gender::NonBinary),
        );
        assert_eq!(
            SexualOrientation::default(),
            SexualOrientation::PreferNotToSay
        );
    }

    #[test]
    fn patient_input_fills_defaults_for_omitted_fields() {
        let input: PatientInput = serde_json::from_str(
            r#"{
                "name": "Ana Ruiz",
                "age": 34,
                "email": "ANA@X.COM",
                "phoneNumber": "600111222",
                "birthDate": "1991-04-02",
                "maritalStatus": "single",
                "gender": "female"
            }"#,
        )
        .expect("deserialize minimal input");

        assert_eq!(input.sexual_orientation, SexualOrientation::PreferNotToSay);
        assert_eq!(input.status, PatientStatus::Active);
        assert_eq!(input.children, 0);
        assert!(input.previous_psychological_experience.is_none());
        assert!(input.first_appointment_date.is_none());
    }

    #[test]
    fn empty_patch_reports_empty() {
        assert!(PatientPatch::default().is_empty());
        let patch = PatientPatch {
            status: Some(PatientStatus::Paused),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn patch_uses_camel_case_keys() {
        let patch: PatientPatch =
            serde_json::from_str(r#"{"phoneNumber": "600 333 444", "age": 35}"#)
                .expect("deserialize patch");
        assert_eq!(patch.phone_number.as_deref(), Some("600 333 444"));
        assert_eq!(patch.age, Some(35));
        assert!(patch.name.is_none());
    }
}

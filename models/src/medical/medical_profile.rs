// models/src/medical/medical_profile.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};
use crate::validation::{require, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
    #[default]
    Unknown,
}

/// Exactly one per patient, created together with the patient account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_type: BloodType,
    pub allergies: Vec<String>,
    pub chronic_conditions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicalProfile {
    /// Placeholder birth date used when registration did not supply one.
    pub fn unknown_birth_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
    }

    /// The empty profile attached to a freshly registered patient.
    pub fn blank_for(user_id: Uuid, date_of_birth: Option<NaiveDate>, gender: Option<Gender>) -> Self {
        let now = Utc::now();
        MedicalProfile {
            id: Uuid::new_v4(),
            user_id,
            date_of_birth: date_of_birth.unwrap_or_else(Self::unknown_birth_date),
            gender: gender.unwrap_or_default(),
            blood_type: BloodType::Unknown,
            allergies: Vec::new(),
            chronic_conditions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_draft(draft: MedicalProfileDraft) -> Self {
        let now = Utc::now();
        MedicalProfile {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            date_of_birth: draft.date_of_birth,
            gender: draft.gender,
            blood_type: draft.blood_type,
            allergies: draft.allergies,
            chronic_conditions: draft.chronic_conditions,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: MedicalProfilePatch) {
        if let Some(date_of_birth) = patch.date_of_birth {
            self.date_of_birth = date_of_birth;
        }
        if let Some(gender) = patch.gender {
            self.gender = gender;
        }
        if let Some(blood_type) = patch.blood_type {
            self.blood_type = blood_type;
        }
        if let Some(allergies) = patch.allergies {
            self.allergies = allergies;
        }
        if let Some(chronic_conditions) = patch.chronic_conditions {
            self.chronic_conditions = chronic_conditions;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMedicalProfile {
    pub user_id: Option<Uuid>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub blood_type: Option<BloodType>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MedicalProfileDraft {
    pub user_id: Uuid,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_type: BloodType,
    pub allergies: Vec<String>,
    pub chronic_conditions: Vec<String>,
}

impl Validate for NewMedicalProfile {
    type Valid = MedicalProfileDraft;

    fn validate(self) -> ValidationResult<MedicalProfileDraft> {
        require(&[
            ("user_id", self.user_id.is_none()),
            ("date_of_birth", self.date_of_birth.is_none()),
            ("gender", self.gender.is_none()),
        ])?;
        let (Some(user_id), Some(date_of_birth), Some(gender)) = (self.user_id, self.date_of_birth, self.gender)
        else {
            return Err(ValidationError::missing(["user_id", "date_of_birth", "gender"]));
        };
        Ok(MedicalProfileDraft {
            user_id,
            date_of_birth,
            gender,
            blood_type: self.blood_type.unwrap_or_default(),
            allergies: self.allergies,
            chronic_conditions: self.chronic_conditions,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalProfilePatch {
    pub user_id: Option<Uuid>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub blood_type: Option<BloodType>,
    pub allergies: Option<Vec<String>>,
    pub chronic_conditions: Option<Vec<String>>,
}

impl MedicalProfilePatch {
    /// A profile stays bound to its patient for life.
    pub fn check_against(&self, profile: &MedicalProfile) -> ValidationResult<()> {
        match self.user_id {
            Some(user_id) if user_id != profile.user_id => Err(ValidationError::Immutable("user_id".to_string())),
            _ => Ok(()),
        }
    }
}

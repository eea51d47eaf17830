// models/src/medical/prescription.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};
use crate::validation::{is_blank, not_blank_if_present, require, Validate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub instructions: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub refills: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prescription {
    pub fn from_draft(draft: PrescriptionDraft, doctor_id: Uuid) -> Self {
        let now = Utc::now();
        Prescription {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id: draft.patient_id,
            medication: draft.medication,
            dosage: draft.dosage,
            instructions: draft.instructions,
            start_date: draft.start_date.unwrap_or(now),
            end_date: draft.end_date,
            refills: draft.refills,
            created_at: now,
            updated_at: now,
        }
    }

    /// No end date, or an end date still in the future.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.end_date.map_or(true, |end| end > now)
    }

    pub fn apply_patch(&mut self, patch: PrescriptionPatch) -> ValidationResult<()> {
        let start = patch.start_date.unwrap_or(self.start_date);
        let end = match patch.end_date {
            Some(end) => end,
            None => self.end_date,
        };
        check_dates(start, end)?;

        if let Some(medication) = patch.medication {
            self.medication = medication;
        }
        if let Some(dosage) = patch.dosage {
            self.dosage = dosage;
        }
        if let Some(instructions) = patch.instructions {
            self.instructions = instructions;
        }
        if let Some(refills) = patch.refills {
            self.refills = refills;
        }
        self.start_date = start;
        self.end_date = end;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrescriptionView {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub is_active: bool,
}

impl PrescriptionView {
    pub fn at(prescription: Prescription, now: DateTime<Utc>) -> Self {
        PrescriptionView { is_active: prescription.is_active(now), prescription }
    }
}

fn check_dates(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> ValidationResult<()> {
    match end {
        Some(end) if end < start => Err(ValidationError::invalid("end_date", "precedes start_date")),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPrescription {
    pub patient_id: Option<Uuid>,
    pub medication: Option<String>,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub refills: Option<u32>,
    /// When present the new prescription is back-linked onto this consultation.
    pub consultation_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrescriptionDraft {
    pub patient_id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub instructions: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub refills: u32,
    pub consultation_id: Option<Uuid>,
}

impl Validate for NewPrescription {
    type Valid = PrescriptionDraft;

    fn validate(self) -> ValidationResult<PrescriptionDraft> {
        require(&[
            ("patient_id", self.patient_id.is_none()),
            ("medication", is_blank(&self.medication)),
            ("dosage", is_blank(&self.dosage)),
            ("instructions", is_blank(&self.instructions)),
        ])?;
        let (Some(patient_id), Some(medication), Some(dosage), Some(instructions)) =
            (self.patient_id, self.medication, self.dosage, self.instructions)
        else {
            return Err(ValidationError::missing(["patient_id", "medication", "dosage", "instructions"]));
        };
        if let Some(start) = self.start_date {
            check_dates(start, self.end_date)?;
        }
        Ok(PrescriptionDraft {
            patient_id,
            medication,
            dosage,
            instructions,
            start_date: self.start_date,
            end_date: self.end_date,
            refills: self.refills.unwrap_or(0),
            consultation_id: self.consultation_id,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionPatch {
    pub medication: Option<String>,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    /// Absent keeps the end date, `null` makes the prescription open-ended.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub refills: Option<u32>,
}

impl Validate for PrescriptionPatch {
    type Valid = PrescriptionPatch;

    fn validate(self) -> ValidationResult<PrescriptionPatch> {
        not_blank_if_present("medication", &self.medication)?;
        not_blank_if_present("dosage", &self.dosage)?;
        not_blank_if_present("instructions", &self.instructions)?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    /// Only prescriptions active at this instant.
    pub active_at: Option<DateTime<Utc>>,
}

impl PrescriptionFilter {
    pub fn for_patient(patient_id: Uuid) -> Self {
        PrescriptionFilter { patient_id: Some(patient_id), ..Default::default() }
    }

    pub fn for_doctor(doctor_id: Uuid) -> Self {
        PrescriptionFilter { doctor_id: Some(doctor_id), ..Default::default() }
    }

    pub fn matches(&self, prescription: &Prescription) -> bool {
        self.patient_id.map_or(true, |id| prescription.patient_id == id)
            && self.doctor_id.map_or(true, |id| prescription.doctor_id == id)
            && self.active_at.map_or(true, |now| prescription.is_active(now))
    }
}

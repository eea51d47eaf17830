// models/src/medical/consultation.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};
use crate::validation::{is_blank, not_blank_if_present, require, Validate};

/// The clinical record of a completed appointment. At most one per appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub notes: String,
    pub diagnosis: String,
    /// Weak link: cleared, never followed, once the prescription is deleted.
    pub prescription_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consultation {
    pub fn from_draft(draft: ConsultationDraft) -> Self {
        let now = Utc::now();
        Consultation {
            id: Uuid::new_v4(),
            appointment_id: draft.appointment_id,
            notes: draft.notes,
            diagnosis: draft.diagnosis,
            prescription_id: draft.prescription_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: &ConsultationPatch) {
        if let Some(ref notes) = patch.notes {
            self.notes = notes.clone();
        }
        if let Some(ref diagnosis) = patch.diagnosis {
            self.diagnosis = diagnosis.clone();
        }
        if let Some(prescription_id) = patch.prescription_id {
            self.prescription_id = prescription_id;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewConsultation {
    pub appointment_id: Option<Uuid>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsultationDraft {
    pub appointment_id: Uuid,
    pub notes: String,
    pub diagnosis: String,
    pub prescription_id: Option<Uuid>,
}

impl Validate for NewConsultation {
    type Valid = ConsultationDraft;

    fn validate(self) -> ValidationResult<ConsultationDraft> {
        require(&[
            ("appointment_id", self.appointment_id.is_none()),
            ("notes", is_blank(&self.notes)),
            ("diagnosis", is_blank(&self.diagnosis)),
        ])?;
        let (Some(appointment_id), Some(notes), Some(diagnosis)) = (self.appointment_id, self.notes, self.diagnosis)
        else {
            return Err(ValidationError::missing(["appointment_id", "notes", "diagnosis"]));
        };
        Ok(ConsultationDraft {
            appointment_id,
            notes,
            diagnosis,
            prescription_id: self.prescription_id,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsultationPatch {
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    /// Absent keeps the link, `null` clears it.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "::serde_with::rust::double_option")]
    pub prescription_id: Option<Option<Uuid>>,
}

impl ConsultationPatch {
    /// The prescription this patch links, if it sets one.
    pub fn linked_prescription(&self) -> Option<Uuid> {
        self.prescription_id.flatten()
    }
}

impl Validate for ConsultationPatch {
    type Valid = ConsultationPatch;

    fn validate(self) -> ValidationResult<ConsultationPatch> {
        not_blank_if_present("notes", &self.notes)?;
        not_blank_if_present("diagnosis", &self.diagnosis)?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsultationFilter {
    /// Restrict to consultations of these appointments. `Some(vec![])` matches nothing.
    pub appointment_ids: Option<Vec<Uuid>>,
    pub prescription_id: Option<Uuid>,
}

impl ConsultationFilter {
    pub fn for_appointments(appointment_ids: Vec<Uuid>) -> Self {
        ConsultationFilter { appointment_ids: Some(appointment_ids), ..Default::default() }
    }

    pub fn matches(&self, consultation: &Consultation) -> bool {
        self.appointment_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&consultation.appointment_id))
            && self
                .prescription_id
                .map_or(true, |id| consultation.prescription_id == Some(id))
    }
}

// security/src/policy.rs
//! Role and ownership rules for every record kind, kept as one ordered table.
//!
//! [`decide`] walks [`POLICIES`] top to bottom and the first policy whose
//! matcher fires produces the decision. Nothing here touches storage: callers
//! load the record first (so a missing record is reported as not found, not
//! as a denial) and hand it in as a [`Target`].

use log::debug;
use uuid::Uuid;

use models::{Appointment, AppointmentStatus, MedicalProfile, Prescription, Role};

use crate::Caller;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
    Facility,
    MedicalProfile,
    Appointment,
    Consultation,
    Prescription,
}

impl ResourceKind {
    /// Appointment, Consultation and Prescription: visible to their participants.
    pub fn is_clinical(&self) -> bool {
        matches!(
            self,
            ResourceKind::Appointment | ResourceKind::Consultation | ResourceKind::Prescription
        )
    }
}

/// The thing an action is aimed at.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// No instance to check against: a listing or a creation.
    Kind(ResourceKind),
    /// Aggregate or maintenance views over a kind (filters, statistics, reminders).
    Report(ResourceKind),
    User(Uuid),
    Facility,
    Profile(&'a MedicalProfile),
    /// An appointment, with the status an update asks for, if any, and whether
    /// the update also edits its other fields.
    Appointment {
        appointment: &'a Appointment,
        requested_status: Option<AppointmentStatus>,
        edits_details: bool,
    },
    /// A consultation, judged through its parent appointment. Also the target
    /// of consultation creation.
    Consultation { appointment: &'a Appointment },
    Prescription(&'a Prescription),
    /// Everything on record for one patient, e.g. their active prescriptions.
    PatientRecords(Uuid),
}

impl Target<'_> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Target::Kind(kind) | Target::Report(kind) => *kind,
            Target::User(_) => ResourceKind::User,
            Target::Facility => ResourceKind::Facility,
            Target::Profile(_) => ResourceKind::MedicalProfile,
            Target::Appointment { .. } => ResourceKind::Appointment,
            Target::Consultation { .. } => ResourceKind::Consultation,
            Target::Prescription(_) | Target::PatientRecords(_) => ResourceKind::Prescription,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        *self == Decision::Allow
    }

    fn from_bool(allowed: bool, reason: &'static str) -> Self {
        if allowed { Decision::Allow } else { Decision::Deny(reason) }
    }
}

/// How a listing is narrowed for a caller, applied as a store query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    /// Records whose patient (or, for profiles, owning user) is this id.
    Patient(Uuid),
    /// Records whose assigned doctor is this id.
    Doctor(Uuid),
}

pub fn list_scope(caller: &Caller, kind: ResourceKind) -> Scope {
    match (caller.role, kind) {
        (Role::Admin, _) | (_, ResourceKind::Facility) => Scope::All,
        (Role::Doctor, ResourceKind::MedicalProfile) => Scope::All,
        (Role::Doctor, _) => Scope::Doctor(caller.id),
        (Role::Patient, _) => Scope::Patient(caller.id),
    }
}

struct Policy {
    name: &'static str,
    applies: fn(&Caller, Action, &Target) -> bool,
    decide: fn(&Caller, Action, &Target) -> Decision,
}

static POLICIES: &[Policy] = &[
    Policy {
        name: "admin-superuser",
        applies: |caller, _, _| caller.is_admin(),
        decide: |_, _, _| Decision::Allow,
    },
    Policy {
        name: "delete-admin-only",
        applies: |_, action, _| action == Action::Delete,
        decide: |_, _, _| Decision::Deny("only administrators may delete records"),
    },
    Policy {
        name: "reports-admin-only",
        applies: |_, _, target| matches!(target, Target::Report(_)),
        decide: |_, _, _| Decision::Deny("only administrators may use this view"),
    },
    Policy {
        name: "scoped-listing",
        applies: |_, action, target| {
            action == Action::List
                && matches!(target, Target::Kind(kind) if kind.is_clinical() || *kind == ResourceKind::MedicalProfile)
        },
        decide: |_, _, _| Decision::Allow,
    },
    Policy {
        name: "clinical-participants-read",
        applies: |_, action, target| {
            matches!(action, Action::List | Action::Read)
                && matches!(
                    target,
                    Target::Appointment { .. } | Target::Consultation { .. } | Target::Prescription(_)
                )
        },
        decide: |caller, _, target| {
            let participant = match target {
                Target::Appointment { appointment, .. } | Target::Consultation { appointment } => {
                    appointment.involves(caller.id)
                }
                Target::Prescription(rx) => rx.patient_id == caller.id || rx.doctor_id == caller.id,
                _ => false,
            };
            Decision::from_bool(participant, "not a participant in this record")
        },
    },
    Policy {
        name: "profile-read",
        applies: |_, action, target| {
            matches!(action, Action::List | Action::Read) && matches!(target, Target::Profile(_))
        },
        decide: |caller, _, target| {
            let owner = matches!(target, Target::Profile(p) if p.user_id == caller.id);
            Decision::from_bool(owner || caller.is_doctor(), "not your medical profile")
        },
    },
    Policy {
        name: "patient-records-read",
        applies: |_, action, target| {
            matches!(action, Action::List | Action::Read) && matches!(target, Target::PatientRecords(_))
        },
        decide: |caller, _, target| {
            let own = matches!(target, Target::PatientRecords(id) if *id == caller.id);
            Decision::from_bool(own || caller.is_doctor(), "not your records")
        },
    },
    Policy {
        name: "consultation-create",
        applies: |_, action, target| action == Action::Create && target.kind() == ResourceKind::Consultation,
        decide: |caller, _, target| {
            let assigned = matches!(target, Target::Consultation { appointment } if appointment.doctor_id == caller.id);
            Decision::from_bool(
                caller.is_doctor() && assigned,
                "only the assigned doctor may record a consultation",
            )
        },
    },
    Policy {
        name: "prescription-create",
        applies: |_, action, target| action == Action::Create && target.kind() == ResourceKind::Prescription,
        decide: |caller, _, _| Decision::from_bool(caller.is_doctor(), "only doctors may prescribe"),
    },
    Policy {
        name: "appointment-create",
        applies: |_, action, target| action == Action::Create && target.kind() == ResourceKind::Appointment,
        decide: |caller, _, _| Decision::from_bool(caller.is_patient(), "only patients may book appointments"),
    },
    Policy {
        name: "appointment-update",
        applies: |_, action, target| action == Action::Update && matches!(target, Target::Appointment { .. }),
        decide: |caller, _, target| match target {
            Target::Appointment { appointment, .. } if appointment.doctor_id == caller.id => Decision::Allow,
            Target::Appointment { appointment, requested_status, edits_details } if appointment.patient_id == caller.id => {
                match (requested_status, edits_details) {
                    (None | Some(AppointmentStatus::Cancelled), false) => Decision::Allow,
                    _ => Decision::Deny("patients may only cancel their appointments"),
                }
            }
            _ => Decision::Deny("not a participant in this appointment"),
        },
    },
    Policy {
        name: "consultation-update",
        applies: |_, action, target| action == Action::Update && matches!(target, Target::Consultation { .. }),
        decide: |caller, _, target| {
            let assigned = matches!(target, Target::Consultation { appointment } if appointment.doctor_id == caller.id);
            Decision::from_bool(assigned, "only the assigned doctor may edit this consultation")
        },
    },
    Policy {
        name: "prescription-update",
        applies: |_, action, target| action == Action::Update && matches!(target, Target::Prescription(_)),
        decide: |caller, _, target| {
            let prescriber = matches!(target, Target::Prescription(rx) if rx.doctor_id == caller.id);
            Decision::from_bool(prescriber, "only the prescribing doctor may edit this prescription")
        },
    },
    Policy {
        name: "profile-update",
        applies: |_, action, target| action == Action::Update && matches!(target, Target::Profile(_)),
        decide: |caller, _, target| {
            let owner = matches!(target, Target::Profile(p) if p.user_id == caller.id);
            Decision::from_bool(owner, "not your medical profile")
        },
    },
    Policy {
        name: "user-self-read",
        applies: |_, action, target| action == Action::Read && matches!(target, Target::User(_)),
        decide: |caller, _, target| {
            Decision::from_bool(matches!(target, Target::User(id) if *id == caller.id), "not your account")
        },
    },
];

/// Decides whether `caller` may perform `action` on `target`.
pub fn decide(caller: &Caller, action: Action, target: &Target) -> Decision {
    let decision = POLICIES
        .iter()
        .find(|policy| (policy.applies)(caller, action, target))
        .map(|policy| {
            let decision = (policy.decide)(caller, action, target);
            if !decision.is_allowed() {
                debug!("policy {} denied {:?} {:?} for {} {}", policy.name, action, target.kind(), caller.role, caller.id);
            }
            decision
        });
    decision.unwrap_or_else(|| {
        debug!("no policy matched {:?} {:?} for {} {}", action, target.kind(), caller.role, caller.id);
        Decision::Deny("not permitted")
    })
}

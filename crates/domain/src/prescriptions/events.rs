use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::aggregate::MedicineLine;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
    PrescriptionCreated {
        id: String,
        doctor_id: String,
        patient_id: String,
        medicines: Vec<MedicineLine>,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    },

    PrescriptionDispensed {
        id: String,
        updated_at: DateTime<Utc>,
    },

    PrescriptionCompleted {
        id: String,
        updated_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::PrescriptionCreated { .. } => "Prescription:Created",
            Event::PrescriptionDispensed { .. } => "Prescription:Dispensed",
            Event::PrescriptionCompleted { .. } => "Prescription:Completed",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Event::PrescriptionCreated { id, .. }
            | Event::PrescriptionDispensed { id, .. }
            | Event::PrescriptionCompleted { id, .. } => id,
        }
    }
}

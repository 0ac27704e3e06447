use serde::{Deserialize, Serialize};
use super::aggregate::MedicineLine;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum Command {
    /// Write a new prescription for a patient
    CreatePrescription {
        id: String,
        doctor_id: String,
        patient_id: String,
        medicines: Vec<MedicineLine>,
        notes: Option<String>,
    },

    /// Hand the medicines over (pharmacist)
    DispensePrescription,

    /// Confirm receipt (owning patient)
    CompletePrescription,
}

use super::aggregate::MedicineLine;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePrescriptionInput {
    pub patient: String,
    pub medicines: Vec<MedicineLineInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Missing fields deserialize as empty strings so the workflow can report
/// which line is incomplete instead of failing the whole body.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicineLineInput {
    pub medicine: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

impl From<MedicineLineInput> for MedicineLine {
    fn from(input: MedicineLineInput) -> Self {
        MedicineLine::new(
            input.medicine.trim().to_string(),
            input.dosage.trim().to_string(),
            input.frequency.trim().to_string(),
            input.duration.trim().to_string(),
        )
    }
}

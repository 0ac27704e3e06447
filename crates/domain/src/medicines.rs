use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog entry. Only `stock_quantity` is touched by the prescription workflow.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: String,
    pub name: String,
    pub description: String,
    pub dosage_form: String,
    pub strength: String,
    pub manufacturer: String,
    #[serde(default)]
    pub stock_quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Units that can be taken for `owed` prescribed lines without going below zero.
    pub fn units_available(&self, owed: u32) -> u32 {
        owed.min(self.stock_quantity)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicineSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub dosage_form: String,
    pub strength: String,
}

impl From<&Medicine> for MedicineSummary {
    fn from(medicine: &Medicine) -> Self {
        Self {
            id: medicine.id.clone(),
            name: medicine.name.clone(),
            description: medicine.description.clone(),
            dosage_form: medicine.dosage_form.clone(),
            strength: medicine.strength.clone(),
        }
    }
}

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::medicines::MedicineSummary;
use crate::store::RecordStore;
use crate::users::UserSummary;

use super::{Prescription, PrescriptionStatus};

/// Prescription with its references resolved to display fields.
/// References that no longer resolve serialize as `null`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    pub patient: Option<UserSummary>,
    pub doctor: Option<UserSummary>,
    pub medicines: Vec<LineView>,
    pub notes: Option<String>,
    pub status: PrescriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct LineView {
    pub medicine: Option<MedicineSummary>,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

/// Resolves references, caching lookups across the prescriptions of one request.
pub struct Resolver<'a> {
    store: &'a dyn RecordStore,
    users: HashMap<String, Option<UserSummary>>,
    medicines: HashMap<String, Option<MedicineSummary>>,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self {
            store,
            users: HashMap::new(),
            medicines: HashMap::new(),
        }
    }

    async fn user(&mut self, id: &str) -> Result<Option<UserSummary>, Error> {
        if let Some(cached) = self.users.get(id) {
            return Ok(cached.clone());
        }
        let summary = self.store.get_user(id).await?.as_ref().map(UserSummary::from);
        self.users.insert(id.to_string(), summary.clone());
        Ok(summary)
    }

    async fn medicine(&mut self, id: &str) -> Result<Option<MedicineSummary>, Error> {
        if let Some(cached) = self.medicines.get(id) {
            return Ok(cached.clone());
        }
        let summary = self
            .store
            .get_medicine(id)
            .await?
            .as_ref()
            .map(MedicineSummary::from);
        self.medicines.insert(id.to_string(), summary.clone());
        Ok(summary)
    }

    pub async fn resolve(&mut self, prescription: Prescription) -> Result<View, Error> {
        let patient = self.user(&prescription.patient).await?;
        let doctor = self.user(&prescription.doctor).await?;

        let mut medicines = Vec::with_capacity(prescription.medicines.len());
        for line in prescription.medicines {
            medicines.push(LineView {
                medicine: self.medicine(&line.medicine).await?,
                dosage: line.dosage,
                frequency: line.frequency,
                duration: line.duration,
            });
        }

        Ok(View {
            id: prescription.id,
            patient,
            doctor,
            medicines,
            notes: prescription.notes,
            status: prescription.status,
            created_at: prescription.created_at,
            updated_at: prescription.updated_at,
        })
    }
}

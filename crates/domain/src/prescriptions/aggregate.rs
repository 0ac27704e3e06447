use std::collections::HashSet;

use chrono::{DateTime, Utc};
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::store::MAX_TRANSACTION_WRITES;

use super::{Command, Event};

/// Dispense writes one stock update per distinct medicine next to the prescription itself.
pub const MAX_DISTINCT_MEDICINES: usize = MAX_TRANSACTION_WRITES - 1;

/// Prescription workflow status
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionStatus {
    /// Written by a doctor, waiting for a pharmacist
    #[default]
    Created,
    /// Handed out by a pharmacist, waiting for the patient to confirm
    Dispensed,
    /// Receipt confirmed by the patient
    Completed,
}

impl PrescriptionStatus {
    /// The only status this one may advance to.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Dispensed),
            Self::Dispensed => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Dispensed => "dispensed",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prescription aggregate
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: String,
    pub patient: String,
    pub doctor: String,
    pub medicines: Vec<MedicineLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: PrescriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every committed write.
    #[serde(default)]
    pub version: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, new)]
pub struct MedicineLine {
    pub medicine: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

impl MedicineLine {
    fn is_complete(&self) -> bool {
        [&self.medicine, &self.dosage, &self.frequency, &self.duration]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

pub const AGGREGATE_TYPE: &str = "Prescription";

impl Prescription {
    pub fn handle(&self, command: Command) -> Result<Vec<Event>, Error> {
        match command {
            Command::CreatePrescription {
                id,
                doctor_id,
                patient_id,
                medicines,
                notes,
            } => {
                self.validate_new()?;
                validate_lines(&medicines)?;
                if patient_id.trim().is_empty() {
                    return Err(Error::validation("Patient is required"));
                }

                Ok(vec![Event::PrescriptionCreated {
                    id,
                    doctor_id,
                    patient_id,
                    medicines,
                    notes: notes.filter(|n| !n.trim().is_empty()),
                    created_at: Utc::now(),
                }])
            }

            Command::DispensePrescription => {
                self.validate_existing()?;
                self.validate_transition(PrescriptionStatus::Dispensed)?;

                Ok(vec![Event::PrescriptionDispensed {
                    id: self.id.clone(),
                    updated_at: Utc::now(),
                }])
            }

            Command::CompletePrescription => {
                self.validate_existing()?;
                self.validate_transition(PrescriptionStatus::Completed)?;

                Ok(vec![Event::PrescriptionCompleted {
                    id: self.id.clone(),
                    updated_at: Utc::now(),
                }])
            }
        }
    }

    pub fn apply(&mut self, event: Event) {
        match event {
            Event::PrescriptionCreated {
                id,
                doctor_id,
                patient_id,
                medicines,
                notes,
                created_at,
            } => {
                self.id = id;
                self.doctor = doctor_id;
                self.patient = patient_id;
                self.medicines = medicines;
                self.notes = notes;
                self.status = PrescriptionStatus::Created;
                self.created_at = created_at;
                self.updated_at = created_at;
            }

            Event::PrescriptionDispensed { updated_at, .. } => {
                self.status = PrescriptionStatus::Dispensed;
                self.updated_at = updated_at;
            }

            Event::PrescriptionCompleted { updated_at, .. } => {
                self.status = PrescriptionStatus::Completed;
                self.updated_at = updated_at;
            }
        }
    }

    fn validate_new(&self) -> Result<(), Error> {
        if !self.id.is_empty() {
            return Err(Error::Uniqueness {
                field: "id".to_string(),
            });
        }
        Ok(())
    }

    fn validate_existing(&self) -> Result<(), Error> {
        if self.id.is_empty() {
            return Err(Error::not_found(AGGREGATE_TYPE));
        }
        Ok(())
    }

    fn validate_transition(&self, to: PrescriptionStatus) -> Result<(), Error> {
        if self.status.next() != Some(to) {
            return Err(Error::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// Units owed per distinct medicine, one per line, in first-seen order.
    pub fn units_per_medicine(&self) -> Vec<(String, u32)> {
        let mut owed: Vec<(String, u32)> = Vec::new();
        for line in &self.medicines {
            match owed.iter_mut().find(|(id, _)| *id == line.medicine) {
                Some((_, units)) => *units += 1,
                None => owed.push((line.medicine.clone(), 1)),
            }
        }
        owed
    }
}

fn validate_lines(lines: &[MedicineLine]) -> Result<(), Error> {
    if lines.is_empty() {
        return Err(Error::validation(
            "Prescription needs at least one medicine",
        ));
    }
    if let Some(index) = lines.iter().position(|line| !line.is_complete()) {
        return Err(Error::validation(format!(
            "Medicine line {} needs a medicine, dosage, frequency and duration",
            index + 1
        )));
    }

    let distinct: HashSet<&str> = lines.iter().map(|line| line.medicine.as_str()).collect();
    if distinct.len() > MAX_DISTINCT_MEDICINES {
        return Err(Error::validation(format!(
            "Prescription may reference at most {} different medicines",
            MAX_DISTINCT_MEDICINES
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(medicine: &str) -> MedicineLine {
        MedicineLine::new(
            medicine.to_string(),
            "1 tablet".to_string(),
            "twice daily".to_string(),
            "7 days".to_string(),
        )
    }

    fn create(medicines: Vec<MedicineLine>) -> Command {
        Command::CreatePrescription {
            id: "rx-1".to_string(),
            doctor_id: "doc-1".to_string(),
            patient_id: "pat-1".to_string(),
            medicines,
            notes: Some("after meals".to_string()),
        }
    }

    fn created() -> Prescription {
        let mut prescription = Prescription::default();
        for event in prescription.handle(create(vec![line("med-1")])).unwrap() {
            prescription.apply(event);
        }
        prescription
    }

    #[test]
    fn create_starts_in_created_status() {
        let prescription = created();
        assert_eq!(prescription.id, "rx-1");
        assert_eq!(prescription.doctor, "doc-1");
        assert_eq!(prescription.patient, "pat-1");
        assert_eq!(prescription.status, PrescriptionStatus::Created);
        assert_eq!(prescription.created_at, prescription.updated_at);
        assert_eq!(prescription.notes.as_deref(), Some("after meals"));
    }

    #[test]
    fn create_rejects_empty_medicines() {
        let err = Prescription::default().handle(create(vec![])).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn create_rejects_incomplete_line() {
        let mut incomplete = line("med-1");
        incomplete.frequency = "  ".to_string();
        let err = Prescription::default()
            .handle(create(vec![line("med-2"), incomplete]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::validation("Medicine line 2 needs a medicine, dosage, frequency and duration")
        );
    }

    #[test]
    fn create_caps_distinct_medicines() {
        let at_limit: Vec<_> = (0..MAX_DISTINCT_MEDICINES)
            .map(|i| line(&format!("med-{i}")))
            .collect();
        assert!(Prescription::default().handle(create(at_limit)).is_ok());

        let over_limit: Vec<_> = (0..=MAX_DISTINCT_MEDICINES)
            .map(|i| line(&format!("med-{i}")))
            .collect();
        let err = Prescription::default()
            .handle(create(over_limit))
            .unwrap_err();
        assert_eq!(
            err,
            Error::validation("Prescription may reference at most 99 different medicines")
        );

        let repeated: Vec<_> = (0..150).map(|_| line("med-1")).collect();
        assert!(Prescription::default().handle(create(repeated)).is_ok());
    }

    #[test]
    fn create_drops_blank_notes() {
        let command = Command::CreatePrescription {
            id: "rx-1".to_string(),
            doctor_id: "doc-1".to_string(),
            patient_id: "pat-1".to_string(),
            medicines: vec![line("med-1")],
            notes: Some("   ".to_string()),
        };
        let events = Prescription::default().handle(command).unwrap();
        assert!(matches!(
            &events[0],
            Event::PrescriptionCreated { notes: None, .. }
        ));
    }

    #[test]
    fn create_on_existing_is_rejected() {
        let err = created().handle(create(vec![line("med-1")])).unwrap_err();
        assert!(matches!(err, Error::Uniqueness { .. }));
    }

    #[test]
    fn status_moves_forward_only() {
        let mut prescription = created();
        for event in prescription.handle(Command::DispensePrescription).unwrap() {
            prescription.apply(event);
        }
        assert_eq!(prescription.status, PrescriptionStatus::Dispensed);

        let err = prescription
            .handle(Command::DispensePrescription)
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidStateTransition {
                from: "dispensed".to_string(),
                to: "dispensed".to_string(),
            }
        );

        for event in prescription.handle(Command::CompletePrescription).unwrap() {
            prescription.apply(event);
        }
        assert_eq!(prescription.status, PrescriptionStatus::Completed);

        assert!(prescription.handle(Command::DispensePrescription).is_err());
        assert!(prescription.handle(Command::CompletePrescription).is_err());
    }

    #[test]
    fn complete_cannot_skip_dispense() {
        let prescription = created();
        let err = prescription
            .handle(Command::CompletePrescription)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(prescription.status, PrescriptionStatus::Created);
    }

    #[test]
    fn transitions_on_missing_prescription_are_not_found() {
        let err = Prescription::default()
            .handle(Command::DispensePrescription)
            .unwrap_err();
        assert_eq!(err, Error::not_found(AGGREGATE_TYPE));
    }

    #[test]
    fn units_per_medicine_counts_repeated_lines() {
        let mut prescription = created();
        prescription.medicines = vec![line("a"), line("b"), line("a")];
        assert_eq!(
            prescription.units_per_medicine(),
            vec![("a".to_string(), 2), ("b".to_string(), 1)]
        );
    }

    #[test]
    fn serializes_as_document() {
        let json = serde_json::to_value(created()).unwrap();
        assert_eq!(json["status"], "created");
        assert_eq!(json["medicines"][0]["medicine"], "med-1");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
    }
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::access::{authorize, authorize_record, Operation, Principal};
use crate::errors::Error;
use crate::store::{PrescriptionFilter, RecordStore, Transaction, Write};
use crate::users::Role;

use super::inputs::CreatePrescriptionInput;
use super::view::{Resolver, View};
use super::{Command, Event, Prescription, PrescriptionStatus, AGGREGATE_TYPE};

/// Reload-and-retry budget when a commit loses to a concurrent writer.
pub const MAX_COMMIT_ATTEMPTS: usize = 8;

#[derive(Clone)]
pub struct Workflow {
    store: Arc<dyn RecordStore>,
}

impl Workflow {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub async fn create(
        &self,
        principal: &Principal,
        input: CreatePrescriptionInput,
    ) -> Result<Prescription, Error> {
        authorize(principal, Operation::CreatePrescription)?;

        let command = Command::CreatePrescription {
            id: Ulid::new().to_string(),
            doctor_id: principal.id.clone(),
            patient_id: input.patient.trim().to_string(),
            medicines: input.medicines.into_iter().map(Into::into).collect(),
            notes: input.notes.map(|notes| notes.trim().to_string()),
        };

        let mut prescription = Prescription::default();
        let events = prescription.handle(command)?;
        for event in events.iter().cloned() {
            prescription.apply(event);
        }

        self.ensure_references(&prescription).await?;

        prescription.version = 1;
        self.store.insert_prescription(&prescription).await?;
        log_events(&events);

        Ok(prescription)
    }

    pub async fn dispense(&self, principal: &Principal, id: &str) -> Result<Prescription, Error> {
        self.transition(
            principal,
            id,
            Operation::DispensePrescription,
            Command::DispensePrescription,
        )
        .await
    }

    pub async fn complete(&self, principal: &Principal, id: &str) -> Result<Prescription, Error> {
        self.transition(
            principal,
            id,
            Operation::CompletePrescription,
            Command::CompletePrescription,
        )
        .await
    }

    pub async fn get(&self, principal: &Principal, id: &str) -> Result<View, Error> {
        authorize(principal, Operation::ViewPrescription)?;
        let prescription = self.load(id).await?;
        authorize_record(principal, Operation::ViewPrescription, &prescription)?;

        Resolver::new(self.store.as_ref()).resolve(prescription).await
    }

    /// Prescriptions written by the calling doctor, newest first.
    pub async fn list_for_doctor(&self, principal: &Principal) -> Result<Vec<View>, Error> {
        authorize(principal, Operation::ListAuthored)?;
        self.list(PrescriptionFilter::Doctor(principal.id.clone()))
            .await
    }

    /// Prescriptions issued to the calling patient, newest first.
    pub async fn list_for_patient(&self, principal: &Principal) -> Result<Vec<View>, Error> {
        authorize(principal, Operation::ListReceived)?;
        self.list(PrescriptionFilter::Patient(principal.id.clone()))
            .await
    }

    /// Prescriptions waiting for a pharmacist, newest first.
    pub async fn list_pending(&self, principal: &Principal) -> Result<Vec<View>, Error> {
        authorize(principal, Operation::ListPending)?;
        self.list(PrescriptionFilter::Status(PrescriptionStatus::Created))
            .await
    }

    async fn list(&self, filter: PrescriptionFilter) -> Result<Vec<View>, Error> {
        let mut prescriptions = self.store.list_prescriptions(filter).await?;
        prescriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut resolver = Resolver::new(self.store.as_ref());
        let mut views = Vec::with_capacity(prescriptions.len());
        for prescription in prescriptions {
            views.push(resolver.resolve(prescription).await?);
        }
        Ok(views)
    }

    async fn load(&self, id: &str) -> Result<Prescription, Error> {
        self.store
            .get_prescription(id)
            .await?
            .ok_or_else(|| Error::not_found(AGGREGATE_TYPE))
    }

    async fn ensure_references(&self, prescription: &Prescription) -> Result<(), Error> {
        let patient = self
            .store
            .get_user(&prescription.patient)
            .await?
            .ok_or_else(|| Error::not_found("Patient"))?;
        if patient.role != Role::Patient {
            return Err(Error::validation(format!(
                "User {} is not a patient",
                patient.id
            )));
        }

        for (medicine_id, _) in prescription.units_per_medicine() {
            if self.store.get_medicine(&medicine_id).await?.is_none() {
                return Err(Error::not_found("Medicine"));
            }
        }
        Ok(())
    }

    async fn transition(
        &self,
        principal: &Principal,
        id: &str,
        operation: Operation,
        command: Command,
    ) -> Result<Prescription, Error> {
        authorize(principal, operation)?;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let current = self.load(id).await?;
            authorize_record(principal, operation, &current)?;

            let events = current.handle(command.clone())?;
            let mut next = current.clone();
            for event in events.iter().cloned() {
                next.apply(event);
            }

            let mut transaction = Transaction::default();
            if command == Command::DispensePrescription {
                self.take_stock(&current, next.updated_at, &mut transaction)
                    .await?;
            }
            transaction.push(Write::prescription(next.clone()));

            match self.store.commit(transaction).await {
                Ok(()) => {
                    next.version += 1;
                    log_events(&events);
                    return Ok(next);
                }
                Err(Error::Conflict { entity }) => {
                    tracing::warn!(
                        "Conflict on {} while updating prescription {} (attempt {}/{})",
                        entity,
                        id,
                        attempt,
                        MAX_COMMIT_ATTEMPTS
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(Error::Conflict {
            entity: AGGREGATE_TYPE.to_string(),
        })
    }

    /// One unit per medicine line, floored at the stock on hand. Medicines that
    /// are out of stock or gone from the catalog are skipped.
    async fn take_stock(
        &self,
        prescription: &Prescription,
        at: DateTime<Utc>,
        transaction: &mut Transaction,
    ) -> Result<(), Error> {
        for (medicine_id, owed) in prescription.units_per_medicine() {
            let Some(medicine) = self.store.get_medicine(&medicine_id).await? else {
                tracing::warn!(
                    "Medicine {} on prescription {} no longer exists, skipping",
                    medicine_id,
                    prescription.id
                );
                continue;
            };

            let units = medicine.units_available(owed);
            if units < owed {
                tracing::info!(
                    "Medicine {} short by {} unit(s) for prescription {}",
                    medicine_id,
                    owed - units,
                    prescription.id
                );
            }
            if units > 0 {
                transaction.push(Write::take_stock(medicine_id, units, at));
            }
        }
        Ok(())
    }
}

fn log_events(events: &[Event]) {
    for event in events {
        tracing::info!("{} for {}", event.event_type(), event.id());
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::Error;
use crate::medicines::Medicine;
use crate::prescriptions::{Prescription, AGGREGATE_TYPE};
use crate::users::User;

use super::{PrescriptionFilter, RecordStore, Transaction, Write};

#[derive(Default)]
struct Records {
    users: HashMap<String, User>,
    medicines: HashMap<String, Medicine>,
    prescriptions: HashMap<String, Prescription>,
}

/// Keeps every record behind one lock, so a commit is trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seeded(users: Vec<User>, medicines: Vec<Medicine>) -> Self {
        let store = Self::new();
        for user in users {
            store.insert_user(user).await;
        }
        for medicine in medicines {
            store.insert_medicine(medicine).await;
        }
        store
    }

    pub async fn insert_user(&self, user: User) {
        self.records.write().await.users.insert(user.id.clone(), user);
    }

    pub async fn insert_medicine(&self, medicine: Medicine) {
        self.records
            .write()
            .await
            .medicines
            .insert(medicine.id.clone(), medicine);
    }
}

impl Records {
    fn check(&self, write: &Write) -> Result<(), Error> {
        match write {
            Write::Prescription {
                record,
                expected_version,
            } => {
                let stored = self
                    .prescriptions
                    .get(&record.id)
                    .map(|p| p.version);
                if stored != Some(*expected_version) {
                    return Err(Error::Conflict {
                        entity: AGGREGATE_TYPE.to_string(),
                    });
                }
            }
            Write::TakeStock {
                medicine_id, units, ..
            } => {
                let enough = self
                    .medicines
                    .get(medicine_id)
                    .is_some_and(|m| m.stock_quantity >= *units);
                if !enough {
                    return Err(Error::Conflict {
                        entity: "Medicine".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, write: Write) {
        match write {
            Write::Prescription { record, .. } => {
                self.prescriptions.insert(record.id.clone(), record);
            }
            Write::TakeStock {
                medicine_id,
                units,
                at,
            } => {
                if let Some(medicine) = self.medicines.get_mut(&medicine_id) {
                    medicine.stock_quantity -= units;
                    medicine.updated_at = at;
                }
            }
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, Error> {
        Ok(self.records.read().await.users.get(id).cloned())
    }

    async fn get_medicine(&self, id: &str) -> Result<Option<Medicine>, Error> {
        Ok(self.records.read().await.medicines.get(id).cloned())
    }

    async fn get_prescription(&self, id: &str) -> Result<Option<Prescription>, Error> {
        Ok(self.records.read().await.prescriptions.get(id).cloned())
    }

    async fn insert_prescription(&self, prescription: &Prescription) -> Result<(), Error> {
        let mut records = self.records.write().await;
        if records.prescriptions.contains_key(&prescription.id) {
            return Err(Error::Uniqueness {
                field: "id".to_string(),
            });
        }
        records
            .prescriptions
            .insert(prescription.id.clone(), prescription.clone());
        Ok(())
    }

    async fn list_prescriptions(
        &self,
        filter: PrescriptionFilter,
    ) -> Result<Vec<Prescription>, Error> {
        Ok(self
            .records
            .read()
            .await
            .prescriptions
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn commit(&self, transaction: Transaction) -> Result<(), Error> {
        let mut records = self.records.write().await;
        for write in &transaction.writes {
            records.check(write)?;
        }
        for write in transaction.writes {
            records.apply(write);
        }
        Ok(())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Error;
use crate::medicines::Medicine;
use crate::prescriptions::{Prescription, PrescriptionStatus};
use crate::users::User;

/// DynamoDB-backed store
pub mod dynamo;

/// In-process store
pub mod memory;

pub use dynamo::{DynamoStore, Tables};
pub use memory::MemoryStore;

/// Most writes one [`Transaction`] may carry; DynamoDB caps a transaction at 100 items.
pub const MAX_TRANSACTION_WRITES: usize = 100;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PrescriptionFilter {
    Doctor(String),
    Patient(String),
    Status(PrescriptionStatus),
}

impl PrescriptionFilter {
    pub fn matches(&self, prescription: &Prescription) -> bool {
        match self {
            Self::Doctor(id) => prescription.doctor == *id,
            Self::Patient(id) => prescription.patient == *id,
            Self::Status(status) => prescription.status == *status,
        }
    }
}

/// One conditional write inside a [`Transaction`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Write {
    /// Replace the prescription if the stored version still equals `expected_version`.
    Prescription {
        record: Prescription,
        expected_version: u64,
    },
    /// Subtract `units` from the medicine's stock if at least that many remain.
    TakeStock {
        medicine_id: String,
        units: u32,
        at: DateTime<Utc>,
    },
}

impl Write {
    /// Replaces `record` as loaded; the stored copy gets the next version.
    pub fn prescription(mut record: Prescription) -> Self {
        let expected_version = record.version;
        record.version += 1;
        Self::Prescription {
            record,
            expected_version,
        }
    }

    pub fn take_stock(medicine_id: impl Into<String>, units: u32, at: DateTime<Utc>) -> Self {
        Self::TakeStock {
            medicine_id: medicine_id.into(),
            units,
            at,
        }
    }
}

/// Writes that are applied together or not at all.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Transaction {
    pub writes: Vec<Write>,
}

impl Transaction {
    pub fn push(&mut self, write: Write) {
        self.writes.push(write);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, Error>;

    async fn get_medicine(&self, id: &str) -> Result<Option<Medicine>, Error>;

    async fn get_prescription(&self, id: &str) -> Result<Option<Prescription>, Error>;

    /// Fails with [`Error::Uniqueness`] when the id is taken.
    async fn insert_prescription(&self, prescription: &Prescription) -> Result<(), Error>;

    async fn list_prescriptions(
        &self,
        filter: PrescriptionFilter,
    ) -> Result<Vec<Prescription>, Error>;

    /// Applies every write or none. A failed condition yields [`Error::Conflict`].
    async fn commit(&self, transaction: Transaction) -> Result<(), Error>;
}

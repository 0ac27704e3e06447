use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::DisplayErrorContext,
    types::{AttributeValue, Put, TransactWriteItem, Update},
    Client,
};
use chrono::SecondsFormat;
use serde::de::DeserializeOwned;

use crate::errors::Error;
use crate::medicines::Medicine;
use crate::prescriptions::{Prescription, AGGREGATE_TYPE};
use crate::users::User;

use super::{PrescriptionFilter, RecordStore, Transaction, Write, MAX_TRANSACTION_WRITES};

type Item = HashMap<String, AttributeValue>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tables {
    pub users: String,
    pub medicines: String,
    pub prescriptions: String,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            users: "healthcare-users".to_string(),
            medicines: "healthcare-medicines".to_string(),
            prescriptions: "healthcare-prescriptions".to_string(),
        }
    }
}

pub struct DynamoStore {
    client: Client,
    tables: Tables,
}

impl DynamoStore {
    pub fn new(client: Client, tables: Tables) -> Self {
        Self { client, tables }
    }

    async fn get<T: DeserializeOwned>(&self, table: &str, id: &str) -> Result<Option<T>, Error> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .key("id", AttributeValue::S(id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| Error::storage(DisplayErrorContext(err)))?;

        match output.item() {
            Some(item) => Ok(Some(
                serde_dynamo::from_item(item.clone()).map_err(Error::storage)?,
            )),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RecordStore for DynamoStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, Error> {
        self.get(&self.tables.users, id).await
    }

    async fn get_medicine(&self, id: &str) -> Result<Option<Medicine>, Error> {
        self.get(&self.tables.medicines, id).await
    }

    async fn get_prescription(&self, id: &str) -> Result<Option<Prescription>, Error> {
        self.get(&self.tables.prescriptions, id).await
    }

    async fn insert_prescription(&self, prescription: &Prescription) -> Result<(), Error> {
        let item: Item = serde_dynamo::to_item(prescription).map_err(Error::storage)?;

        self.client
            .put_item()
            .table_name(&self.tables.prescriptions)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception())
                {
                    Error::Uniqueness {
                        field: "id".to_string(),
                    }
                } else {
                    Error::storage(DisplayErrorContext(err))
                }
            })?;

        Ok(())
    }

    async fn list_prescriptions(
        &self,
        filter: PrescriptionFilter,
    ) -> Result<Vec<Prescription>, Error> {
        let (field, value) = filter_condition(&filter);
        let mut prescriptions = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.tables.prescriptions)
                .consistent_read(true)
                .filter_expression("#field = :value")
                .expression_attribute_names("#field", field)
                .expression_attribute_values(":value", value.clone())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|err| Error::storage(DisplayErrorContext(err)))?;

            for item in output.items() {
                prescriptions.push(serde_dynamo::from_item(item.clone()).map_err(Error::storage)?);
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(prescriptions)
    }

    async fn commit(&self, transaction: Transaction) -> Result<(), Error> {
        if transaction.is_empty() {
            return Ok(());
        }
        if transaction.len() > MAX_TRANSACTION_WRITES {
            return Err(Error::storage(format!(
                "transaction has {} writes, limit is {}",
                transaction.len(),
                MAX_TRANSACTION_WRITES
            )));
        }

        let items = transaction
            .writes
            .into_iter()
            .map(|write| transact_item(&self.tables, write))
            .collect::<Result<Vec<_>, _>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|err| {
                let cancelled = err
                    .as_service_error()
                    .is_some_and(|e| e.is_transaction_canceled_exception());
                let detail = DisplayErrorContext(err).to_string();
                if cancelled {
                    tracing::warn!("Transaction cancelled: {}", detail);
                    Error::Conflict {
                        entity: AGGREGATE_TYPE.to_string(),
                    }
                } else {
                    Error::storage(detail)
                }
            })?;

        Ok(())
    }
}

fn filter_condition(filter: &PrescriptionFilter) -> (&'static str, AttributeValue) {
    match filter {
        PrescriptionFilter::Doctor(id) => ("doctor", AttributeValue::S(id.clone())),
        PrescriptionFilter::Patient(id) => ("patient", AttributeValue::S(id.clone())),
        PrescriptionFilter::Status(status) => {
            ("status", AttributeValue::S(status.as_str().to_string()))
        }
    }
}

fn transact_item(tables: &Tables, write: Write) -> Result<TransactWriteItem, Error> {
    match write {
        Write::Prescription {
            record,
            expected_version,
        } => {
            let item: Item = serde_dynamo::to_item(&record).map_err(Error::storage)?;
            // Records written before versioning carry no attribute at all.
            let condition = if expected_version == 0 {
                "attribute_exists(id) AND (attribute_not_exists(#version) OR #version = :expected)"
            } else {
                "#version = :expected"
            };

            let put = Put::builder()
                .table_name(&tables.prescriptions)
                .set_item(Some(item))
                .condition_expression(condition)
                .expression_attribute_names("#version", "version")
                .expression_attribute_values(
                    ":expected",
                    AttributeValue::N(expected_version.to_string()),
                )
                .build()
                .map_err(Error::storage)?;

            Ok(TransactWriteItem::builder().put(put).build())
        }

        Write::TakeStock {
            medicine_id,
            units,
            at,
        } => {
            let update = Update::builder()
                .table_name(&tables.medicines)
                .key("id", AttributeValue::S(medicine_id))
                .update_expression("SET stockQuantity = stockQuantity - :units, updatedAt = :at")
                .condition_expression("attribute_exists(id) AND stockQuantity >= :units")
                .expression_attribute_values(":units", AttributeValue::N(units.to_string()))
                .expression_attribute_values(
                    ":at",
                    AttributeValue::S(at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                )
                .build()
                .map_err(Error::storage)?;

            Ok(TransactWriteItem::builder().update(update).build())
        }
    }
}

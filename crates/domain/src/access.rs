//! Capability checks for prescription operations.
//!
//! Every operation declares the role it needs and how the caller must relate
//! to the prescription. Role checks run before the record is loaded, relation
//! checks after.

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::prescriptions::Prescription;
use crate::users::{Role, User};

/// The authenticated caller of an operation.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, new)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self::new(user.id.clone(), user.role)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    CreatePrescription,
    DispensePrescription,
    CompletePrescription,
    ViewPrescription,
    ListAuthored,
    ListReceived,
    ListPending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Relation {
    Any,
    /// Caller is the patient the prescription was written for.
    OwningPatient,
    /// Caller wrote it, received it, or is a pharmacist.
    Participant,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Capability {
    /// `None` admits every role.
    pub role: Option<Role>,
    pub relation: Relation,
}

impl Operation {
    pub fn capability(self) -> Capability {
        let (role, relation) = match self {
            Operation::CreatePrescription => (Some(Role::Doctor), Relation::Any),
            Operation::DispensePrescription => (Some(Role::Pharmacist), Relation::Any),
            Operation::CompletePrescription => (Some(Role::Patient), Relation::OwningPatient),
            Operation::ViewPrescription => (None, Relation::Participant),
            Operation::ListAuthored => (Some(Role::Doctor), Relation::Any),
            Operation::ListReceived => (Some(Role::Patient), Relation::Any),
            Operation::ListPending => (Some(Role::Pharmacist), Relation::Any),
        };
        Capability { role, relation }
    }
}

pub fn authorize(principal: &Principal, operation: Operation) -> Result<(), Error> {
    match operation.capability().role {
        Some(role) if role != principal.role => {
            tracing::warn!(
                "{} {} denied {:?}: requires {}",
                principal.role,
                principal.id,
                operation,
                role
            );
            Err(Error::Forbidden)
        }
        _ => Ok(()),
    }
}

pub fn authorize_record(
    principal: &Principal,
    operation: Operation,
    prescription: &Prescription,
) -> Result<(), Error> {
    let allowed = match operation.capability().relation {
        Relation::Any => true,
        Relation::OwningPatient => {
            principal.role == Role::Patient && principal.id == prescription.patient
        }
        Relation::Participant => match principal.role {
            Role::Doctor => principal.id == prescription.doctor,
            Role::Patient => principal.id == prescription.patient,
            Role::Pharmacist => true,
        },
    };

    if !allowed {
        tracing::warn!(
            "{} {} denied {:?} on prescription {}",
            principal.role,
            principal.id,
            operation,
            prescription.id
        );
        return Err(Error::Forbidden);
    }
    Ok(())
}

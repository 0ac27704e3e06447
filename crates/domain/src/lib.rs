//! Prescription Workflow Domain

/// Capability checks
pub mod access;

/// Domain errors
pub mod errors;

/// Medicine catalog records
pub mod medicines;

/// Prescription aggregate and workflow
pub mod prescriptions;

/// Record stores
pub mod store;

/// User records and roles
pub mod users;

pub use access::Principal;
pub use errors::Error;

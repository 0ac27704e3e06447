/// Prescription aggregate
pub mod aggregate;

/// Commands
pub mod commands;

/// Events
pub mod events;

/// Input DTOs
pub mod inputs;

/// Resolved read model
pub mod view;

/// Lifecycle operations over a record store
pub mod workflow;

pub use aggregate::{MedicineLine, Prescription, PrescriptionStatus, AGGREGATE_TYPE};
pub use commands::Command;
pub use events::Event;
pub use view::View;
pub use workflow::Workflow;

/// Prescription aggregate
pub mod aggregate;

/// Commands
pub mod commands;

/// Events
pub mod events;

/// Input DTOs
pub mod inputs;

/// View (read model)
pub mod view;

pub use aggregate::{
    Prescription, PrescriptionItem, PrescriptionStatus, PrescriptionType, Services,
    AGGREGATE_TYPE, DEFAULT_VALIDITY_DAYS,
};
pub use commands::Command;
pub use events::Event;
pub use view::{Query, View};

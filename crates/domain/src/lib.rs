//! Pharmacy Dispensing Domain Models
//!
//! The prescription lifecycle, the scan-driven dispense session with its
//! safety rules, and the fulfillment queue, modeled as event-sourced
//! aggregates. Persistence and transport stay behind the `cqrs-es`
//! `EventStore`/`ViewRepository` seams.

/// Prescription aggregate
pub mod prescriptions;

/// Dispense session aggregate and scan safety rules
pub mod sessions;

/// Fulfillment queue aggregate and board read model
pub mod queue;

/// Cross-aggregate orchestration
pub mod workflow;

/// Domain errors
pub mod errors;

/// Domain events wrapper
pub mod event;

/// Event relay to downstream publishers
pub mod publisher;

/// Collaborator interfaces (clock, catalog, batches)
pub mod services;

/// In-memory view repository
pub mod memory;

pub use errors::Error;
pub use event::DomainEvent;

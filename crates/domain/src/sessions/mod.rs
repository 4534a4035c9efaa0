/// Dispense session aggregate
pub mod aggregate;

/// Commands
pub mod commands;

/// Events
pub mod events;

/// Scan safety rules
pub mod safety;

/// View (read model)
pub mod view;

pub use aggregate::{
    DispenseSession, FillDisposition, ItemProgress, ScanOutcome, ScanRecord, Services,
    SessionStatus, AGGREGATE_TYPE, IDLE_ABORT_REASON, IDLE_TIMEOUT_MINUTES,
};
pub use commands::{Command, SessionItem};
pub use events::Event;
pub use safety::BlockReason;
pub use view::{Query, View};

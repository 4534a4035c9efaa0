/// Queue entry aggregate
pub mod aggregate;

/// Board read model
pub mod board;

/// Commands
pub mod commands;

/// Events
pub mod events;

/// View (read model)
pub mod view;

pub use aggregate::{Priority, QueueEntry, Services, Stage, AGGREGATE_TYPE};
pub use board::{Board, BoardCard, BoardQuery};
pub use commands::Command;
pub use events::Event;
pub use view::{Query, View};

use derive_new::new;
use serde::{Deserialize, Serialize};

/// Transport-agnostic envelope for a committed domain event, as handed to
/// downstream publishers. `payload` and `metadata` are the JSON forms taken
/// straight from the event log, so consumers can deserialize lazily and
/// deduplicate on (`id`, `sequence`).
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, new)]
pub struct DomainEvent {
    /// Aggregate id the event belongs to.
    pub id: String,
    pub aggregate_type: String,
    /// Position within the aggregate's stream; monotonic per `id`.
    pub sequence: usize,
    pub event_type: String,
    pub event_version: String,
    pub payload: String,
    pub metadata: String,
}

use chrono::{DateTime, Utc};
use cqrs_es::DomainEvent;
use serde::{Deserialize, Serialize};

use super::aggregate::{Priority, Stage};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
    Enqueued {
        id: String,
        prescription_id: String,
        priority: Priority,
        entered_at: DateTime<Utc>,
    },

    StageMoved {
        id: String,
        from: Stage,
        to: Stage,
        prior_stage_on_hold: Option<Stage>,
        version: u64,
        moved_at: DateTime<Utc>,
    },

    Assigned {
        id: String,
        user_id: String,
        assigned_at: DateTime<Utc>,
    },
}

impl DomainEvent for Event {
    fn event_type(&self) -> String {
        match self {
            Event::Enqueued { .. } => "QueueEntry:Enqueued".to_string(),
            Event::StageMoved { .. } => "QueueEntry:StageMoved".to_string(),
            Event::Assigned { .. } => "QueueEntry:Assigned".to_string(),
        }
    }

    fn event_version(&self) -> String {
        "1.0".to_string()
    }
}

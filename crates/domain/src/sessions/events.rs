use chrono::{DateTime, Utc};
use cqrs_es::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::prescriptions::PrescriptionType;

use super::aggregate::FillDisposition;
use super::commands::SessionItem;
use super::safety::BlockReason;

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        id: String,
        prescription_id: String,
        operator_id: String,
        prescription_type: PrescriptionType,
        refills_remaining: u32,
        items: Vec<SessionItem>,
        started_at: DateTime<Utc>,
        idle_deadline: DateTime<Utc>,
    },

    ScanAccepted {
        id: String,
        drug_id: String,
        barcode: String,
        batch_number: String,
        quantity: u32,
        scanned_at: DateTime<Utc>,
    },

    /// A scan the safety pipeline refused. Recorded for audit; dispensing
    /// progress is untouched.
    ScanBlocked {
        id: String,
        drug_id: Option<String>,
        barcode: String,
        batch_number: String,
        quantity: u32,
        reason: BlockReason,
        scanned_at: DateTime<Utc>,
    },

    SessionCompleted {
        id: String,
        disposition: FillDisposition,
        refill_consumed: bool,
        completed_at: DateTime<Utc>,
    },

    SessionAborted {
        id: String,
        reason: String,
        aborted_at: DateTime<Utc>,
    },
}

impl DomainEvent for Event {
    fn event_type(&self) -> String {
        match self {
            Event::SessionStarted { .. } => "DispenseSession:Started".to_string(),
            Event::ScanAccepted { .. } => "DispenseSession:ScanAccepted".to_string(),
            Event::ScanBlocked { .. } => "DispenseSession:ScanBlocked".to_string(),
            Event::SessionCompleted { .. } => "DispenseSession:Completed".to_string(),
            Event::SessionAborted { .. } => "DispenseSession:Aborted".to_string(),
        }
    }

    fn event_version(&self) -> String {
        "1.0".to_string()
    }
}

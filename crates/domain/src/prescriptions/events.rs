use chrono::{DateTime, Utc};
use cqrs_es::DomainEvent;
use serde::{Deserialize, Serialize};

use super::aggregate::{PrescriptionItem, PrescriptionType};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
    PrescriptionCreated {
        id: String,
        store_id: String,
        patient_id: String,
        doctor_id: String,
        prescription_type: PrescriptionType,
        prescription_date: DateTime<Utc>,
        expiry_date: Option<DateTime<Utc>>,
        refills_allowed: u32,
        diagnosis: String,
        notes: String,
        created_by: String,
        created_at: DateTime<Utc>,
    },

    ItemAdded {
        id: String,
        item: PrescriptionItem,
        added_at: DateTime<Utc>,
    },

    PrescriptionVerified {
        id: String,
        verified_by: String,
        verified_at: DateTime<Utc>,
    },

    PrescriptionActivated {
        id: String,
        expiry_date: DateTime<Utc>,
        activated_at: DateTime<Utc>,
    },

    PrescriptionPartiallyDispensed {
        id: String,
        dispensed_at: DateTime<Utc>,
    },

    PrescriptionCompleted {
        id: String,
        completed_at: DateTime<Utc>,
    },

    PrescriptionCancelled {
        id: String,
        reason: String,
        cancelled_by: String,
        cancelled_at: DateTime<Utc>,
    },

    PrescriptionExpired {
        id: String,
        expired_at: DateTime<Utc>,
    },

    RefillConsumed {
        id: String,
        refills_remaining: u32,
        consumed_at: DateTime<Utc>,
    },
}

impl DomainEvent for Event {
    fn event_type(&self) -> String {
        match self {
            Event::PrescriptionCreated { .. } => "Prescription:Created".to_string(),
            Event::ItemAdded { .. } => "Prescription:ItemAdded".to_string(),
            Event::PrescriptionVerified { .. } => "Prescription:Verified".to_string(),
            Event::PrescriptionActivated { .. } => "Prescription:Activated".to_string(),
            Event::PrescriptionPartiallyDispensed { .. } => {
                "Prescription:PartiallyDispensed".to_string()
            }
            Event::PrescriptionCompleted { .. } => "Prescription:Completed".to_string(),
            Event::PrescriptionCancelled { .. } => "Prescription:Cancelled".to_string(),
            Event::PrescriptionExpired { .. } => "Prescription:Expired".to_string(),
            Event::RefillConsumed { .. } => "Prescription:RefillConsumed".to_string(),
        }
    }

    fn event_version(&self) -> String {
        "1.0".to_string()
    }
}

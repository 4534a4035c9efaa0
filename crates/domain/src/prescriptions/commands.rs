use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregate::{PrescriptionItem, PrescriptionType};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum Command {
    /// Open a new prescription in draft
    Create {
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
    },

    /// Add an item while still in draft
    AddItem {
        item: PrescriptionItem,
    },

    /// Pharmacist sign-off on the draft
    Verify {
        user_id: String,
    },

    /// Make the prescription fillable
    Activate,

    /// Record a dispense cycle that leaves outstanding refills
    MarkPartiallyDispensed,

    /// Record the final dispense cycle
    Complete,

    /// Cancel with a reason, any status except completed
    Cancel {
        reason: String,
        user_id: String,
    },

    /// Expiry sweep; no-op on terminal prescriptions
    MarkExpired,

    /// Consume one authorized refill cycle
    ConsumeRefill,
}

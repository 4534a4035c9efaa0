use serde::{Deserialize, Serialize};

use crate::prescriptions::PrescriptionType;

/// Snapshot of one prescribed item taken when the session opens. The
/// session tracks dispensing progress against this copy; the prescription's
/// own items stay immutable.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SessionItem {
    pub drug_id: String,
    pub drug_name: String,
    pub quantity: u32,
    pub is_controlled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum Command {
    /// Open a fill encounter against a dispensable prescription
    StartSession {
        id: String,
        prescription_id: String,
        operator_id: String,
        prescription_type: PrescriptionType,
        refills_remaining: u32,
        items: Vec<SessionItem>,
    },

    /// One barcode scan at the fill station. `operator_id` must match the
    /// operator who opened the session.
    RecordScan {
        operator_id: String,
        barcode: String,
        batch_number: String,
        quantity: u32,
        /// Secondary sign-off that must accompany controlled substances
        controlled_confirmation: bool,
    },

    /// Operator abandons the encounter; the scan log is kept. Only the
    /// owning operator may abort, unless the idle deadline has passed.
    AbortSession {
        operator_id: String,
        reason: String,
    },
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregate::PrescriptionType;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatePrescriptionInput {
    pub store_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub prescription_type: PrescriptionType,
    pub prescription_date: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refills_allowed: u32,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub notes: String,
    pub created_by: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddItemInput {
    pub drug_id: String,
    pub drug_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub quantity: u32,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub is_controlled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyInput {
    pub user_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CancelInput {
    pub reason: String,
    pub user_id: String,
}

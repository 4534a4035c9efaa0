//! Per-scan clinical safety rules.
//!
//! Rules run strictly in order and the first failure wins. Evaluation is
//! pure: catalog and batch lookups happen before the rules run, so a rule
//! outcome is a plain value the session can record and replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::{DrugBatch, ResolvedDrug};

use super::aggregate::ItemProgress;

/// Why a scan was refused. Every refusal is recorded in the session's scan
/// log so a near-miss stays reconstructable for incident review.
#[derive(Error, Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    #[error("barcode does not resolve to a known drug")]
    UnknownBarcode,

    #[error("scanned drug does not match the item expected next")]
    OutOfOrderOrDrugMismatch,

    #[error("batch is missing or expired")]
    ExpiredBatch,

    #[error("quantity is zero or exceeds the remaining prescribed amount")]
    QuantityExceeded,

    #[error("controlled substance requires secondary confirmation")]
    ControlledSubstanceConfirmationRequired,
}

impl BlockReason {
    pub fn code(&self) -> &'static str {
        match self {
            BlockReason::UnknownBarcode => "UNKNOWN_BARCODE",
            BlockReason::OutOfOrderOrDrugMismatch => "OUT_OF_ORDER",
            BlockReason::ExpiredBatch => "EXPIRED_BATCH",
            BlockReason::QuantityExceeded => "QUANTITY_EXCEEDED",
            BlockReason::ControlledSubstanceConfirmationRequired => {
                "CONTROLLED_CONFIRMATION_REQUIRED"
            }
        }
    }
}

/// Evaluates one scan attempt against the item the operator is expected to
/// scan next. `drug` and `batch` are the lookup results for the scanned
/// barcode and batch number; `None` means the lookup found nothing.
pub fn evaluate(
    drug: Option<&ResolvedDrug>,
    expected: &ItemProgress,
    batch: Option<&DrugBatch>,
    quantity: u32,
    controlled_confirmed: bool,
    now: DateTime<Utc>,
) -> Result<(), BlockReason> {
    let drug = drug.ok_or(BlockReason::UnknownBarcode)?;

    if drug.drug_id != expected.drug_id {
        return Err(BlockReason::OutOfOrderOrDrugMismatch);
    }

    let batch = batch.ok_or(BlockReason::ExpiredBatch)?;
    if now > batch.expiry_date {
        return Err(BlockReason::ExpiredBatch);
    }

    if quantity == 0 || quantity > expected.remaining() {
        return Err(BlockReason::QuantityExceeded);
    }

    if expected.is_controlled && !controlled_confirmed {
        return Err(BlockReason::ControlledSubstanceConfirmationRequired);
    }

    Ok(())
}

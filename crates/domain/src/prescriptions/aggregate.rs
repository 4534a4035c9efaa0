use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cqrs_es::Aggregate;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::services::{Clock, SystemClock};

use super::{Command, Event};

/// How long an activated prescription stays fillable when the prescriber
/// did not set an explicit expiry.
pub const DEFAULT_VALIDITY_DAYS: i64 = 30;

/// Prescription lifecycle status
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    /// Intake in progress, items still editable
    Draft,
    /// Pharmacist signed off
    Verified,
    /// Fillable
    Active,
    /// At least one dispense cycle done, refills outstanding
    PartiallyDispensed,
    /// All cycles dispensed
    Completed,
    /// Validity window elapsed
    Expired,
    /// Withdrawn before completion
    Cancelled,
}

impl Default for PrescriptionStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl PrescriptionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PrescriptionStatus::Completed
                | PrescriptionStatus::Expired
                | PrescriptionStatus::Cancelled
        )
    }

    /// Legal lifecycle edges. Everything not listed is rejected.
    pub fn can_transition_to(&self, to: PrescriptionStatus) -> bool {
        use PrescriptionStatus::*;
        matches!(
            (*self, to),
            (Draft, Verified)
                | (Draft, Cancelled)
                | (Verified, Active)
                | (Verified, Cancelled)
                | (Active, PartiallyDispensed)
                | (Active, Completed)
                | (Active, Expired)
                | (Active, Cancelled)
                | (PartiallyDispensed, Completed)
                | (PartiallyDispensed, Expired)
                | (PartiallyDispensed, Cancelled)
        )
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrescriptionStatus::Draft => "DRAFT",
            PrescriptionStatus::Verified => "VERIFIED",
            PrescriptionStatus::Active => "ACTIVE",
            PrescriptionStatus::PartiallyDispensed => "PARTIALLY_DISPENSED",
            PrescriptionStatus::Completed => "COMPLETED",
            PrescriptionStatus::Expired => "EXPIRED",
            PrescriptionStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionType {
    Regular,
    /// Long-running treatment, dispensed over multiple refill visits
    Chronic,
    Emergency,
}

impl Default for PrescriptionType {
    fn default() -> Self {
        Self::Regular
    }
}

/// One prescribed drug line. Immutable once the prescription leaves draft;
/// dispensing progress lives on the session, never here.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct PrescriptionItem {
    pub id: String,
    pub drug_id: String,
    pub drug_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub quantity: u32,
    pub instructions: String,
    pub is_controlled: bool,
}

/// Prescription aggregate
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct Prescription {
    pub id: String,
    pub store_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub status: PrescriptionStatus,
    pub prescription_type: PrescriptionType,
    pub prescription_date: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub items: Vec<PrescriptionItem>,
    pub refills_allowed: u32,
    pub refills_remaining: u32,
    pub diagnosis: String,
    pub notes: String,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

pub const AGGREGATE_TYPE: &str = "Prescription";

#[derive(Clone)]
pub struct Services {
    pub clock: Arc<dyn Clock>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }
}

#[async_trait]
impl Aggregate for Prescription {
    type Command = Command;
    type Event = Event;
    type Error = Error;
    type Services = Services;

    fn aggregate_type() -> String {
        AGGREGATE_TYPE.to_string()
    }

    async fn handle(
        &self,
        command: Self::Command,
        services: &Self::Services,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        let now = services.clock.now();

        match command {
            Command::Create {
                id,
                store_id,
                patient_id,
                doctor_id,
                prescription_type,
                prescription_date,
                expiry_date,
                refills_allowed,
                diagnosis,
                notes,
                created_by,
            } => {
                self.validate_new()?;

                Ok(vec![Event::PrescriptionCreated {
                    id,
                    store_id,
                    patient_id,
                    doctor_id,
                    prescription_type,
                    prescription_date,
                    expiry_date,
                    refills_allowed,
                    diagnosis,
                    notes,
                    created_by,
                    created_at: now,
                }])
            }

            Command::AddItem { item } => {
                self.validate_existing()?;
                if self.status != PrescriptionStatus::Draft {
                    return Err(Error::NotDraft);
                }
                if item.quantity == 0 {
                    return Err(Error::Validation {
                        message: "Item quantity must be positive".to_string(),
                    });
                }

                Ok(vec![Event::ItemAdded {
                    id: self.id.clone(),
                    item,
                    added_at: now,
                }])
            }

            Command::Verify { user_id } => {
                self.validate_existing()?;
                self.assert_can_transition_to(PrescriptionStatus::Verified)?;
                if self.items.is_empty() {
                    return Err(Error::NoItems);
                }

                Ok(vec![Event::PrescriptionVerified {
                    id: self.id.clone(),
                    verified_by: user_id,
                    verified_at: now,
                }])
            }

            Command::Activate => {
                self.validate_existing()?;
                self.assert_can_transition_to(PrescriptionStatus::Active)?;

                let expiry_date = self
                    .expiry_date
                    .unwrap_or(now + Duration::days(DEFAULT_VALIDITY_DAYS));

                Ok(vec![Event::PrescriptionActivated {
                    id: self.id.clone(),
                    expiry_date,
                    activated_at: now,
                }])
            }

            Command::MarkPartiallyDispensed => {
                self.validate_existing()?;
                self.assert_dispensing_status()?;

                Ok(vec![Event::PrescriptionPartiallyDispensed {
                    id: self.id.clone(),
                    dispensed_at: now,
                }])
            }

            Command::Complete => {
                self.validate_existing()?;
                self.assert_dispensing_status()?;

                Ok(vec![Event::PrescriptionCompleted {
                    id: self.id.clone(),
                    completed_at: now,
                }])
            }

            Command::Cancel { reason, user_id } => {
                self.validate_existing()?;
                if self.status == PrescriptionStatus::Completed {
                    return Err(Error::CannotCancelCompleted);
                }
                self.assert_can_transition_to(PrescriptionStatus::Cancelled)?;

                Ok(vec![Event::PrescriptionCancelled {
                    id: self.id.clone(),
                    reason,
                    cancelled_by: user_id,
                    cancelled_at: now,
                }])
            }

            Command::MarkExpired => {
                self.validate_existing()?;
                if self.status.is_terminal() {
                    return Ok(vec![]);
                }
                self.assert_can_transition_to(PrescriptionStatus::Expired)?;

                Ok(vec![Event::PrescriptionExpired {
                    id: self.id.clone(),
                    expired_at: now,
                }])
            }

            Command::ConsumeRefill => {
                self.validate_existing()?;
                if self.refills_remaining == 0 {
                    return Err(Error::NoRefillsRemaining);
                }

                Ok(vec![Event::RefillConsumed {
                    id: self.id.clone(),
                    refills_remaining: self.refills_remaining - 1,
                    consumed_at: now,
                }])
            }
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            Event::PrescriptionCreated {
                id,
                store_id,
                patient_id,
                doctor_id,
                prescription_type,
                prescription_date,
                expiry_date,
                refills_allowed,
                diagnosis,
                notes,
                created_by,
                created_at,
            } => {
                self.id = id;
                self.store_id = store_id;
                self.patient_id = patient_id;
                self.doctor_id = doctor_id;
                self.status = PrescriptionStatus::Draft;
                self.prescription_type = prescription_type;
                self.prescription_date = prescription_date;
                self.expiry_date = expiry_date;
                self.refills_allowed = refills_allowed;
                self.refills_remaining = refills_allowed;
                self.diagnosis = diagnosis;
                self.notes = notes;
                self.created_by = created_by;
                self.created_at = created_at;
            }

            Event::ItemAdded { item, .. } => {
                self.items.push(item);
            }

            Event::PrescriptionVerified {
                verified_by,
                verified_at,
                ..
            } => {
                self.status = PrescriptionStatus::Verified;
                self.verified_by = Some(verified_by);
                self.verified_at = Some(verified_at);
            }

            Event::PrescriptionActivated { expiry_date, .. } => {
                self.status = PrescriptionStatus::Active;
                self.expiry_date = Some(expiry_date);
            }

            Event::PrescriptionPartiallyDispensed { .. } => {
                self.status = PrescriptionStatus::PartiallyDispensed;
            }

            Event::PrescriptionCompleted { .. } => {
                self.status = PrescriptionStatus::Completed;
            }

            Event::PrescriptionCancelled { .. } => {
                self.status = PrescriptionStatus::Cancelled;
            }

            Event::PrescriptionExpired { .. } => {
                self.status = PrescriptionStatus::Expired;
            }

            Event::RefillConsumed {
                refills_remaining, ..
            } => {
                self.refills_remaining = refills_remaining;
            }
        }
    }
}

impl Prescription {
    fn validate_new(&self) -> Result<(), Error> {
        if !self.id.is_empty() {
            return Err(Error::Uniqueness {
                field: "id".to_string(),
            });
        }
        Ok(())
    }

    fn validate_existing(&self) -> Result<(), Error> {
        if self.id.is_empty() {
            return Err(Error::NotFound {
                entity: AGGREGATE_TYPE.to_string(),
            });
        }
        Ok(())
    }

    fn assert_can_transition_to(&self, to: PrescriptionStatus) -> Result<(), Error> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Dispensing transitions accept both ACTIVE and PARTIALLY_DISPENSED so
    /// a multi-visit fill can record each cycle.
    fn assert_dispensing_status(&self) -> Result<(), Error> {
        match self.status {
            PrescriptionStatus::Active | PrescriptionStatus::PartiallyDispensed => Ok(()),
            _ => Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: PrescriptionStatus::Completed.to_string(),
            }),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.map_or(false, |expiry| now > expiry)
    }

    pub fn can_be_dispensed(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now)
            && matches!(
                self.status,
                PrescriptionStatus::Active | PrescriptionStatus::PartiallyDispensed
            )
    }
}

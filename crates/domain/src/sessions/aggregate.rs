use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cqrs_es::Aggregate;
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::prescriptions::PrescriptionType;
use crate::services::{BatchDirectory, Clock, DrugCatalog};

use super::safety::{self, BlockReason};
use super::{Command, Event};

/// A session left idle this long auto-aborts on the next scan attempt, so
/// an abandoned fill screen cannot hold the prescription indefinitely.
pub const IDLE_TIMEOUT_MINUTES: i64 = 15;

pub const IDLE_ABORT_REASON: &str = "idle timeout exceeded";

/// Fill encounter status
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting scans
    InProgress,
    /// Every item satisfied; closed
    Complete,
    /// Abandoned by the operator or the idle timeout; closed
    Aborted,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::InProgress
    }
}

/// Dispensing progress against one prescribed item.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct ItemProgress {
    pub drug_id: String,
    pub drug_name: String,
    pub prescribed_quantity: u32,
    pub dispensed_quantity: u32,
    pub is_controlled: bool,
}

impl ItemProgress {
    pub fn remaining(&self) -> u32 {
        self.prescribed_quantity
            .saturating_sub(self.dispensed_quantity)
    }

    pub fn is_satisfied(&self) -> bool {
        self.dispensed_quantity >= self.prescribed_quantity
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Ok,
    Blocked,
}

/// One entry in the append-only scan log. Blocked scans are kept alongside
/// accepted ones so a near-miss remains reconstructable.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ScanRecord {
    pub barcode: String,
    pub drug_id: Option<String>,
    pub batch_number: String,
    pub quantity: u32,
    pub scanned_at: DateTime<Utc>,
    pub outcome: ScanOutcome,
    pub block_reason: Option<BlockReason>,
}

/// What the completed session means for the prescription.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FillDisposition {
    /// Last outstanding cycle; the prescription completes
    Completed,
    /// Refill visits remain; the prescription stays dispensable
    PartiallyDispensed,
}

/// Dispense session aggregate
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct DispenseSession {
    pub id: String,
    pub prescription_id: String,
    pub status: SessionStatus,
    pub operator_id: String,
    pub prescription_type: PrescriptionType,
    pub refills_remaining_at_start: u32,
    pub items: Vec<ItemProgress>,
    pub scanned_items: Vec<ScanRecord>,
    pub created_at: DateTime<Utc>,
    pub idle_deadline: Option<DateTime<Utc>>,
    /// Set when the session completes
    pub disposition: Option<FillDisposition>,
    pub refill_consumed: bool,
}

pub const AGGREGATE_TYPE: &str = "DispenseSession";

#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn DrugCatalog>,
    pub batches: Arc<dyn BatchDirectory>,
    pub clock: Arc<dyn Clock>,
}

#[async_trait]
impl Aggregate for DispenseSession {
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
            Command::StartSession {
                id,
                prescription_id,
                operator_id,
                prescription_type,
                refills_remaining,
                items,
            } => {
                self.validate_new()?;
                if items.is_empty() {
                    return Err(Error::Validation {
                        message: "Cannot open a session without items".to_string(),
                    });
                }

                Ok(vec![Event::SessionStarted {
                    id,
                    prescription_id,
                    operator_id,
                    prescription_type,
                    refills_remaining,
                    items,
                    started_at: now,
                    idle_deadline: now + Duration::minutes(IDLE_TIMEOUT_MINUTES),
                }])
            }

            Command::RecordScan {
                operator_id,
                barcode,
                batch_number,
                quantity,
                controlled_confirmation,
            } => {
                self.validate_existing()?;
                if self.status != SessionStatus::InProgress {
                    return Err(Error::SessionClosed);
                }
                // The idle deadline ends the operator's claim, so anyone's
                // scan may sweep an abandoned session.
                if self.idle_deadline.map_or(false, |deadline| now > deadline) {
                    return Ok(vec![Event::SessionAborted {
                        id: self.id.clone(),
                        reason: IDLE_ABORT_REASON.to_string(),
                        aborted_at: now,
                    }]);
                }
                if operator_id != self.operator_id {
                    return Err(Error::NotSessionOperator);
                }

                let expected = self.expected_item().ok_or(Error::SessionClosed)?;

                let drug = services.catalog.resolve_by_barcode(&barcode).await?;
                let batch = match &drug {
                    Some(drug) => {
                        services
                            .batches
                            .get_batch(&drug.drug_id, &batch_number)
                            .await?
                    }
                    None => None,
                };

                match safety::evaluate(
                    drug.as_ref(),
                    expected,
                    batch.as_ref(),
                    quantity,
                    controlled_confirmation,
                    now,
                ) {
                    Err(reason) => Ok(vec![Event::ScanBlocked {
                        id: self.id.clone(),
                        drug_id: drug.map(|drug| drug.drug_id),
                        barcode,
                        batch_number,
                        quantity,
                        reason,
                        scanned_at: now,
                    }]),

                    Ok(()) => {
                        let drug_id = expected.drug_id.clone();
                        let mut events = vec![Event::ScanAccepted {
                            id: self.id.clone(),
                            drug_id: drug_id.clone(),
                            barcode,
                            batch_number,
                            quantity,
                            scanned_at: now,
                        }];

                        let all_satisfied = self.items.iter().all(|item| {
                            let dispensed = if item.drug_id == drug_id {
                                item.dispensed_quantity + quantity
                            } else {
                                item.dispensed_quantity
                            };
                            dispensed >= item.prescribed_quantity
                        });

                        if all_satisfied {
                            let (disposition, refill_consumed) = self.fill_disposition();
                            events.push(Event::SessionCompleted {
                                id: self.id.clone(),
                                disposition,
                                refill_consumed,
                                completed_at: now,
                            });
                        }

                        Ok(events)
                    }
                }
            }

            Command::AbortSession { operator_id, reason } => {
                self.validate_existing()?;
                if self.status != SessionStatus::InProgress {
                    return Err(Error::SessionClosed);
                }
                let idle_expired = self.idle_deadline.map_or(false, |deadline| now > deadline);
                if operator_id != self.operator_id && !idle_expired {
                    return Err(Error::NotSessionOperator);
                }

                Ok(vec![Event::SessionAborted {
                    id: self.id.clone(),
                    reason,
                    aborted_at: now,
                }])
            }
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            Event::SessionStarted {
                id,
                prescription_id,
                operator_id,
                prescription_type,
                refills_remaining,
                items,
                started_at,
                idle_deadline,
            } => {
                self.id = id;
                self.prescription_id = prescription_id;
                self.operator_id = operator_id;
                self.prescription_type = prescription_type;
                self.refills_remaining_at_start = refills_remaining;
                self.items = items
                    .into_iter()
                    .map(|item| ItemProgress {
                        drug_id: item.drug_id,
                        drug_name: item.drug_name,
                        prescribed_quantity: item.quantity,
                        dispensed_quantity: 0,
                        is_controlled: item.is_controlled,
                    })
                    .collect();
                self.status = SessionStatus::InProgress;
                self.created_at = started_at;
                self.idle_deadline = Some(idle_deadline);
            }

            Event::ScanAccepted {
                drug_id,
                barcode,
                batch_number,
                quantity,
                scanned_at,
                ..
            } => {
                if let Some(item) = self.items.iter_mut().find(|item| item.drug_id == drug_id) {
                    item.dispensed_quantity += quantity;
                }
                self.scanned_items.push(ScanRecord {
                    barcode,
                    drug_id: Some(drug_id),
                    batch_number,
                    quantity,
                    scanned_at,
                    outcome: ScanOutcome::Ok,
                    block_reason: None,
                });
                self.idle_deadline = Some(scanned_at + Duration::minutes(IDLE_TIMEOUT_MINUTES));
            }

            Event::ScanBlocked {
                drug_id,
                barcode,
                batch_number,
                quantity,
                reason,
                scanned_at,
                ..
            } => {
                self.scanned_items.push(ScanRecord {
                    barcode,
                    drug_id,
                    batch_number,
                    quantity,
                    scanned_at,
                    outcome: ScanOutcome::Blocked,
                    block_reason: Some(reason),
                });
                self.idle_deadline = Some(scanned_at + Duration::minutes(IDLE_TIMEOUT_MINUTES));
            }

            Event::SessionCompleted {
                disposition,
                refill_consumed,
                ..
            } => {
                self.status = SessionStatus::Complete;
                self.disposition = Some(disposition);
                self.refill_consumed = refill_consumed;
                self.idle_deadline = None;
            }

            Event::SessionAborted { .. } => {
                self.status = SessionStatus::Aborted;
                self.idle_deadline = None;
            }
        }
    }
}

impl DispenseSession {
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

    /// The item the operator must scan next: first prescribed item with
    /// outstanding quantity, in prescription order.
    pub fn expected_item(&self) -> Option<&ItemProgress> {
        self.items.iter().find(|item| !item.is_satisfied())
    }

    /// Index form of [`expected_item`](Self::expected_item), for display.
    pub fn current_item_pointer(&self) -> Option<usize> {
        self.items.iter().position(|item| !item.is_satisfied())
    }

    /// A chronic prescription consumes one refill per completed session and
    /// only finishes when no refills remain afterwards.
    fn fill_disposition(&self) -> (FillDisposition, bool) {
        match self.prescription_type {
            PrescriptionType::Chronic if self.refills_remaining_at_start > 1 => {
                (FillDisposition::PartiallyDispensed, true)
            }
            PrescriptionType::Chronic if self.refills_remaining_at_start == 1 => {
                (FillDisposition::Completed, true)
            }
            _ => (FillDisposition::Completed, false),
        }
    }

    pub fn last_scan(&self) -> Option<&ScanRecord> {
        self.scanned_items.last()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use cqrs_es::test::TestFramework;

    use crate::services::{DrugBatch, FixedClock, ResolvedDrug};
    use crate::sessions::commands::SessionItem;

    use super::*;

    type SessionTestFramework = TestFramework<DispenseSession>;

    struct StubCatalog(HashMap<String, ResolvedDrug>);

    #[async_trait]
    impl DrugCatalog for StubCatalog {
        async fn resolve_by_barcode(&self, barcode: &str) -> Result<Option<ResolvedDrug>, Error> {
            Ok(self.0.get(barcode).cloned())
        }
    }

    struct StubBatches(HashMap<(String, String), DrugBatch>);

    #[async_trait]
    impl BatchDirectory for StubBatches {
        async fn get_batch(
            &self,
            drug_id: &str,
            batch_number: &str,
        ) -> Result<Option<DrugBatch>, Error> {
            Ok(self
                .0
                .get(&(drug_id.to_string(), batch_number.to_string()))
                .cloned())
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    fn services_at(instant: DateTime<Utc>) -> Services {
        let mut drugs = HashMap::new();
        drugs.insert(
            "BC-D1".to_string(),
            ResolvedDrug {
                drug_id: "D1".to_string(),
                name: "Amoxicillin".to_string(),
            },
        );
        drugs.insert(
            "BC-D2".to_string(),
            ResolvedDrug {
                drug_id: "D2".to_string(),
                name: "Codeine".to_string(),
            },
        );

        let mut batches = HashMap::new();
        batches.insert(
            ("D1".to_string(), "B1".to_string()),
            DrugBatch {
                batch_number: "B1".to_string(),
                expiry_date: now() + Duration::days(180),
                quantity_available: 500,
            },
        );
        batches.insert(
            ("D2".to_string(), "B2".to_string()),
            DrugBatch {
                batch_number: "B2".to_string(),
                expiry_date: now() + Duration::days(180),
                quantity_available: 200,
            },
        );
        batches.insert(
            ("D2".to_string(), "BEXP".to_string()),
            DrugBatch {
                batch_number: "BEXP".to_string(),
                expiry_date: now() - Duration::days(1),
                quantity_available: 200,
            },
        );

        Services {
            catalog: Arc::new(StubCatalog(drugs)),
            batches: Arc::new(StubBatches(batches)),
            clock: Arc::new(FixedClock(instant)),
        }
    }

    fn services() -> Services {
        services_at(now())
    }

    fn started(items: Vec<SessionItem>) -> Event {
        started_with_refills(items, PrescriptionType::Regular, 0)
    }

    fn started_with_refills(
        items: Vec<SessionItem>,
        prescription_type: PrescriptionType,
        refills_remaining: u32,
    ) -> Event {
        Event::SessionStarted {
            id: "sess-1".to_string(),
            prescription_id: "rx-1".to_string(),
            operator_id: "op-1".to_string(),
            prescription_type,
            refills_remaining,
            items,
            started_at: now(),
            idle_deadline: now() + Duration::minutes(IDLE_TIMEOUT_MINUTES),
        }
    }

    fn session_item(drug_id: &str, quantity: u32, is_controlled: bool) -> SessionItem {
        SessionItem {
            drug_id: drug_id.to_string(),
            drug_name: format!("Drug {drug_id}"),
            quantity,
            is_controlled,
        }
    }

    fn accepted(drug_id: &str, barcode: &str, batch: &str, quantity: u32) -> Event {
        Event::ScanAccepted {
            id: "sess-1".to_string(),
            drug_id: drug_id.to_string(),
            barcode: barcode.to_string(),
            batch_number: batch.to_string(),
            quantity,
            scanned_at: now(),
        }
    }

    fn scan(barcode: &str, batch: &str, quantity: u32) -> Command {
        scan_by("op-1", barcode, batch, quantity)
    }

    fn scan_by(operator_id: &str, barcode: &str, batch: &str, quantity: u32) -> Command {
        Command::RecordScan {
            operator_id: operator_id.to_string(),
            barcode: barcode.to_string(),
            batch_number: batch.to_string(),
            quantity,
            controlled_confirmation: false,
        }
    }

    #[test]
    fn valid_scan_is_accepted() {
        SessionTestFramework::with(services())
            .given(vec![started(vec![
                session_item("D1", 21, false),
                session_item("D2", 10, false),
            ])])
            .when(scan("BC-D1", "B1", 21))
            .then_expect_events(vec![accepted("D1", "BC-D1", "B1", 21)]);
    }

    #[test]
    fn scan_of_wrong_drug_is_blocked() {
        // D1 satisfied, pointer on D2; rescanning D1 must block.
        SessionTestFramework::with(services())
            .given(vec![
                started(vec![
                    session_item("D1", 21, false),
                    session_item("D2", 10, false),
                ]),
                accepted("D1", "BC-D1", "B1", 21),
            ])
            .when(scan("BC-D1", "B1", 1))
            .then_expect_events(vec![Event::ScanBlocked {
                id: "sess-1".to_string(),
                drug_id: Some("D1".to_string()),
                barcode: "BC-D1".to_string(),
                batch_number: "B1".to_string(),
                quantity: 1,
                reason: BlockReason::OutOfOrderOrDrugMismatch,
                scanned_at: now(),
            }]);
    }

    #[test]
    fn unknown_barcode_is_blocked() {
        SessionTestFramework::with(services())
            .given(vec![started(vec![session_item("D1", 21, false)])])
            .when(scan("BC-UNKNOWN", "B1", 21))
            .then_expect_events(vec![Event::ScanBlocked {
                id: "sess-1".to_string(),
                drug_id: None,
                barcode: "BC-UNKNOWN".to_string(),
                batch_number: "B1".to_string(),
                quantity: 21,
                reason: BlockReason::UnknownBarcode,
                scanned_at: now(),
            }]);
    }

    #[test]
    fn expired_batch_is_blocked() {
        SessionTestFramework::with(services())
            .given(vec![started(vec![session_item("D2", 10, false)])])
            .when(scan("BC-D2", "BEXP", 10))
            .then_expect_events(vec![Event::ScanBlocked {
                id: "sess-1".to_string(),
                drug_id: Some("D2".to_string()),
                barcode: "BC-D2".to_string(),
                batch_number: "BEXP".to_string(),
                quantity: 10,
                reason: BlockReason::ExpiredBatch,
                scanned_at: now(),
            }]);
    }

    #[test]
    fn quantity_over_remaining_is_blocked() {
        SessionTestFramework::with(services())
            .given(vec![
                started(vec![session_item("D1", 10, false)]),
                accepted("D1", "BC-D1", "B1", 6),
            ])
            .when(scan("BC-D1", "B1", 5))
            .then_expect_events(vec![Event::ScanBlocked {
                id: "sess-1".to_string(),
                drug_id: Some("D1".to_string()),
                barcode: "BC-D1".to_string(),
                batch_number: "B1".to_string(),
                quantity: 5,
                reason: BlockReason::QuantityExceeded,
                scanned_at: now(),
            }]);
    }

    #[test]
    fn controlled_substance_needs_confirmation() {
        SessionTestFramework::with(services())
            .given(vec![started(vec![session_item("D2", 10, true)])])
            .when(scan("BC-D2", "B2", 10))
            .then_expect_events(vec![Event::ScanBlocked {
                id: "sess-1".to_string(),
                drug_id: Some("D2".to_string()),
                barcode: "BC-D2".to_string(),
                batch_number: "B2".to_string(),
                quantity: 10,
                reason: BlockReason::ControlledSubstanceConfirmationRequired,
                scanned_at: now(),
            }]);
    }

    #[test]
    fn controlled_substance_with_confirmation_is_accepted() {
        SessionTestFramework::with(services())
            .given(vec![started(vec![session_item("D2", 10, true)])])
            .when(Command::RecordScan {
                operator_id: "op-1".to_string(),
                barcode: "BC-D2".to_string(),
                batch_number: "B2".to_string(),
                quantity: 10,
                controlled_confirmation: true,
            })
            .then_expect_events(vec![
                accepted("D2", "BC-D2", "B2", 10),
                Event::SessionCompleted {
                    id: "sess-1".to_string(),
                    disposition: FillDisposition::Completed,
                    refill_consumed: false,
                    completed_at: now(),
                },
            ]);
    }

    #[test]
    fn final_scan_completes_the_session() {
        SessionTestFramework::with(services())
            .given(vec![
                started(vec![
                    session_item("D1", 21, false),
                    session_item("D2", 10, false),
                ]),
                accepted("D1", "BC-D1", "B1", 21),
            ])
            .when(scan("BC-D2", "B2", 10))
            .then_expect_events(vec![
                accepted("D2", "BC-D2", "B2", 10),
                Event::SessionCompleted {
                    id: "sess-1".to_string(),
                    disposition: FillDisposition::Completed,
                    refill_consumed: false,
                    completed_at: now(),
                },
            ]);
    }

    #[test]
    fn chronic_with_refills_remaining_completes_partially() {
        SessionTestFramework::with(services())
            .given(vec![started_with_refills(
                vec![session_item("D1", 10, false)],
                PrescriptionType::Chronic,
                2,
            )])
            .when(scan("BC-D1", "B1", 10))
            .then_expect_events(vec![
                accepted("D1", "BC-D1", "B1", 10),
                Event::SessionCompleted {
                    id: "sess-1".to_string(),
                    disposition: FillDisposition::PartiallyDispensed,
                    refill_consumed: true,
                    completed_at: now(),
                },
            ]);
    }

    #[test]
    fn chronic_on_last_refill_completes_fully() {
        SessionTestFramework::with(services())
            .given(vec![started_with_refills(
                vec![session_item("D1", 10, false)],
                PrescriptionType::Chronic,
                1,
            )])
            .when(scan("BC-D1", "B1", 10))
            .then_expect_events(vec![
                accepted("D1", "BC-D1", "B1", 10),
                Event::SessionCompleted {
                    id: "sess-1".to_string(),
                    disposition: FillDisposition::Completed,
                    refill_consumed: true,
                    completed_at: now(),
                },
            ]);
    }

    #[test]
    fn scans_after_completion_are_rejected() {
        SessionTestFramework::with(services())
            .given(vec![
                started(vec![session_item("D1", 10, false)]),
                accepted("D1", "BC-D1", "B1", 10),
                Event::SessionCompleted {
                    id: "sess-1".to_string(),
                    disposition: FillDisposition::Completed,
                    refill_consumed: false,
                    completed_at: now(),
                },
            ])
            .when(scan("BC-D1", "B1", 1))
            .then_expect_error_message("Session is no longer accepting scans");
    }

    #[test]
    fn scan_by_another_operator_is_rejected() {
        SessionTestFramework::with(services())
            .given(vec![started(vec![session_item("D1", 21, false)])])
            .when(scan_by("op-2", "BC-D1", "B1", 21))
            .then_expect_error_message("Session is owned by another operator");
    }

    #[test]
    fn abort_by_another_operator_is_rejected() {
        SessionTestFramework::with(services())
            .given(vec![started(vec![session_item("D1", 21, false)])])
            .when(Command::AbortSession {
                operator_id: "op-2".to_string(),
                reason: "not mine".to_string(),
            })
            .then_expect_error_message("Session is owned by another operator");
    }

    #[test]
    fn anyone_may_abort_past_the_idle_deadline() {
        let late = now() + Duration::minutes(IDLE_TIMEOUT_MINUTES + 1);
        SessionTestFramework::with(services_at(late))
            .given(vec![started(vec![session_item("D1", 21, false)])])
            .when(Command::AbortSession {
                operator_id: "op-2".to_string(),
                reason: "sweeping abandoned session".to_string(),
            })
            .then_expect_events(vec![Event::SessionAborted {
                id: "sess-1".to_string(),
                reason: "sweeping abandoned session".to_string(),
                aborted_at: late,
            }]);
    }

    #[test]
    fn abort_preserves_scan_log() {
        let mut session = DispenseSession::default();
        session.apply(started(vec![session_item("D1", 21, false)]));
        session.apply(Event::ScanBlocked {
            id: "sess-1".to_string(),
            drug_id: None,
            barcode: "BC-UNKNOWN".to_string(),
            batch_number: "B1".to_string(),
            quantity: 21,
            reason: BlockReason::UnknownBarcode,
            scanned_at: now(),
        });
        session.apply(Event::SessionAborted {
            id: "sess-1".to_string(),
            reason: "patient left".to_string(),
            aborted_at: now(),
        });

        assert_eq!(session.status, SessionStatus::Aborted);
        assert_eq!(session.scanned_items.len(), 1);
        assert_eq!(
            session.scanned_items[0].block_reason,
            Some(BlockReason::UnknownBarcode)
        );
    }

    #[test]
    fn idle_session_aborts_instead_of_scanning() {
        let late = now() + Duration::minutes(IDLE_TIMEOUT_MINUTES + 1);
        SessionTestFramework::with(services_at(late))
            .given(vec![started(vec![session_item("D1", 21, false)])])
            .when(scan("BC-D1", "B1", 21))
            .then_expect_events(vec![Event::SessionAborted {
                id: "sess-1".to_string(),
                reason: IDLE_ABORT_REASON.to_string(),
                aborted_at: late,
            }]);
    }

    #[test]
    fn pointer_advances_only_on_accepted_scans() {
        let mut session = DispenseSession::default();
        session.apply(started(vec![
            session_item("D1", 21, false),
            session_item("D2", 10, false),
        ]));
        assert_eq!(session.current_item_pointer(), Some(0));

        session.apply(Event::ScanBlocked {
            id: "sess-1".to_string(),
            drug_id: Some("D2".to_string()),
            barcode: "BC-D2".to_string(),
            batch_number: "B2".to_string(),
            quantity: 10,
            reason: BlockReason::OutOfOrderOrDrugMismatch,
            scanned_at: now(),
        });
        assert_eq!(session.current_item_pointer(), Some(0));

        session.apply(accepted("D1", "BC-D1", "B1", 21));
        assert_eq!(session.current_item_pointer(), Some(1));

        session.apply(accepted("D2", "BC-D2", "B2", 10));
        assert_eq!(session.current_item_pointer(), None);
    }
}

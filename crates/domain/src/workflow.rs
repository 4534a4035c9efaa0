//! Cross-aggregate orchestration for the dispensing pipeline.
//!
//! Command handling stays inside the aggregates; this seam does what a
//! station client cannot: it loads the read model, checks preconditions
//! that span aggregates, and drives the consequences of one aggregate's
//! events into another (session completion into the prescription, and
//! activation into the fulfillment queue).

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use cqrs_es::{
    mem_store::MemStore,
    persist::{PersistenceError, ViewRepository},
    AggregateError, CqrsFramework, EventStore,
};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::errors::Error;
use crate::memory::InMemoryViewRepository;
use crate::prescriptions::{
    self,
    inputs::{AddItemInput, CreatePrescriptionInput},
    Prescription, PrescriptionItem, PrescriptionType,
};
use crate::publisher::{EventPublisher, PublisherQuery};
use crate::queue::{self, Board, BoardQuery, Priority, QueueEntry, Stage};
use crate::services::{BatchDirectory, Clock, DrugCatalog};
use crate::sessions::{
    self, BlockReason, DispenseSession, FillDisposition, ScanRecord, SessionItem, SessionStatus,
};

/// One barcode scan as submitted from a fill station. The operator must be
/// the one who opened the session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanInput {
    pub operator_id: String,
    pub barcode: String,
    pub batch_number: String,
    pub quantity: u32,
    #[serde(default)]
    pub controlled_confirmation: bool,
}

/// Outcome of a scan as surfaced to the operator. A block is reported here
/// rather than as a command failure: the attempt was recorded for audit
/// either way.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanReport {
    pub session_status: SessionStatus,
    /// The scan record just appended; absent when an idle session aborted
    /// instead of recording the scan.
    pub record: Option<ScanRecord>,
    pub block: Option<BlockReason>,
}

impl ScanReport {
    pub fn is_blocked(&self) -> bool {
        self.block.is_some()
    }
}

pub struct DispenseWorkflow<PS, SS, QS>
where
    PS: EventStore<Prescription>,
    SS: EventStore<DispenseSession>,
    QS: EventStore<QueueEntry>,
{
    prescriptions: Arc<CqrsFramework<Prescription, PS>>,
    prescription_views: Arc<Box<dyn ViewRepository<prescriptions::View, Prescription>>>,
    sessions: Arc<CqrsFramework<DispenseSession, SS>>,
    session_views: Arc<Box<dyn ViewRepository<sessions::View, DispenseSession>>>,
    queue: Arc<CqrsFramework<QueueEntry, QS>>,
    queue_views: Arc<Box<dyn ViewRepository<queue::View, QueueEntry>>>,
    clock: Arc<dyn Clock>,
    /// Prescription id to open session id. One session holds a prescription
    /// until it completes, aborts, or goes idle past its deadline.
    open_sessions: RwLock<HashMap<String, String>>,
}

/// Workflow wired to in-memory stores, for tests and the demo API.
pub type MemoryWorkflow =
    DispenseWorkflow<MemStore<Prescription>, MemStore<DispenseSession>, MemStore<QueueEntry>>;

impl<PS, SS, QS> DispenseWorkflow<PS, SS, QS>
where
    PS: EventStore<Prescription>,
    SS: EventStore<DispenseSession>,
    QS: EventStore<QueueEntry>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prescriptions: Arc<CqrsFramework<Prescription, PS>>,
        prescription_views: Arc<Box<dyn ViewRepository<prescriptions::View, Prescription>>>,
        sessions: Arc<CqrsFramework<DispenseSession, SS>>,
        session_views: Arc<Box<dyn ViewRepository<sessions::View, DispenseSession>>>,
        queue: Arc<CqrsFramework<QueueEntry, QS>>,
        queue_views: Arc<Box<dyn ViewRepository<queue::View, QueueEntry>>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prescriptions,
            prescription_views,
            sessions,
            session_views,
            queue,
            queue_views,
            clock,
            open_sessions: RwLock::new(HashMap::new()),
        }
    }

    // ---- prescription lifecycle ----

    pub async fn create_prescription(
        &self,
        input: CreatePrescriptionInput,
    ) -> Result<String, Error> {
        let prescription_id = Ulid::new().to_string();

        let command = prescriptions::Command::Create {
            id: prescription_id.clone(),
            store_id: input.store_id,
            patient_id: input.patient_id,
            doctor_id: input.doctor_id,
            prescription_type: input.prescription_type,
            prescription_date: input.prescription_date,
            expiry_date: input.expiry_date,
            refills_allowed: input.refills_allowed,
            diagnosis: input.diagnosis,
            notes: input.notes,
            created_by: input.created_by,
        };

        self.prescriptions
            .execute_with_metadata(&prescription_id, command, metadata())
            .await
            .map_err(into_domain)?;

        Ok(prescription_id)
    }

    pub async fn add_item(&self, prescription_id: &str, input: AddItemInput) -> Result<(), Error> {
        let item = PrescriptionItem {
            id: Ulid::new().to_string(),
            drug_id: input.drug_id,
            drug_name: input.drug_name,
            dosage: input.dosage,
            frequency: input.frequency,
            duration: input.duration,
            quantity: input.quantity,
            instructions: input.instructions,
            is_controlled: input.is_controlled,
        };

        self.prescriptions
            .execute_with_metadata(
                prescription_id,
                prescriptions::Command::AddItem { item },
                metadata(),
            )
            .await
            .map_err(into_domain)
    }

    pub async fn verify(&self, prescription_id: &str, user_id: &str) -> Result<(), Error> {
        self.prescriptions
            .execute_with_metadata(
                prescription_id,
                prescriptions::Command::Verify {
                    user_id: user_id.to_string(),
                },
                metadata(),
            )
            .await
            .map_err(into_domain)
    }

    /// Activates the prescription and enters it into the fulfillment queue
    /// at NEW. Emergency prescriptions are queued at high priority.
    pub async fn activate(&self, prescription_id: &str) -> Result<(), Error> {
        self.prescriptions
            .execute_with_metadata(prescription_id, prescriptions::Command::Activate, metadata())
            .await
            .map_err(into_domain)?;

        let prescription = self.prescription(prescription_id).await?;
        let priority = match prescription.prescription_type {
            PrescriptionType::Emergency => Priority::High,
            _ => Priority::Normal,
        };

        self.queue
            .execute_with_metadata(
                prescription_id,
                queue::Command::Enqueue {
                    id: prescription_id.to_string(),
                    prescription_id: prescription_id.to_string(),
                    priority,
                },
                metadata(),
            )
            .await
            .map_err(into_domain)
    }

    pub async fn cancel(
        &self,
        prescription_id: &str,
        reason: &str,
        user_id: &str,
    ) -> Result<(), Error> {
        self.prescriptions
            .execute_with_metadata(
                prescription_id,
                prescriptions::Command::Cancel {
                    reason: reason.to_string(),
                    user_id: user_id.to_string(),
                },
                metadata(),
            )
            .await
            .map_err(into_domain)
    }

    /// Expiry sweep entry point; safe to call on terminal prescriptions.
    pub async fn mark_expired(&self, prescription_id: &str) -> Result<(), Error> {
        self.prescriptions
            .execute_with_metadata(
                prescription_id,
                prescriptions::Command::MarkExpired,
                metadata(),
            )
            .await
            .map_err(into_domain)
    }

    pub async fn prescription(&self, prescription_id: &str) -> Result<Prescription, Error> {
        let view = self
            .prescription_views
            .load(prescription_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| Error::NotFound {
                entity: prescriptions::AGGREGATE_TYPE.to_string(),
            })?;
        Ok(view.prescription)
    }

    // ---- dispense sessions ----

    /// Opens a fill encounter. The prescription must be dispensable right
    /// now and not already held by an open session; the item snapshot taken
    /// here is what the session scans against.
    pub async fn start_session(
        &self,
        prescription_id: &str,
        operator_id: &str,
    ) -> Result<String, Error> {
        let prescription = self.prescription(prescription_id).await?;
        let now = self.clock.now();

        if prescription.is_expired(now) {
            return Err(Error::PrescriptionExpired);
        }
        if !prescription.can_be_dispensed(now) {
            return Err(Error::NotDispensable);
        }

        let held_by = {
            let open = self.open_sessions.read().map_err(|_| registry_poisoned())?;
            open.get(prescription_id).cloned()
        };
        if let Some(existing_id) = held_by {
            if let Ok(existing) = self.session(&existing_id).await {
                if existing.status == SessionStatus::InProgress {
                    let idle_expired = existing
                        .idle_deadline
                        .map_or(false, |deadline| now > deadline);
                    if !idle_expired {
                        return Err(Error::SessionInProgress);
                    }
                    // Idle sessions lose their hold; sweep before reopening.
                    self.sessions
                        .execute_with_metadata(
                            &existing_id,
                            sessions::Command::AbortSession {
                                operator_id: existing.operator_id.clone(),
                                reason: sessions::IDLE_ABORT_REASON.to_string(),
                            },
                            metadata(),
                        )
                        .await
                        .map_err(into_domain)?;
                }
            }
        }

        let items = prescription
            .items
            .iter()
            .map(|item| SessionItem {
                drug_id: item.drug_id.clone(),
                drug_name: item.drug_name.clone(),
                quantity: item.quantity,
                is_controlled: item.is_controlled,
            })
            .collect();

        let session_id = Ulid::new().to_string();
        let command = sessions::Command::StartSession {
            id: session_id.clone(),
            prescription_id: prescription.id.clone(),
            operator_id: operator_id.to_string(),
            prescription_type: prescription.prescription_type,
            refills_remaining: prescription.refills_remaining,
            items,
        };

        self.sessions
            .execute_with_metadata(&session_id, command, metadata())
            .await
            .map_err(into_domain)?;

        let mut open = self.open_sessions.write().map_err(|_| registry_poisoned())?;
        open.insert(prescription_id.to_string(), session_id.clone());

        Ok(session_id)
    }

    /// Records one scan and, when that scan completes the session, drives
    /// the prescription's dispensing transition (consuming a refill first
    /// for chronic multi-visit fills).
    pub async fn record_scan(
        &self,
        session_id: &str,
        input: ScanInput,
    ) -> Result<ScanReport, Error> {
        let command = sessions::Command::RecordScan {
            operator_id: input.operator_id,
            barcode: input.barcode,
            batch_number: input.batch_number,
            quantity: input.quantity,
            controlled_confirmation: input.controlled_confirmation,
        };

        self.sessions
            .execute_with_metadata(session_id, command, metadata())
            .await
            .map_err(into_domain)?;

        let session = self.session(session_id).await?;
        if session.status != SessionStatus::InProgress {
            self.release_session(&session.prescription_id)?;
        }

        if session.status == SessionStatus::Complete {
            if session.refill_consumed {
                self.prescriptions
                    .execute_with_metadata(
                        &session.prescription_id,
                        prescriptions::Command::ConsumeRefill,
                        metadata(),
                    )
                    .await
                    .map_err(into_domain)?;
            }

            let transition = match session.disposition {
                Some(FillDisposition::PartiallyDispensed) => {
                    prescriptions::Command::MarkPartiallyDispensed
                }
                _ => prescriptions::Command::Complete,
            };
            self.prescriptions
                .execute_with_metadata(&session.prescription_id, transition, metadata())
                .await
                .map_err(into_domain)?;
        }

        let record = match session.status {
            SessionStatus::Aborted => None,
            _ => session.last_scan().cloned(),
        };
        let block = record.as_ref().and_then(|record| record.block_reason);

        Ok(ScanReport {
            session_status: session.status,
            record,
            block,
        })
    }

    pub async fn abort_session(
        &self,
        session_id: &str,
        operator_id: &str,
        reason: &str,
    ) -> Result<(), Error> {
        self.sessions
            .execute_with_metadata(
                session_id,
                sessions::Command::AbortSession {
                    operator_id: operator_id.to_string(),
                    reason: reason.to_string(),
                },
                metadata(),
            )
            .await
            .map_err(into_domain)?;

        let session = self.session(session_id).await?;
        self.release_session(&session.prescription_id)
    }

    pub async fn session(&self, session_id: &str) -> Result<DispenseSession, Error> {
        let view = self
            .session_views
            .load(session_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| Error::NotFound {
                entity: sessions::AGGREGATE_TYPE.to_string(),
            })?;
        Ok(view.session)
    }

    fn release_session(&self, prescription_id: &str) -> Result<(), Error> {
        let mut open = self.open_sessions.write().map_err(|_| registry_poisoned())?;
        open.remove(prescription_id);
        Ok(())
    }

    // ---- fulfillment queue ----

    /// Requests a stage move and returns the entry's new version. A write
    /// race with a concurrent mover surfaces as a stale stage: the loser
    /// refreshes and retries against the winner's stage.
    pub async fn request_move(
        &self,
        prescription_id: &str,
        from: Stage,
        to: Stage,
    ) -> Result<u64, Error> {
        let result = self
            .queue
            .execute_with_metadata(
                prescription_id,
                queue::Command::RequestMove { from, to },
                metadata(),
            )
            .await;

        if let Err(err) = result {
            if matches!(err, AggregateError::AggregateConflict) {
                let actual = match self.queue_entry(prescription_id).await {
                    Ok(entry) => entry.stage.to_string(),
                    Err(_) => from.to_string(),
                };
                return Err(Error::StaleStage {
                    expected: from.to_string(),
                    actual,
                });
            }
            return Err(into_domain(err));
        }

        let entry = self.queue_entry(prescription_id).await?;
        Ok(entry.version)
    }

    pub async fn assign(&self, prescription_id: &str, user_id: &str) -> Result<(), Error> {
        self.queue
            .execute_with_metadata(
                prescription_id,
                queue::Command::Assign {
                    user_id: user_id.to_string(),
                },
                metadata(),
            )
            .await
            .map_err(into_domain)
    }

    pub async fn queue_entry(&self, prescription_id: &str) -> Result<QueueEntry, Error> {
        let view = self
            .queue_views
            .load(prescription_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| Error::NotFound {
                entity: queue::AGGREGATE_TYPE.to_string(),
            })?;
        Ok(view.entry)
    }
}

impl MemoryWorkflow {
    /// Wires the three aggregates over in-memory event stores and view
    /// repositories, registering the view projections, the board, and the
    /// event relay on each framework.
    pub fn in_memory(
        catalog: Arc<dyn DrugCatalog>,
        batches: Arc<dyn BatchDirectory>,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn EventPublisher>,
        board: Arc<Board>,
    ) -> Self {
        let prescription_views: Arc<Box<dyn ViewRepository<prescriptions::View, Prescription>>> =
            Arc::new(Box::new(InMemoryViewRepository::new()));
        let prescriptions_cqrs = Arc::new(CqrsFramework::new(
            MemStore::default(),
            vec![
                Box::new(prescriptions::Query::new(prescription_views.clone())),
                Box::new(PublisherQuery::new(publisher.clone())),
            ],
            prescriptions::Services {
                clock: clock.clone(),
            },
        ));

        let session_views: Arc<Box<dyn ViewRepository<sessions::View, DispenseSession>>> =
            Arc::new(Box::new(InMemoryViewRepository::new()));
        let sessions_cqrs = Arc::new(CqrsFramework::new(
            MemStore::default(),
            vec![
                Box::new(sessions::Query::new(session_views.clone())),
                Box::new(PublisherQuery::new(publisher.clone())),
            ],
            sessions::Services {
                catalog,
                batches,
                clock: clock.clone(),
            },
        ));

        let queue_views: Arc<Box<dyn ViewRepository<queue::View, QueueEntry>>> =
            Arc::new(Box::new(InMemoryViewRepository::new()));
        let queue_cqrs = Arc::new(CqrsFramework::new(
            MemStore::default(),
            vec![
                Box::new(queue::Query::new(queue_views.clone())),
                Box::new(BoardQuery::new(board)),
                Box::new(PublisherQuery::new(publisher)),
            ],
            queue::Services {
                clock: clock.clone(),
            },
        ));

        Self::new(
            prescriptions_cqrs,
            prescription_views,
            sessions_cqrs,
            session_views,
            queue_cqrs,
            queue_views,
            clock,
        )
    }
}

fn metadata() -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("command_id".to_string(), Ulid::new().to_string());
    metadata
}

fn into_domain(err: AggregateError<Error>) -> Error {
    match err {
        AggregateError::UserError(err) => err,
        AggregateError::AggregateConflict => Error::Persistence {
            message: "concurrent modification, refresh and retry".to_string(),
        },
        other => Error::Persistence {
            message: other.to_string(),
        },
    }
}

fn persistence(err: PersistenceError) -> Error {
    Error::Persistence {
        message: err.to_string(),
    }
}

fn registry_poisoned() -> Error {
    Error::Persistence {
        message: "session registry lock poisoned".to_string(),
    }
}

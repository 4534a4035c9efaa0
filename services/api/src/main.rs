use std::{collections::HashMap, fs, path::Path as FsPath, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use domain::errors::Error;
use domain::event::DomainEvent;
use domain::prescriptions::inputs::{AddItemInput, CancelInput, CreatePrescriptionInput, VerifyInput};
use domain::publisher::EventPublisher;
use domain::queue::{Board, Stage};
use domain::services::{BatchDirectory, DrugBatch, DrugCatalog, ResolvedDrug, SystemClock};
use domain::workflow::{MemoryWorkflow, ScanInput};

#[derive(Clone)]
struct AppState {
    workflow: Arc<MemoryWorkflow>,
    board: Arc<Board>,
}

/// Catalog and batch stock loaded from a JSON file at startup. Stands in
/// for the inventory service the core treats as a collaborator.
#[derive(Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    drugs: Vec<CatalogDrug>,
    #[serde(default)]
    batches: Vec<CatalogBatch>,
}

#[derive(Deserialize)]
struct CatalogDrug {
    barcode: String,
    drug_id: String,
    name: String,
}

#[derive(Deserialize)]
struct CatalogBatch {
    drug_id: String,
    batch_number: String,
    expiry_date: chrono::DateTime<chrono::Utc>,
    quantity_available: u32,
}

struct FileCatalog {
    drugs: HashMap<String, ResolvedDrug>,
    batches: HashMap<(String, String), DrugBatch>,
}

impl FileCatalog {
    fn load(path: &str) -> Self {
        let file: CatalogFile = if FsPath::new(path).exists() {
            match fs::read_to_string(path).map_err(anyhow::Error::from).and_then(|raw| {
                serde_json::from_str(&raw).map_err(anyhow::Error::from)
            }) {
                Ok(file) => file,
                Err(err) => {
                    tracing::warn!("Failed to load catalog {}: {}", path, err);
                    CatalogFile::default()
                }
            }
        } else {
            tracing::warn!("Catalog file {} not found, starting empty", path);
            CatalogFile::default()
        };

        let drugs = file
            .drugs
            .into_iter()
            .map(|drug| {
                (
                    drug.barcode,
                    ResolvedDrug {
                        drug_id: drug.drug_id,
                        name: drug.name,
                    },
                )
            })
            .collect();
        let batches = file
            .batches
            .into_iter()
            .map(|batch| {
                (
                    (batch.drug_id, batch.batch_number.clone()),
                    DrugBatch {
                        batch_number: batch.batch_number,
                        expiry_date: batch.expiry_date,
                        quantity_available: batch.quantity_available,
                    },
                )
            })
            .collect();

        Self { drugs, batches }
    }
}

#[async_trait]
impl DrugCatalog for FileCatalog {
    async fn resolve_by_barcode(&self, barcode: &str) -> Result<Option<ResolvedDrug>, Error> {
        Ok(self.drugs.get(barcode).cloned())
    }
}

#[async_trait]
impl BatchDirectory for FileCatalog {
    async fn get_batch(
        &self,
        drug_id: &str,
        batch_number: &str,
    ) -> Result<Option<DrugBatch>, Error> {
        Ok(self
            .batches
            .get(&(drug_id.to_string(), batch_number.to_string()))
            .cloned())
    }
}

/// Logs committed events; a deployment replaces this with a stream or bus
/// publisher.
struct LoggingPublisher;

#[async_trait]
impl EventPublisher for LoggingPublisher {
    async fn publish(&self, event: DomainEvent) {
        tracing::info!("Publishing {} for {}", event.event_type, event.id);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let catalog_path =
        std::env::var("CATALOG_PATH").unwrap_or_else(|_| "catalog.json".to_string());
    let catalog = Arc::new(FileCatalog::load(&catalog_path));

    let board = Arc::new(Board::new());
    let workflow = Arc::new(MemoryWorkflow::in_memory(
        catalog.clone(),
        catalog,
        Arc::new(SystemClock),
        Arc::new(LoggingPublisher),
        board.clone(),
    ));

    let state = AppState { workflow, board };

    let app = Router::new()
        .route("/prescriptions", post(create_prescription))
        .route("/prescriptions/:id", get(get_prescription))
        .route("/prescriptions/:id/items", post(add_item))
        .route("/prescriptions/:id/verify", post(verify_prescription))
        .route("/prescriptions/:id/activate", post(activate_prescription))
        .route("/prescriptions/:id/cancel", post(cancel_prescription))
        .route("/prescriptions/:id/expire", post(expire_prescription))
        .route("/sessions", post(start_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/scans", post(record_scan))
        .route("/sessions/:id/abort", post(abort_session))
        .route("/queue/stages/:stage", get(list_stage))
        .route("/queue/:id/move", post(move_stage))
        .route("/queue/:id/assign", post(assign_entry))
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Uniqueness { .. }
            | Error::InvalidTransition { .. }
            | Error::CannotCancelCompleted
            | Error::StaleStage { .. }
            | Error::SafetyBlock(_)
            | Error::SessionClosed
            | Error::NotSessionOperator
            | Error::SessionInProgress => StatusCode::CONFLICT,
            Error::NoItems
            | Error::NotDraft
            | Error::NoRefillsRemaining
            | Error::NotDispensable
            | Error::PrescriptionExpired
            | Error::InvalidStageTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "code": self.0.code(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

// Create prescription
async fn create_prescription(
    State(state): State<AppState>,
    Json(input): Json<CreatePrescriptionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.workflow.create_prescription(input).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

// Get prescription
async fn get_prescription(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let prescription = state.workflow.prescription(&id).await?;
    Ok(Json(prescription))
}

// Add item
async fn add_item(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(input): Json<AddItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.add_item(&id, input).await?;
    Ok((StatusCode::OK, "Item added"))
}

// Verify prescription
async fn verify_prescription(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(input): Json<VerifyInput>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.verify(&id, &input.user_id).await?;
    Ok((StatusCode::OK, "Prescription verified"))
}

// Activate prescription and enter the fulfillment queue
async fn activate_prescription(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.activate(&id).await?;
    Ok((StatusCode::OK, "Prescription activated"))
}

// Cancel prescription
async fn cancel_prescription(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(input): Json<CancelInput>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .workflow
        .cancel(&id, &input.reason, &input.user_id)
        .await?;
    Ok((StatusCode::OK, "Prescription cancelled"))
}

// Expiry sweep
async fn expire_prescription(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.mark_expired(&id).await?;
    Ok((StatusCode::OK, "Expiry recorded"))
}

#[derive(Deserialize)]
struct StartSessionInput {
    prescription_id: String,
    operator_id: String,
}

// Open a dispense session
async fn start_session(
    State(state): State<AppState>,
    Json(input): Json<StartSessionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = state
        .workflow
        .start_session(&input.prescription_id, &input.operator_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "session_id": session_id })),
    ))
}

// Get session (scan log included)
async fn get_session(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.workflow.session(&id).await?;
    Ok(Json(session))
}

// Record a scan
async fn record_scan(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(input): Json<ScanInput>,
) -> Result<Response, ApiError> {
    let report = state.workflow.record_scan(&id, input).await?;

    if let Some(reason) = report.block {
        let err = Error::SafetyBlock(reason);
        let body = serde_json::json!({
            "code": err.code(),
            "message": err.to_string(),
            "report": report,
        });
        return Ok((StatusCode::CONFLICT, Json(body)).into_response());
    }

    Ok(Json(report).into_response())
}

#[derive(Deserialize)]
struct AbortInput {
    operator_id: String,
    reason: String,
}

// Abort a session
async fn abort_session(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(input): Json<AbortInput>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .workflow
        .abort_session(&id, &input.operator_id, &input.reason)
        .await?;
    Ok((StatusCode::OK, "Session aborted"))
}

// List board cards at a stage
async fn list_stage(
    Path(stage): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let stage: Stage = stage.parse()?;
    Ok(Json(state.board.list_by_stage(stage)))
}

#[derive(Deserialize)]
struct MoveInput {
    from: Stage,
    to: Stage,
}

#[derive(Serialize)]
struct MoveResult {
    version: u64,
}

// Move a queue entry between stages
async fn move_stage(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(input): Json<MoveInput>,
) -> Result<impl IntoResponse, ApiError> {
    let version = state
        .workflow
        .request_move(&id, input.from, input.to)
        .await?;
    Ok(Json(MoveResult { version }))
}

#[derive(Deserialize)]
struct AssignInput {
    user_id: String,
}

// Assign a queue entry to a staff member
async fn assign_entry(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(input): Json<AssignInput>,
) -> Result<impl IntoResponse, ApiError> {
    state.workflow.assign(&id, &input.user_id).await?;
    Ok((StatusCode::OK, "Entry assigned"))
}

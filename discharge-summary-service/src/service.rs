use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use graph_flow::{FlowRunner, GraphError, InMemorySessionStorage, Session, SessionStorage};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    config::{Config, ConfigError},
    generator::PatientGenerator,
    models::{
        ManualEntry, PatientRecord, SessionResponse, SummaryEditRequest, UploadQuery,
    },
    summary::{MistralClient, SummaryGenerator},
    tasks::{
        DocumentRenderTask, LoadRecordTask, RecordSource, SummaryRequestTask, SummaryReviewTask,
        session_keys,
    },
    workflow::{build_discharge_workflow, create_discharge_session, create_flow_runner, task_id},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

/// Maps a failed workflow step to a response. Bad input keeps the session as it was.
fn workflow_error(session_id: &str, action: &str, e: GraphError) -> ApiError {
    match e {
        GraphError::InvalidInput(message) => {
            warn!(session_id = %session_id, error = %message, "{} rejected", action);
            bad_request_error(&message)
        }
        GraphError::SessionNotFound(_) => not_found_error("Session not found", session_id),
        other => {
            error!(session_id = %session_id, error = %other, "{} failed", action);
            internal_error(&format!("{} failed", action), &other.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub flow_runner: FlowRunner,
}

impl AppState {
    /// In-memory sessions over the discharge workflow.
    pub fn new(
        patient_generator: PatientGenerator,
        summary_generator: Arc<dyn SummaryGenerator>,
    ) -> Self {
        let session_storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let graph = build_discharge_workflow(patient_generator, summary_generator);
        let flow_runner = create_flow_runner(graph, session_storage.clone());

        Self {
            session_storage,
            flow_runner,
        }
    }
}

pub fn create_app(config: &Config) -> Result<Router, ConfigError> {
    let patient_generator = PatientGenerator::new(config.load_vocabulary()?)?;
    let summary_generator = Arc::new(MistralClient::new(
        config.mistral_api_url.clone(),
        config.mistral_api_key.clone(),
        config.mistral_model.clone(),
    ));

    Ok(build_router(AppState::new(
        patient_generator,
        summary_generator,
    )))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/{session_id}", get(get_session).delete(end_session))
        .route(
            "/sessions/{session_id}/record/synthetic",
            post(generate_synthetic_record),
        )
        .route("/sessions/{session_id}/record", put(replace_record))
        .route("/sessions/{session_id}/record/upload", post(upload_record))
        .route("/sessions/{session_id}/record/manual", post(enter_manual_record))
        .route(
            "/sessions/{session_id}/summary",
            post(request_summary).put(edit_summary),
        )
        .route("/sessions/{session_id}/document", get(download_document))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Discharge Summary Service",
        "version": "0.1.0",
        "description": "Synthetic patient records, AI-drafted discharge summaries with physician review, PDF export",
        "endpoints": {
            "POST /sessions": "Start a session with a synthetic patient",
            "GET /sessions/{session_id}": "Preview the record and summary",
            "DELETE /sessions/{session_id}": "End the session and drop its data",
            "POST /sessions/{session_id}/record/synthetic": "Replace the record with a new synthetic patient",
            "PUT /sessions/{session_id}/record": "Replace the record from a JSON body",
            "POST /sessions/{session_id}/record/upload?format=json|csv": "Replace the record from an uploaded file",
            "POST /sessions/{session_id}/record/manual": "Replace the record from manual entry",
            "POST /sessions/{session_id}/summary": "Generate the discharge summary",
            "PUT /sessions/{session_id}/summary": "Replace the summary with edited text",
            "GET /sessions/{session_id}/document": "Download the discharge summary PDF",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_session(State(state): State<AppState>) -> ApiResult<SessionResponse> {
    let session = create_discharge_session().await.map_err(|e| {
        error!(error = %e, "Failed to create session");
        internal_error("Failed to create session", &e.to_string())
    })?;
    let session_id = session.id.clone();

    state.session_storage.save(session).await.map_err(|e| {
        error!(session_id = %session_id, error = %e, "Failed to save new session");
        internal_error("Failed to create session", &e.to_string())
    })?;
    info!(session_id = %session_id, "Session created");

    state
        .flow_runner
        .run(&session_id)
        .await
        .map_err(|e| workflow_error(&session_id, "Loading the patient record", e))?;

    preview(&state, &session_id).await
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    preview(&state, &session_id).await
}

async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    load_session(&state, &session_id).await?;
    state.session_storage.delete(&session_id).await.map_err(|e| {
        error!(session_id = %session_id, error = %e, "Failed to delete session");
        internal_error("Failed to delete session", &e.to_string())
    })?;
    info!(session_id = %session_id, "Session ended");

    Ok(StatusCode::NO_CONTENT)
}

async fn generate_synthetic_record(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    load_record(&state, &session_id, RecordSource::Synthetic).await
}

async fn replace_record(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(record): Json<PatientRecord>,
) -> ApiResult<SessionResponse> {
    load_record(&state, &session_id, RecordSource::Record { record }).await
}

async fn upload_record(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<SessionResponse> {
    let body = String::from_utf8(body.to_vec())
        .map_err(|_| bad_request_error("Uploaded file must be UTF-8 text"))?;

    load_record(
        &state,
        &session_id,
        RecordSource::Upload {
            format: query.format,
            body,
        },
    )
    .await
}

async fn enter_manual_record(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(entry): Json<ManualEntry>,
) -> ApiResult<SessionResponse> {
    load_record(&state, &session_id, RecordSource::Manual { entry }).await
}

async fn request_summary(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    load_session(&state, &session_id).await?;

    state
        .flow_runner
        .run_from(&session_id, task_id::<SummaryRequestTask>())
        .await
        .map_err(|e| workflow_error(&session_id, "Summary generation", e))?;

    preview(&state, &session_id).await
}

async fn edit_summary(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SummaryEditRequest>,
) -> ApiResult<SessionResponse> {
    let session = load_session(&state, &session_id).await?;
    store_input(&state, session, session_keys::SUMMARY_EDIT, &request.summary).await?;

    state
        .flow_runner
        .run_from(&session_id, task_id::<SummaryReviewTask>())
        .await
        .map_err(|e| workflow_error(&session_id, "Summary edit", e))?;

    preview(&state, &session_id).await
}

async fn download_document(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    state
        .flow_runner
        .run_from(&session_id, task_id::<DocumentRenderTask>())
        .await
        .map_err(|e| workflow_error(&session_id, "PDF generation", e))?;

    let session = load_session(&state, &session_id).await?;

    let encoded: String = session
        .context
        .get(session_keys::DOCUMENT_PDF)
        .await
        .ok_or_else(|| internal_error("PDF generation failed", "No document was produced"))?;
    let filename: String = session
        .context
        .get(session_keys::DOCUMENT_FILENAME)
        .await
        .unwrap_or_else(|| "discharge_summary.pdf".to_string());
    let pdf = STANDARD.decode(encoded).map_err(|e| {
        error!(session_id = %session_id, error = %e, "Stored document is not valid base64");
        internal_error("PDF generation failed", &e.to_string())
    })?;

    info!(session_id = %session_id, filename = %filename, "Serving discharge summary PDF");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        pdf,
    )
        .into_response())
}

/// Queues `source` on the session and runs the record loader.
async fn load_record(
    state: &AppState,
    session_id: &str,
    source: RecordSource,
) -> ApiResult<SessionResponse> {
    let session = load_session(state, session_id).await?;
    info!(session_id = %session_id, source = source.label(), "Replacing patient record");
    store_input(state, session, session_keys::RECORD_SOURCE, &source).await?;

    state
        .flow_runner
        .run_from(session_id, task_id::<LoadRecordTask>())
        .await
        .map_err(|e| workflow_error(session_id, "Loading the patient record", e))?;

    preview(state, session_id).await
}

async fn load_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to load session");
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

/// Puts the input for the next step into the session context and saves the session.
async fn store_input(
    state: &AppState,
    session: Session,
    key: &str,
    value: impl serde::Serialize,
) -> Result<(), ApiError> {
    session
        .context
        .set(key, value)
        .await
        .map_err(|e| internal_error("Failed to update session", &e.to_string()))?;

    let session_id = session.id.clone();
    state.session_storage.save(session).await.map_err(|e| {
        error!(session_id = %session_id, error = %e, "Failed to save session input");
        internal_error("Failed to update session", &e.to_string())
    })
}

async fn preview(state: &AppState, session_id: &str) -> ApiResult<SessionResponse> {
    let session = load_session(state, session_id).await?;
    Ok(Json(build_session_response(&session)))
}

fn build_session_response(session: &Session) -> SessionResponse {
    let record: Option<PatientRecord> = session.context.get_sync(session_keys::PATIENT_RECORD);
    let length_of_stay_stale = record
        .as_ref()
        .is_some_and(|r| r.admission_info.is_length_of_stay_stale());

    SessionResponse {
        session_id: session.id.clone(),
        current_task: short_task_name(&session.current_task_id).to_string(),
        status_message: session.status_message.clone(),
        record,
        length_of_stay_stale,
        summary: session.context.get_sync(session_keys::DISCHARGE_SUMMARY),
        summary_is_fallback: session
            .context
            .get_sync(session_keys::SUMMARY_IS_FALLBACK)
            .unwrap_or(false),
    }
}

/// `discharge_summary_service::tasks::load_record::LoadRecordTask` -> `LoadRecordTask`
fn short_task_name(task_id: &str) -> &str {
    task_id.rsplit("::").next().unwrap_or(task_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_task_name_strips_module_path() {
        assert_eq!(short_task_name(task_id::<LoadRecordTask>()), "LoadRecordTask");
        assert_eq!(short_task_name("Plain"), "Plain");
    }

    #[test]
    fn invalid_input_maps_to_bad_request() {
        let (status, body) = workflow_error(
            "abc",
            "Loading the patient record",
            GraphError::InvalidInput("Invalid CSV".to_string()),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["error"], "Invalid CSV");
    }

    #[test]
    fn task_failure_maps_to_internal_error() {
        let (status, _) = workflow_error(
            "abc",
            "PDF generation",
            GraphError::TaskExecutionFailed("font".to_string()),
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}

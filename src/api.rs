//! REST API Server for the trip planner
//!
//! Exposes generation, chat, review and regeneration over HTTP for the
//! planning UI. Every error leaves as an `ApiResponse` with a user-facing
//! message.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::calendar::google_calendar_link;
use crate::error::PlannerError;
use crate::models::{ChatMessage, TripPlan, UserPreferences};
use crate::planner::TripPlanner;
use crate::state::{self, TripLocks, TripRecord, TripStore};

const CHAT_FAILURE_TEXT: &str = "I encountered an error processing that.";
const REGENERATED_TEXT: &str = "I've replaced the rejected events with new options.";

/// =============================
/// Request / View Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripView {
    pub trip_id: Uuid,
    pub plan: TripPlan,
    pub messages: Vec<ChatMessage>,
}

impl From<TripRecord> for TripView {
    fn from(record: TripRecord) -> Self {
        Self {
            trip_id: record.trip_id,
            plan: record.plan,
            messages: record.messages,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_plan: Option<TripPlan>,
    pub plan: TripPlan,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn not_found(message: &str) -> ApiResult {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error(message.to_string())))
}

pub fn status_for(err: &PlannerError) -> StatusCode {
    match err {
        PlannerError::InvalidPreferences(_) => StatusCode::BAD_REQUEST,
        PlannerError::SessionNotInitialized(_) => StatusCode::NOT_FOUND,
        PlannerError::Transport(_)
        | PlannerError::Http(_)
        | PlannerError::EmptyResponse(_)
        | PlannerError::Parse(_)
        | PlannerError::InvalidPlan(_)
        | PlannerError::NoToolInvocation(_) => StatusCode::BAD_GATEWAY,
        PlannerError::Configuration(_) | PlannerError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn failure(context: &str, err: PlannerError) -> ApiResult {
    error!("{} failed: {}", context, err);
    (status_for(&err), Json(ApiResponse::error(err.user_message())))
}

/// =============================
/// API State
/// =============================

/// Handlers that rewrite a trip's plan hold that trip's lock from load to save.
#[derive(Clone)]
pub struct ApiState {
    pub planner: Arc<TripPlanner>,
    pub store: Arc<dyn TripStore>,
    pub locks: Arc<TripLocks>,
}

impl ApiState {
    pub fn new(planner: Arc<TripPlanner>, store: Arc<dyn TripStore>) -> Self {
        Self {
            planner,
            store,
            locks: Arc::new(TripLocks::new()),
        }
    }

    async fn record(&self, trip_id: Uuid) -> Result<TripRecord, ApiResult> {
        match self.store.load(trip_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(not_found("Trip not found. Please generate a new trip.")),
            Err(e) => Err(failure("Loading trip", e)),
        }
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Trip Lifecycle
/// =============================

async fn create_trip(
    State(state): State<ApiState>,
    Json(prefs): Json<UserPreferences>,
) -> ApiResult {
    info!("Received trip request for {}", prefs.destination);

    let generated = match state.planner.generate_trip(&prefs).await {
        Ok(generated) => generated,
        Err(e) => return failure("Trip generation", e),
    };

    let mut record = TripRecord::new(generated.trip_id, prefs.clone(), generated.plan);
    record.messages.push(ChatMessage::model(format!(
        "I've created a trip to {} for you! You can ask me to modify details or just chat about the location.",
        prefs.destination.trim()
    )));

    if let Err(e) = state.store.insert(record.clone()).await {
        state.planner.end_session(generated.trip_id).await;
        return failure("Storing trip", e);
    }

    ok(TripView::from(record))
}

async fn get_trip(State(state): State<ApiState>, Path(trip_id): Path<Uuid>) -> ApiResult {
    match state.record(trip_id).await {
        Ok(record) => ok(TripView::from(record)),
        Err(response) => response,
    }
}

async fn delete_trip(State(state): State<ApiState>, Path(trip_id): Path<Uuid>) -> ApiResult {
    let _guard = state.locks.acquire(trip_id).await;
    state.locks.forget(trip_id).await;

    let had_session = state.planner.end_session(trip_id).await;
    let had_record = match state.store.remove(trip_id).await {
        Ok(removed) => removed,
        Err(e) => return failure("Deleting trip", e),
    };

    if !had_session && !had_record {
        return not_found("Trip not found.");
    }

    info!(%trip_id, "Trip discarded");
    ok(serde_json::json!({ "tripId": trip_id, "deleted": true }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Path(trip_id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> ApiResult {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message cannot be empty".into())),
        );
    }

    let _guard = state.locks.acquire(trip_id).await;
    let record = match state.record(trip_id).await {
        Ok(record) => record,
        Err(response) => return response,
    };

    match state
        .planner
        .send_chat_message(trip_id, &message, &record.plan)
        .await
    {
        Ok(reply) => {
            let mut plan = record.plan;
            let model_message = if let Some(updated) = &reply.updated_plan {
                match state.store.replace_plan(trip_id, updated.clone()).await {
                    Ok(saved) => plan = saved.plan,
                    Err(e) => return failure("Saving updated plan", e),
                }
                ChatMessage::tool_output(reply.text.clone())
            } else {
                ChatMessage::model(reply.text.clone())
            };

            if let Err(e) = state
                .store
                .append_messages(trip_id, vec![ChatMessage::user(message), model_message])
                .await
            {
                return failure("Saving chat transcript", e);
            }

            ok(ChatView {
                text: reply.text,
                updated_plan: reply.updated_plan,
                plan,
            })
        }
        Err(e) => {
            if let Err(store_err) = state
                .store
                .append_messages(
                    trip_id,
                    vec![ChatMessage::user(message), ChatMessage::model(CHAT_FAILURE_TEXT)],
                )
                .await
            {
                warn!(%trip_id, "Could not record failed chat turn: {}", store_err);
            }
            failure("Chat", e)
        }
    }
}

/// =============================
/// Event Review
/// =============================

async fn set_event_status(
    state: ApiState,
    trip_id: Uuid,
    event_id: String,
    reducer: fn(&TripPlan, &str) -> TripPlan,
) -> ApiResult {
    let _guard = state.locks.acquire(trip_id).await;
    let record = match state.record(trip_id).await {
        Ok(record) => record,
        Err(response) => return response,
    };

    let next = reducer(&record.plan, &event_id);
    match state.store.replace_plan(trip_id, next).await {
        Ok(saved) => ok(TripView::from(saved)),
        Err(e) => failure("Updating event status", e),
    }
}

async fn reject_event(
    State(state): State<ApiState>,
    Path((trip_id, event_id)): Path<(Uuid, String)>,
) -> ApiResult {
    info!(%trip_id, %event_id, "Event rejected");
    set_event_status(state, trip_id, event_id, state::reject_event).await
}

async fn restore_event(
    State(state): State<ApiState>,
    Path((trip_id, event_id)): Path<(Uuid, String)>,
) -> ApiResult {
    info!(%trip_id, %event_id, "Event restored");
    set_event_status(state, trip_id, event_id, state::restore_event).await
}

async fn regenerate(State(state): State<ApiState>, Path(trip_id): Path<Uuid>) -> ApiResult {
    let _guard = state.locks.acquire(trip_id).await;
    let record = match state.record(trip_id).await {
        Ok(record) => record,
        Err(response) => return response,
    };

    if state::rejected_event_ids(&record.plan).is_empty() {
        return ok(TripView::from(record));
    }

    let plan = match state.planner.regenerate_rejected(trip_id, &record.plan).await {
        Ok(plan) => plan,
        Err(e) => return failure("Regeneration", e),
    };

    if let Err(e) = state.store.replace_plan(trip_id, plan).await {
        return failure("Saving regenerated plan", e);
    }
    if let Err(e) = state
        .store
        .append_messages(trip_id, vec![ChatMessage::model(REGENERATED_TEXT)])
        .await
    {
        return failure("Saving chat transcript", e);
    }

    match state.record(trip_id).await {
        Ok(record) => ok(TripView::from(record)),
        Err(response) => response,
    }
}

async fn calendar_link(
    State(state): State<ApiState>,
    Path((trip_id, event_id)): Path<(Uuid, String)>,
) -> ApiResult {
    let record = match state.record(trip_id).await {
        Ok(record) => record,
        Err(response) => return response,
    };

    let link = record.plan.find_event(&event_id).and_then(|event| {
        let date = record.plan.event_date(&event_id)?;
        google_calendar_link(event, date)
    });

    match link {
        Some(url) => ok(serde_json::json!({ "url": url })),
        None => not_found("No calendar entry available for this event."),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/trips", post(create_trip))
        .route("/api/trips/:trip_id", get(get_trip).delete(delete_trip))
        .route("/api/trips/:trip_id/chat", post(chat_handler))
        .route("/api/trips/:trip_id/regenerate", post(regenerate))
        .route("/api/trips/:trip_id/events/:event_id/reject", post(reject_event))
        .route("/api/trips/:trip_id/events/:event_id/restore", post(restore_event))
        .route("/api/trips/:trip_id/events/:event_id/calendar", get(calendar_link))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

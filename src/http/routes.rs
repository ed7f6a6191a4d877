//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{
    DeathReport, EventOutcome, IntentRejected, MatchEvent, MatchHandle, MatchPhase,
    MatchSnapshot, ScoreEvent, SubmitError, TeamId, WinningTeam,
};
use crate::game::player::ControllerKind;
use crate::http::middleware::{require_signed_intent, SIGNATURE_HEADER};
use crate::session::{HostError, SessionSummary};
use crate::util::time::uptime_secs;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Any origin when none is configured
    let allow_origin = if state.config.client_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .client_origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SIGNATURE_HEADER)]);

    // Read-only routes
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/:id", get(session_handler))
        .route("/sessions/:id/scoreboard", get(scoreboard_handler));

    // Intents (signature required)
    let signed_routes = Router::new()
        .route("/sessions", post(host_session_handler))
        .route("/sessions/:id/start", post(start_handler))
        .route("/sessions/:id/participants", post(join_handler))
        .route("/sessions/:id/participants/:pid", delete(leave_handler))
        .route(
            "/sessions/:id/participants/:pid/respawn",
            post(respawn_handler),
        )
        .route("/sessions/:id/deaths", post(death_handler))
        .route("/sessions/:id/scores", post(score_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_signed_intent,
        ));

    Router::new()
        .merge(public_routes)
        .merge(signed_routes)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn session(state: &AppState, id: &Uuid) -> Result<MatchHandle, AppError> {
    state
        .registry
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Session {id}")))
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_sessions: usize,
    active_humans: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_sessions: state.registry.active_sessions(),
        active_humans: state.registry.total_humans(),
    })
}

// ============================================================================
// Session endpoints
// ============================================================================

async fn list_sessions_handler(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.summaries())
}

#[derive(Deserialize)]
struct HostSessionRequest {
    /// Connect-options string, server defaults when empty
    #[serde(default)]
    options: String,
}

#[derive(Serialize)]
struct HostSessionResponse {
    session: SessionSummary,
    /// Effective options, re-encoded
    options: String,
}

async fn host_session_handler(
    State(state): State<AppState>,
    Json(req): Json<HostSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.sessions.host_session(&req.options)?;

    let session = state
        .registry
        .summary(&handle.id)
        .ok_or_else(|| AppError::Internal("Session vanished after hosting".to_string()))?;
    let options = handle.snapshot().settings.encode();

    Ok((
        StatusCode::CREATED,
        Json(HostSessionResponse { session, options }),
    ))
}

async fn session_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSnapshot>, AppError> {
    let handle = session(&state, &id)?;
    Ok(Json(handle.snapshot().as_ref().clone()))
}

#[derive(Serialize)]
struct ScoreboardResponse {
    phase: MatchPhase,
    formatted_time: String,
    winning_team: WinningTeam,
    teams: Vec<TeamBoard>,
}

#[derive(Serialize)]
struct TeamBoard {
    team: TeamId,
    score: i32,
    color: String,
    darker_color: String,
    players: Vec<ScoreboardRow>,
}

#[derive(Serialize)]
struct ScoreboardRow {
    name: String,
    kills: u32,
    deaths: u32,
    bot: bool,
}

async fn scoreboard_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScoreboardResponse>, AppError> {
    let snapshot = session(&state, &id)?.snapshot();

    let teams = snapshot
        .teams
        .iter()
        .map(|t| TeamBoard {
            team: t.team,
            score: t.score,
            color: t.color.clone(),
            darker_color: t.darker_color.clone(),
            players: snapshot
                .scoreboard(t.team)
                .into_iter()
                .map(|p| ScoreboardRow {
                    name: p.name.clone(),
                    kills: p.kills,
                    deaths: p.deaths,
                    bot: p.kind == ControllerKind::Ai,
                })
                .collect(),
        })
        .collect();

    Ok(Json(ScoreboardResponse {
        phase: snapshot.phase,
        formatted_time: snapshot.formatted_time.clone(),
        winning_team: snapshot.winning_team,
        teams,
    }))
}

// ============================================================================
// Intent endpoints
// ============================================================================

async fn submit(
    state: &AppState,
    id: &Uuid,
    event: MatchEvent,
) -> Result<Json<EventOutcome>, AppError> {
    let handle = session(state, id)?;
    Ok(Json(handle.submit(event).await?))
}

async fn start_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventOutcome>, AppError> {
    submit(&state, &id, MatchEvent::Start).await
}

#[derive(Deserialize)]
struct JoinRequest {
    /// Generated when absent
    #[serde(default)]
    participant: Option<Uuid>,
    #[serde(default)]
    options: String,
}

async fn join_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<EventOutcome>, AppError> {
    let event = MatchEvent::Join {
        participant: req.participant.unwrap_or_else(Uuid::new_v4),
        options: req.options,
    };
    submit(&state, &id, event).await
}

async fn leave_handler(
    State(state): State<AppState>,
    Path((id, participant)): Path<(Uuid, Uuid)>,
) -> Result<Json<EventOutcome>, AppError> {
    submit(&state, &id, MatchEvent::Leave { participant }).await
}

async fn respawn_handler(
    State(state): State<AppState>,
    Path((id, participant)): Path<(Uuid, Uuid)>,
) -> Result<Json<EventOutcome>, AppError> {
    submit(&state, &id, MatchEvent::Respawn { participant }).await
}

async fn death_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(report): Json<DeathReport>,
) -> Result<Json<EventOutcome>, AppError> {
    submit(&state, &id, MatchEvent::Death(report)).await
}

async fn score_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(event): Json<ScoreEvent>,
) -> Result<Json<EventOutcome>, AppError> {
    submit(&state, &id, MatchEvent::Score(event)).await
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        let message = err.to_string();
        match err {
            SubmitError::Rejected(IntentRejected::UnknownParticipant(_)) => {
                AppError::NotFound(message)
            }
            SubmitError::Rejected(_) => AppError::Conflict(message),
            SubmitError::RateLimited => AppError::TooManyRequests(message),
            SubmitError::Closed => AppError::Gone(message),
        }
    }
}

impl From<HostError> for AppError {
    fn from(err: HostError) -> Self {
        let message = err.to_string();
        match err {
            HostError::Setup(_) => AppError::BadRequest(message),
            HostError::RateLimited => AppError::TooManyRequests(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            AppError::Gone(msg) => (StatusCode::GONE, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

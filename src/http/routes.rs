//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{
    team::RobotIdError, HalfTimeChoice, MatchView, Phase, PlacementPattern,
    RefereeError, RefereeEvent, RobotCommand, RobotId, TeamColor,
};
use crate::http::middleware::require_operator;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Upper bound on an operator command round-trip through the controller
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.client_origin.as_deref());

    // Public routes (no operator token required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/api/state", get(state_handler))
        .route("/api/events", get(events_handler))
        .route("/control", post(control_handler));

    // Operator routes
    let operator_routes = Router::new()
        .route("/api/game/start", post(start_handler))
        .route("/api/game/pause", post(pause_handler))
        .route("/api/game/resume", post(resume_handler))
        .route("/api/game/stop", post(stop_handler))
        .route("/api/game/reset", post(reset_handler))
        .route("/api/sides/swap", post(swap_sides_handler))
        .route("/api/penalties", post(add_penalty_handler))
        .route("/api/penalties/cancel", post(cancel_penalty_handler))
        .route("/api/score", post(score_handler))
        .route("/api/score/reset", post(reset_score_handler))
        .route("/api/goal", post(report_goal_handler))
        .route("/api/goal/validate", post(validate_goal_handler))
        .route("/api/halftime/start", post(start_half_time_handler))
        .route("/api/halftime/advance", post(advance_half_time_handler))
        .route("/api/halftime/abort", post(abort_half_time_handler))
        .route("/api/teams/:team/name", post(team_name_handler))
        .route("/api/teams/:team/key", post(team_key_handler))
        .route("/api/teams/:team/allow-control", post(allow_control_handler))
        .route("/api/place", post(place_handler))
        .route("/api/emergency", post(emergency_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_operator))
        .layer(TimeoutLayer::new(COMMAND_TIMEOUT));

    Router::new()
        .merge(public_routes)
        .merge(operator_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

/// CORS for the configured origins (comma-separated), or any origin when unset
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed_origins)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health and read endpoints
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    match_id: Uuid,
    phase: Phase,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let published = state.referee.published();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        match_id: published.match_id(),
        phase: published.view.phase,
    })
}

async fn state_handler(State(state): State<AppState>) -> Json<MatchView> {
    Json(state.referee.snapshot())
}

#[derive(Deserialize)]
struct EventsQuery {
    since: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    match_id: Uuid,
    events: Vec<RefereeEvent>,
}

async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let published = state.referee.published();

    Json(EventsResponse {
        match_id: published.match_id(),
        events: published.events_since(query.since).to_vec(),
    })
}

// ============================================================================
// Match flow endpoints
// ============================================================================

/// Current view once a command has been applied
fn current_view(state: &AppState) -> Json<MatchView> {
    Json(state.referee.snapshot())
}

async fn start_handler(State(state): State<AppState>) -> Result<Json<MatchView>, AppError> {
    state.referee.start_game().await?;
    Ok(current_view(&state))
}

async fn pause_handler(State(state): State<AppState>) -> Result<Json<MatchView>, AppError> {
    state.referee.pause_game().await?;
    Ok(current_view(&state))
}

async fn resume_handler(State(state): State<AppState>) -> Result<Json<MatchView>, AppError> {
    state.referee.resume_game().await?;
    Ok(current_view(&state))
}

async fn stop_handler(State(state): State<AppState>) -> Result<Json<MatchView>, AppError> {
    state.referee.stop_game().await?;
    Ok(current_view(&state))
}

async fn reset_handler(State(state): State<AppState>) -> Result<Json<MatchView>, AppError> {
    state.referee.reset_match().await?;
    Ok(current_view(&state))
}

async fn swap_sides_handler(State(state): State<AppState>) -> Result<Json<MatchView>, AppError> {
    state.referee.swap_sides().await?;
    Ok(current_view(&state))
}

async fn emergency_handler(State(state): State<AppState>) -> Result<Json<MatchView>, AppError> {
    state.referee.emergency().await?;
    Ok(current_view(&state))
}

#[derive(Deserialize)]
struct PlaceRequest {
    pattern: PlacementPattern,
}

async fn place_handler(
    State(state): State<AppState>,
    Json(req): Json<PlaceRequest>,
) -> Result<Json<MatchView>, AppError> {
    state.referee.place_game(req.pattern).await?;
    Ok(current_view(&state))
}

// ============================================================================
// Penalty and score endpoints
// ============================================================================

#[derive(Deserialize)]
struct PenaltyRequest {
    robot: String,
    seconds: Option<f64>,
    reason: Option<String>,
}

async fn add_penalty_handler(
    State(state): State<AppState>,
    Json(req): Json<PenaltyRequest>,
) -> Result<Json<MatchView>, AppError> {
    let robot: RobotId = req.robot.parse()?;
    state
        .referee
        .add_penalty(robot, req.seconds, req.reason)
        .await?;
    Ok(current_view(&state))
}

#[derive(Deserialize)]
struct CancelPenaltyRequest {
    robot: String,
}

async fn cancel_penalty_handler(
    State(state): State<AppState>,
    Json(req): Json<CancelPenaltyRequest>,
) -> Result<Json<MatchView>, AppError> {
    let robot: RobotId = req.robot.parse()?;
    state.referee.cancel_penalty(robot).await?;
    Ok(current_view(&state))
}

#[derive(Deserialize)]
struct ScoreRequest {
    team: TeamColor,
    delta: i32,
}

async fn score_handler(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<MatchView>, AppError> {
    state.referee.increment_score(req.team, req.delta).await?;
    Ok(current_view(&state))
}

async fn reset_score_handler(State(state): State<AppState>) -> Result<Json<MatchView>, AppError> {
    state.referee.reset_score().await?;
    Ok(current_view(&state))
}

#[derive(Deserialize)]
struct GoalRequest {
    team: TeamColor,
}

async fn report_goal_handler(
    State(state): State<AppState>,
    Json(req): Json<GoalRequest>,
) -> Result<Json<MatchView>, AppError> {
    state.referee.report_goal(req.team).await?;
    Ok(current_view(&state))
}

#[derive(Deserialize)]
struct ValidateGoalRequest {
    valid: bool,
}

async fn validate_goal_handler(
    State(state): State<AppState>,
    Json(req): Json<ValidateGoalRequest>,
) -> Result<Json<MatchView>, AppError> {
    state.referee.validate_goal(req.valid).await?;
    Ok(current_view(&state))
}

// ============================================================================
// Half-time endpoints
// ============================================================================

async fn start_half_time_handler(
    State(state): State<AppState>,
) -> Result<Json<MatchView>, AppError> {
    state.referee.start_half_time().await?;
    Ok(current_view(&state))
}

#[derive(Deserialize)]
struct AdvanceHalfTimeRequest {
    choice: HalfTimeChoice,
}

async fn advance_half_time_handler(
    State(state): State<AppState>,
    Json(req): Json<AdvanceHalfTimeRequest>,
) -> Result<Json<MatchView>, AppError> {
    state.referee.advance_half_time(req.choice).await?;
    Ok(current_view(&state))
}

async fn abort_half_time_handler(
    State(state): State<AppState>,
) -> Result<Json<MatchView>, AppError> {
    state.referee.abort_half_time().await?;
    Ok(current_view(&state))
}

// ============================================================================
// Team configuration endpoints
// ============================================================================

#[derive(Deserialize)]
struct TeamNameRequest {
    name: String,
}

async fn team_name_handler(
    State(state): State<AppState>,
    Path(team): Path<TeamColor>,
    Json(req): Json<TeamNameRequest>,
) -> Result<Json<MatchView>, AppError> {
    state.referee.set_team_name(team, req.name).await?;
    Ok(current_view(&state))
}

#[derive(Deserialize)]
struct TeamKeyRequest {
    key: String,
}

async fn team_key_handler(
    State(state): State<AppState>,
    Path(team): Path<TeamColor>,
    Json(req): Json<TeamKeyRequest>,
) -> Result<Json<MatchView>, AppError> {
    state.referee.set_key(team, req.key).await?;
    Ok(current_view(&state))
}

#[derive(Deserialize)]
struct AllowControlRequest {
    allow: bool,
}

async fn allow_control_handler(
    State(state): State<AppState>,
    Path(team): Path<TeamColor>,
    Json(req): Json<AllowControlRequest>,
) -> Result<Json<MatchView>, AppError> {
    state.referee.allow_control(team, req.allow).await?;
    Ok(current_view(&state))
}

// ============================================================================
// Team control endpoint
// ============================================================================

#[derive(Deserialize)]
struct ControlRequest {
    team: TeamColor,
    number: u8,
    key: String,
    command: RobotCommand,
}

#[derive(Serialize)]
struct ControlResponse {
    accepted: bool,
}

async fn control_handler(
    State(state): State<AppState>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<ControlResponse>, AppError> {
    if !state.control_limiter.check(req.team) {
        debug!(team = %req.team, "Control packet rate limited");
        return Err(AppError::RateLimited);
    }

    state
        .referee
        .control_packet(req.team, req.number, req.key, req.command)
        .await?;

    Ok(Json(ControlResponse { accepted: true }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Referee(#[from] RefereeError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many control packets")]
    RateLimited,
}

impl From<RobotIdError> for AppError {
    fn from(err: RobotIdError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Referee(err) => match err {
                RefereeError::InvalidTransition { .. } => StatusCode::CONFLICT,
                RefereeError::UnauthorizedControl { .. } => StatusCode::FORBIDDEN,
                RefereeError::Preempted { .. } => StatusCode::CONFLICT,
                RefereeError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                RefereeError::ControllerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        } else {
            debug!(error = %self, "Request rejected");
        }

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

//! REST endpoints for onboarding sessions and profile status.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::WizardError;

use super::model::UserProfile;
use super::sessions::WizardSessions;
use super::wizard::{AdvanceOutcome, OnboardingWizard};

/// Header carrying the authenticated user id, set by the auth proxy in
/// front of this service.
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Route the front-end sends users to until onboarding is done.
const ONBOARDING_ROUTE: &str = "/onboarding";

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub sessions: Arc<WizardSessions>,
}

#[derive(Debug, Deserialize)]
struct RoleRequest {
    role: String,
}

#[derive(Debug, Deserialize)]
struct SkillRequest {
    skill: String,
    level: i64,
}

#[derive(Debug, Deserialize)]
struct TimeRequest {
    time_commitment: String,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: Option<String>,
    provider: Option<String>,
}

/// Sign-in method recorded when the first registration names none.
const DEFAULT_PROVIDER: &str = "password";

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/catalog", get(get_catalog))
        .route("/api/onboarding/sessions", post(create_session))
        .route("/api/onboarding/sessions/{id}", get(get_session))
        .route("/api/onboarding/sessions/{id}/role", post(select_role))
        .route("/api/onboarding/sessions/{id}/skills", post(assess_skill))
        .route("/api/onboarding/sessions/{id}/time", post(select_time))
        .route("/api/onboarding/sessions/{id}/advance", post(advance))
        .route("/api/onboarding/sessions/{id}/retreat", post(retreat))
        .route("/api/profiles/{principal}", get(get_profile).post(register_profile))
        .route("/api/profiles/{principal}/status", get(get_status))
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "skillforge",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Catalog ─────────────────────────────────────────────────────────────

/// GET /api/onboarding/catalog
///
/// The roles, skills and time commitments each step offers.
async fn get_catalog(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(serde_json::json!(state.sessions.catalog()))
}

// ── Sessions ────────────────────────────────────────────────────────────

/// POST /api/onboarding/sessions
///
/// Start a wizard for the principal in `x-principal-id`. A missing header
/// still starts a session; submitting it will fail until the user signs in.
async fn create_session(
    State(state): State<OnboardingRouteState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let (id, wizard) = state.sessions.create(principal_from(&headers)).await;
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session_id": id,
            "snapshot": wizard.snapshot().await,
        })),
    )
}

/// GET /api/onboarding/sessions/{id}
async fn get_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    match lookup(&state, &id).await {
        Ok((_, wizard)) => snapshot_response(&wizard).await,
        Err(resp) => resp,
    }
}

/// POST /api/onboarding/sessions/{id}/role
async fn select_role(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(body): Json<RoleRequest>,
) -> Response {
    let (_, wizard) = match lookup(&state, &id).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    match wizard.select_role(&body.role).await {
        Ok(()) => snapshot_response(&wizard).await,
        Err(e) => wizard_error_response(&wizard, e).await,
    }
}

/// POST /api/onboarding/sessions/{id}/skills
async fn assess_skill(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(body): Json<SkillRequest>,
) -> Response {
    let (_, wizard) = match lookup(&state, &id).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    match wizard.assess_skill(&body.skill, body.level).await {
        Ok(()) => snapshot_response(&wizard).await,
        Err(e) => wizard_error_response(&wizard, e).await,
    }
}

/// POST /api/onboarding/sessions/{id}/time
async fn select_time(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(body): Json<TimeRequest>,
) -> Response {
    let (_, wizard) = match lookup(&state, &id).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    match wizard.select_time_commitment(&body.time_commitment).await {
        Ok(()) => snapshot_response(&wizard).await,
        Err(e) => wizard_error_response(&wizard, e).await,
    }
}

/// POST /api/onboarding/sessions/{id}/advance
///
/// On completion the session is closed and the final snapshot carries
/// `redirect_to`.
async fn advance(State(state): State<OnboardingRouteState>, Path(id): Path<String>) -> Response {
    let (id, wizard) = match lookup(&state, &id).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };

    // Run on its own task so a dropped connection can't strand the wizard
    // half-way through a submission.
    let task = {
        let wizard = Arc::clone(&wizard);
        tokio::spawn(async move { wizard.advance().await })
    };

    match task.await {
        Ok(Ok(AdvanceOutcome::Moved(_))) => snapshot_response(&wizard).await,
        Ok(Ok(AdvanceOutcome::Completed { completed_at, .. })) => {
            let snapshot = wizard.snapshot().await;
            state.sessions.remove(id).await;
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "snapshot": snapshot,
                    "completed_at": completed_at,
                })),
            )
                .into_response()
        }
        Ok(Err(e)) => wizard_error_response(&wizard, e).await,
        Err(e) => {
            error!(session_id = %id, "Advance task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Internal error"})),
            )
                .into_response()
        }
    }
}

/// POST /api/onboarding/sessions/{id}/retreat
async fn retreat(State(state): State<OnboardingRouteState>, Path(id): Path<String>) -> Response {
    let (_, wizard) = match lookup(&state, &id).await {
        Ok(found) => found,
        Err(resp) => return resp,
    };
    match wizard.retreat().await {
        Ok(_) => snapshot_response(&wizard).await,
        Err(e) => wizard_error_response(&wizard, e).await,
    }
}

// ── Profiles ────────────────────────────────────────────────────────────

/// GET /api/profiles/{principal}
///
/// Returns the caller's stored profile document, or 404 if none exists.
async fn get_profile(
    State(state): State<OnboardingRouteState>,
    Path(principal): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers, &principal) {
        return resp;
    }
    match state.sessions.store().get_profile(&principal).await {
        Ok(Some(doc)) => Json(doc).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "No profile exists yet"})),
        )
            .into_response(),
        Err(e) => {
            error!(principal = %principal, "Failed to load profile: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to load profile"})),
            )
                .into_response()
        }
    }
}

/// POST /api/profiles/{principal}
///
/// Record sign-up details for the caller. Fields left out of the request
/// are not touched, and `createdAt` is only stamped on the first call.
async fn register_profile(
    State(state): State<OnboardingRouteState>,
    Path(principal): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Response {
    if let Err(resp) = authorize(&headers, &principal) {
        return resp;
    }
    let store = state.sessions.store();
    let saved = match store.get_profile(&principal).await {
        Ok(existing) => {
            let patch = registration_patch(&principal, body, existing.as_ref());
            match store.merge_profile(&principal, &patch).await {
                Ok(()) => store.get_profile(&principal).await,
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    };
    match saved {
        Ok(Some(doc)) => (StatusCode::OK, Json(doc)).into_response(),
        Ok(None) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "Profile missing after save"})),
        )
            .into_response(),
        Err(e) => {
            error!(principal = %principal, "Failed to register profile: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to save profile"})),
            )
                .into_response()
        }
    }
}

/// GET /api/profiles/{principal}/status
///
/// Whether the caller has finished onboarding, and where to send them.
async fn get_status(
    State(state): State<OnboardingRouteState>,
    Path(principal): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&headers, &principal) {
        return resp;
    }
    let profile = match state.sessions.store().get_profile(&principal).await {
        Ok(doc) => doc
            .and_then(|doc| UserProfile::from_document(&doc))
            .unwrap_or_default(),
        Err(e) => {
            error!(principal = %principal, "Failed to load profile: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to load profile"})),
            )
                .into_response();
        }
    };

    let redirect_to = if profile.needs_onboarding() {
        ONBOARDING_ROUTE
    } else {
        state.sessions.config().completion_redirect.as_str()
    };
    Json(serde_json::json!({
        "principal": principal,
        "onboarding_completed": profile.onboarding_completed,
        "redirect_to": redirect_to,
    }))
    .into_response()
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// The signed-in user named by the auth proxy, if any.
fn principal_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Profiles are only readable and writable by their owner.
fn authorize(headers: &HeaderMap, principal: &str) -> Result<(), Response> {
    match principal_from(headers) {
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Sign in required"})),
        )
            .into_response()),
        Some(caller) if caller != principal => {
            warn!(caller = %caller, principal = %principal, "Rejected cross-user profile access");
            Err((
                StatusCode::FORBIDDEN,
                Json(serde_json::json!({"error": "Not your profile"})),
            )
                .into_response())
        }
        Some(_) => Ok(()),
    }
}

/// Sign-up fields to merge. Only what the request carries, plus defaults
/// for `provider` and `createdAt` when the profile has none yet.
fn registration_patch(
    principal: &str,
    body: RegisterRequest,
    existing: Option<&serde_json::Value>,
) -> serde_json::Value {
    let mut patch = serde_json::Map::new();
    patch.insert("uid".to_string(), principal.into());
    let missing = |key: &str| existing.and_then(|doc| doc.get(key)).is_none();

    match body.provider {
        Some(provider) => {
            patch.insert("provider".to_string(), provider.into());
        }
        None if missing("provider") => {
            patch.insert("provider".to_string(), DEFAULT_PROVIDER.into());
        }
        None => {}
    }
    if let Some(email) = body.email {
        patch.insert("email".to_string(), email.into());
    }
    if missing("createdAt") {
        patch.insert(
            "createdAt".to_string(),
            serde_json::json!(chrono::Utc::now()),
        );
    }
    serde_json::Value::Object(patch)
}

/// Resolve a session id from the path, or the error response to return.
async fn lookup(
    state: &OnboardingRouteState,
    raw_id: &str,
) -> Result<(Uuid, Arc<OnboardingWizard>), Response> {
    let id = Uuid::parse_str(raw_id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid session ID"})),
        )
            .into_response()
    })?;
    match state.sessions.get(id).await {
        Some(wizard) => Ok((id, wizard)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Session not found"})),
        )
            .into_response()),
    }
}

async fn snapshot_response(wizard: &OnboardingWizard) -> Response {
    (StatusCode::OK, Json(serde_json::json!(wizard.snapshot().await))).into_response()
}

/// Map a wizard error to a status code. The body always carries the
/// current snapshot so the page can re-render.
async fn wizard_error_response(wizard: &OnboardingWizard, e: WizardError) -> Response {
    let status = match &e {
        WizardError::UnknownOption { .. } | WizardError::InvalidLevel { .. } => {
            StatusCode::BAD_REQUEST
        }
        WizardError::SubmissionInFlight
        | WizardError::InvalidTransition { .. }
        | WizardError::StepIncomplete { .. } => StatusCode::CONFLICT,
        WizardError::Precondition(_) => StatusCode::UNAUTHORIZED,
        WizardError::Persistence(_) => StatusCode::BAD_GATEWAY,
        WizardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    };
    if e.is_commit_failure() {
        warn!(status = %status, "Onboarding submission failed: {}", e);
    }
    (
        status,
        Json(serde_json::json!({
            "error": e.to_string(),
            "snapshot": wizard.snapshot().await,
        })),
    )
        .into_response()
}

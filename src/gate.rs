//! Session gate: the boundary check run before any protected operation.
//!
//! One provider query per call, no caching, no retries, no writes. The two
//! outcomes are an exhaustive enum so callers cannot ignore the denial arm,
//! and a provider failure is its own error kind rather than a denial.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::{AppError, AppResult};
use crate::identity::{RequestContext, SessionProvider};

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized - Please login first";

/// Denial payload returned to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub status: u16,
    pub message: String,
}

impl Denial {
    pub fn unauthorized() -> Self {
        Self { status: 401, message: UNAUTHORIZED_MESSAGE.to_string() }
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::UNAUTHORIZED);
        (status, Json(self)).into_response()
    }
}

/// Outcome of one gate evaluation, constructed fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Unauthorized(Denial),
}

/// Decides, for one inbound request, whether processing may continue.
/// The provider is injected at construction so the gate carries no ambient
/// environment coupling and tests can swap in scripted providers.
#[derive(Clone)]
pub struct SessionGate {
    provider: Arc<dyn SessionProvider>,
}

impl SessionGate {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    /// Single read-and-decide step: ask the provider for the current session
    /// and map presence/absence to `Proceed`/`Unauthorized`. A failed lookup
    /// surfaces as `AppError::Provider` and is never treated as a result.
    pub async fn check_session(&self, ctx: &RequestContext) -> AppResult<GateDecision> {
        match self.provider.get_session(ctx).await {
            Ok(Some(_session)) => Ok(GateDecision::Proceed),
            Ok(None) => {
                tracing::debug!(request_id = ?ctx.request_id, "gate.deny no active session");
                Ok(GateDecision::Unauthorized(Denial::unauthorized()))
            }
            Err(e) => {
                tracing::warn!(request_id = ?ctx.request_id, error = %e, "gate.provider_error");
                Err(AppError::provider("session_lookup_failed", e.to_string()))
            }
        }
    }
}

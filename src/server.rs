//!
//! doorman HTTP server
//! -------------------
//! This module defines the Axum-based HTTP API around the session gate.
//!
//! Responsibilities:
//! - Session cookie handling for login/logout backed by the reference provider.
//! - A gate middleware run in front of every protected route.
//! - Demonstration protected endpoints (`/session`, `/echo`).
//! - Startup banner and listener wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::gate::{Denial, GateDecision, SessionGate};
use crate::identity::{
    CredentialStore, LoginError, LoginRequest, MemorySessionProvider, SessionManager,
    SessionProvider, SESSION_COOKIE,
};

/// Shared server state injected into all handlers.
///
/// The gate only knows the provider through the `SessionProvider` trait; the
/// concrete handle is kept alongside for login/logout, which are provider
/// operations rather than gate operations.
#[derive(Clone)]
pub struct AppState {
    pub gate: SessionGate,
    pub provider: Arc<MemorySessionProvider>,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut credentials = CredentialStore::from_pairs(config.users.iter().cloned());
        if credentials.is_empty() {
            // First-run convenience account, mirrors an empty deployment
            credentials.seed("admin", "doorman")?;
            warn!("No users configured; seeded default account admin/doorman - change this before exposing the service");
        }
        let sessions = SessionManager::new(config.session_ttl);
        let provider = Arc::new(MemorySessionProvider::new(sessions, credentials));
        let gate = SessionGate::new(provider.clone());
        Ok(Self { gate, provider })
    }
}

/// Mount all routes. Split out from `run_with_config` so tests can drive the
/// router without binding a socket.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/session", get(session_info))
        .route("/echo", post(echo))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/", get(|| async { "doorman ok" }))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .merge(protected)
        .with_state(state)
}

/// Start the doorman HTTP server bound to the configured port.
pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "doorman starting: http_port={}, session_ttl_secs={}, configured_users={}",
        config.http_port,
        config.session_ttl.as_secs(),
        config.users.len()
    );

    let state = AppState::new(&config)?;
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(Config::from_env()?).await
}

/// Gate middleware: build the request context, run the gate, and either let
/// the request through (context attached for handlers) or answer with the
/// denial. Provider failures map through `AppError` to 503, never to a pass.
async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let ctx = crate::identity::RequestContext::from_headers(req.headers());
    match state.gate.check_session(&ctx).await {
        Ok(GateDecision::Proceed) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Ok(GateDecision::Unauthorized(denial)) => denial.into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE, token
    ))
    .unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE
    ))
    .unwrap()
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginPayload>,
) -> Response {
    let ctx = crate::identity::RequestContext::from_headers(&headers);
    let req = LoginRequest {
        username: payload.username,
        password: payload.password,
        ip: ctx.peer_ip,
    };
    match state.provider.login(&req) {
        Ok(resp) => {
            let mut h = HeaderMap::new();
            h.insert("Set-Cookie", set_session_cookie(&resp.session.token));
            (StatusCode::OK, h, Json(json!({"status":"ok"}))).into_response()
        }
        Err(LoginError::InvalidCredentials) => {
            AppError::auth("invalid_credentials", "invalid username or password").into_response()
        }
        Err(LoginError::Store(e)) => {
            error!("login store error: {e}");
            AppError::internal("credential_store", e).into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let ctx = crate::identity::RequestContext::from_headers(&headers);
    if let Some(token) = ctx.session_token.as_deref() {
        state.provider.logout(token);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"}))).into_response()
}

/// Protected: echo the authenticated principal back to the caller.
async fn session_info(
    State(state): State<AppState>,
    Extension(ctx): Extension<crate::identity::RequestContext>,
) -> Response {
    match state.provider.get_session(&ctx).await {
        Ok(Some(sess)) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "session": {
                    "session_id": sess.session_id,
                    "user_id": sess.principal.user_id,
                    "roles": sess.principal.roles,
                },
                "request_id": ctx.request_id,
            })),
        )
            .into_response(),
        // revoked between the gate check and this read
        Ok(None) => Denial::unauthorized().into_response(),
        Err(e) => AppError::provider("session_lookup_failed", e.to_string()).into_response(),
    }
}

/// Protected: stand-in for any guarded operation.
async fn echo(Json(payload): Json<serde_json::Value>) -> Response {
    (StatusCode::OK, Json(json!({"status":"ok","echo": payload}))).into_response()
}

use axum::http::HeaderMap;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "doorman_session";

/// Per-request ambient data handed to the session provider. The gate itself
/// reads nothing out of it; it is assembled once at the edge of the pipeline
/// and passed through by reference.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub session_token: Option<String>,
    pub request_id: Option<String>,
    pub peer_ip: Option<String>,
}

impl RequestContext {
    /// Build a context from request headers: session cookie, forwarded peer
    /// address, and the inbound `x-request-id` (a fresh id is minted when the
    /// client did not send one).
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .or_else(|| Some(Uuid::new_v4().to_string()));
        let peer_ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string());
        Self {
            session_token: parse_cookie(headers, SESSION_COOKIE),
            request_id,
            peer_ip,
        }
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

use std::collections::HashMap;
use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use password_hash::{PasswordHash, SaltString};
use crate::tprintln;

use super::principal::{Attrs, Principal};
use super::request_context::RequestContext;
use super::session::{SessionDescriptor, SessionManager};

/// The seam the gate depends on. Implementations own sessions end to end;
/// the gate only asks whether one exists for the given request.
///
/// `Ok(None)` means "definitively no session". A lookup that could not be
/// answered must return `Err`, never `Ok(None)`.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn get_session(&self, ctx: &RequestContext) -> Result<Option<SessionDescriptor>>;
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: SessionDescriptor,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential store error: {0}")]
    Store(String),
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Username -> Argon2 PHC hash map, populated at startup from configuration.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let users = pairs.into_iter().map(|(u, h)| (u.into(), h.into())).collect();
        Self { users }
    }

    /// Hash and store a plaintext password. Used for startup seeding and tests.
    pub fn seed(&mut self, username: &str, password: &str) -> Result<()> {
        let phc = hash_password(password)?;
        self.users.insert(username.to_string(), phc);
        Ok(())
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.users.get(username) {
            Some(phc) => verify_password(phc, password),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool { self.users.is_empty() }
}

/// Reference provider: an in-process session table plus a credential store.
/// Sits behind the `SessionProvider` trait so the gate never sees it.
pub struct MemorySessionProvider {
    sessions: SessionManager,
    credentials: CredentialStore,
}

impl MemorySessionProvider {
    pub fn new(sessions: SessionManager, credentials: CredentialStore) -> Self {
        Self { sessions, credentials }
    }

    pub fn login(&self, req: &LoginRequest) -> Result<LoginResponse, LoginError> {
        if !self.credentials.verify(&req.username, &req.password) {
            return Err(LoginError::InvalidCredentials);
        }
        let principal = Principal {
            user_id: req.username.clone(),
            roles: vec!["user".into()],
            attrs: Attrs { ip: req.ip.clone(), ..Default::default() },
        };
        let session = self.sessions.issue(principal);
        tprintln!("auth.login user={} sid={}", req.username, session.session_id);
        Ok(LoginResponse { session })
    }

    pub fn logout(&self, token: &str) -> bool {
        self.sessions.logout(token)
    }

    pub fn revoke_user(&self, user_id: &str) -> usize {
        self.sessions.revoke_user(user_id)
    }

    /// Direct view of the session table, for operational probes.
    pub fn session_count(&self) -> usize { self.sessions.len() }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn get_session(&self, ctx: &RequestContext) -> Result<Option<SessionDescriptor>> {
        let Some(token) = ctx.session_token.as_deref() else { return Ok(None); };
        Ok(self.sessions.validate(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn provider_with(user: &str, password: &str) -> MemorySessionProvider {
        let mut creds = CredentialStore::default();
        creds.seed(user, password).expect("seed");
        MemorySessionProvider::new(SessionManager::new(Duration::from_secs(60)), creds)
    }

    #[test]
    fn password_hash_verify_roundtrip() {
        let phc = hash_password("hunter2").expect("hash");
        assert!(verify_password(&phc, "hunter2"));
        assert!(!verify_password(&phc, "hunter3"));
        assert!(!verify_password("not-a-phc-string", "hunter2"));
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let p = provider_with("alice", "secret");
        assert!(matches!(
            p.login(&LoginRequest { username: "alice".into(), password: "wrong".into(), ip: None }),
            Err(LoginError::InvalidCredentials)
        ));
        assert!(matches!(
            p.login(&LoginRequest { username: "mallory".into(), password: "secret".into(), ip: None }),
            Err(LoginError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn login_issues_a_findable_session() {
        let p = provider_with("alice", "secret");
        let resp = p
            .login(&LoginRequest { username: "alice".into(), password: "secret".into(), ip: Some("10.0.0.7".into()) })
            .expect("login");
        let ctx = RequestContext { session_token: Some(resp.session.token.clone()), ..Default::default() };
        let found = p.get_session(&ctx).await.expect("lookup").expect("present");
        assert_eq!(found.principal.user_id, "alice");
        assert_eq!(found.principal.attrs.ip.as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn missing_token_is_a_definitive_absence() {
        let p = provider_with("alice", "secret");
        let ctx = RequestContext::default();
        assert!(p.get_session(&ctx).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn revoke_user_invalidates_every_session() {
        let mut creds = CredentialStore::default();
        creds.seed("alice", "secret").expect("seed");
        let p = MemorySessionProvider::new(SessionManager::new(Duration::from_secs(60)), creds);
        let first = p
            .login(&LoginRequest { username: "alice".into(), password: "secret".into(), ip: None })
            .expect("login");
        let second = p
            .login(&LoginRequest { username: "alice".into(), password: "secret".into(), ip: None })
            .expect("login");
        assert_eq!(p.revoke_user("alice"), 2);
        for token in [first.session.token, second.session.token] {
            let ctx = RequestContext { session_token: Some(token), ..Default::default() };
            assert!(p.get_session(&ctx).await.expect("lookup").is_none());
        }
    }

    #[tokio::test]
    async fn logout_makes_the_session_absent() {
        let p = provider_with("alice", "secret");
        let resp = p
            .login(&LoginRequest { username: "alice".into(), password: "secret".into(), ip: None })
            .expect("login");
        assert!(p.logout(&resp.session.token));
        let ctx = RequestContext { session_token: Some(resp.session.token.clone()), ..Default::default() };
        assert!(p.get_session(&ctx).await.expect("lookup").is_none());
    }
}

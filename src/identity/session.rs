use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use base64::Engine;
use parking_lot::RwLock;
use crate::tprintln;

use super::principal::Principal;

pub type SessionToken = String;

/// Provider-owned session record. Callers outside the provider only ever test
/// presence or read the principal; the record is never handed out mutably.
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    pub session_id: String,
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_id() -> String {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

struct Inner {
    ttl: Duration,
    /// token -> session
    sessions: RwLock<HashMap<String, SessionDescriptor>>,
    /// user_id -> tokens, for bulk revocation
    user_index: RwLock<HashMap<String, HashSet<String>>>,
    revoked: RwLock<HashSet<String>>,
}

/// In-memory session table with TTL expiry. All state is owned by the
/// manager instance so two managers never observe each other's sessions.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                sessions: RwLock::new(HashMap::new()),
                user_index: RwLock::new(HashMap::new()),
                revoked: RwLock::new(HashSet::new()),
            }),
        }
    }

    pub fn issue(&self, principal: Principal) -> SessionDescriptor {
        let now = Instant::now();
        let sid = gen_id();
        let token = gen_id();
        let sess = SessionDescriptor {
            session_id: sid.clone(),
            token: token.clone(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.inner.ttl,
        };
        {
            let mut m = self.inner.sessions.write();
            m.insert(token.clone(), sess.clone());
        }
        {
            let mut uidx = self.inner.user_index.write();
            let set = uidx.entry(principal.user_id.clone()).or_insert_with(HashSet::new);
            set.insert(token);
        }
        tprintln!("session.issue user={} sid={} ttl_secs={}", principal.user_id, sid, self.inner.ttl.as_secs());
        sess
    }

    /// Look up a live session by token. Expired entries are dropped lazily on
    /// the lookup that observes them.
    pub fn validate(&self, token: &str) -> Option<SessionDescriptor> {
        if self.inner.revoked.read().contains(token) { return None; }
        let now = Instant::now();
        let mut drop_key: Option<String> = None;
        let out = {
            let map = self.inner.sessions.read();
            if let Some(sess) = map.get(token) {
                if sess.expires_at > now {
                    Some(sess.clone())
                } else {
                    drop_key = Some(token.to_string());
                    None
                }
            } else { None }
        };
        if let Some(k) = drop_key {
            self.inner.sessions.write().remove(&k);
        }
        out
    }

    pub fn logout(&self, token: &str) -> bool {
        let mut removed = false;
        if let Some(sess) = self.inner.sessions.write().remove(token) {
            removed = true;
            let uid = sess.principal.user_id;
            let mut idx = self.inner.user_index.write();
            if let Some(set) = idx.get_mut(&uid) { set.remove(token); }
            self.inner.revoked.write().insert(token.to_string());
        }
        removed
    }

    pub fn revoke_user(&self, user_id: &str) -> usize {
        let mut count = 0usize;
        if let Some(tokens) = self.inner.user_index.read().get(user_id).cloned() {
            let mut s = self.inner.sessions.write();
            let mut r = self.inner.revoked.write();
            for t in tokens.iter() {
                if s.remove(t).is_some() { count += 1; }
                r.insert(t.clone());
            }
        }
        tprintln!("session.revoke user={} count={}", user_id, count);
        count
    }

    /// Number of live entries in the table (expired entries not yet swept
    /// still count; they disappear on their next lookup).
    pub fn len(&self) -> usize {
        self.inner.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(user: &str) -> Principal {
        Principal { user_id: user.into(), roles: vec!["user".into()], ..Default::default() }
    }

    #[test]
    fn issue_then_validate_roundtrip() {
        let sm = SessionManager::default();
        let sess = sm.issue(principal("alice"));
        let got = sm.validate(&sess.token).expect("session should be live");
        assert_eq!(got.session_id, sess.session_id);
        assert_eq!(got.principal.user_id, "alice");
    }

    #[test]
    fn unknown_token_is_absent() {
        let sm = SessionManager::default();
        assert!(sm.validate("no-such-token").is_none());
    }

    #[test]
    fn expired_session_is_absent_and_swept() {
        let sm = SessionManager::new(Duration::ZERO);
        let sess = sm.issue(principal("bob"));
        assert!(sm.validate(&sess.token).is_none());
        // lazy sweep removed the entry
        assert_eq!(sm.len(), 0);
    }

    #[test]
    fn logout_revokes_the_token() {
        let sm = SessionManager::default();
        let sess = sm.issue(principal("carol"));
        assert!(sm.logout(&sess.token));
        assert!(sm.validate(&sess.token).is_none());
        // second logout is a no-op
        assert!(!sm.logout(&sess.token));
    }

    #[test]
    fn revoke_user_drops_all_of_their_sessions() {
        let sm = SessionManager::default();
        let s1 = sm.issue(principal("dave"));
        let s2 = sm.issue(principal("dave"));
        let other = sm.issue(principal("erin"));
        assert_eq!(sm.revoke_user("dave"), 2);
        assert!(sm.validate(&s1.token).is_none());
        assert!(sm.validate(&s2.token).is_none());
        assert!(sm.validate(&other.token).is_some());
    }

    #[test]
    fn managers_do_not_share_state() {
        let a = SessionManager::default();
        let b = SessionManager::default();
        let sess = a.issue(principal("faye"));
        assert!(b.validate(&sess.token).is_none());
    }
}

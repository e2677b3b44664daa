//! Environment-driven configuration. All knobs use the `DOORMAN_` prefix and
//! fall back to development defaults.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub http_port: u16,
    /// Session lifetime
    pub session_ttl: Duration,
    /// Seeded users as (username, argon2 PHC hash) pairs
    pub users: Vec<(String, String)>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            http_port: env::var("DOORMAN_HTTP_PORT")
                .unwrap_or_else(|_| "7979".to_string())
                .parse()?,

            session_ttl: Duration::from_secs(
                env::var("DOORMAN_SESSION_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
            ),

            users: env::var("DOORMAN_USERS")
                .ok()
                .map(|v| parse_users(&v))
                .unwrap_or_default(),
        })
    }
}

/// Parse `user:phc;user:phc` pairs. Entries are separated by `;` because
/// argon2 PHC strings contain commas in their parameter list. The user/hash
/// split is on the first colon.
fn parse_users(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|entry| {
            let entry = entry.trim();
            let (user, phc) = entry.split_once(':')?;
            if user.is_empty() || phc.is_empty() { return None; }
            Some((user.to_string(), phc.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_hash_pairs() {
        let users = parse_users(
            "alice:$argon2id$v=19$m=19456,t=2,p=1$abc$def; bob:$argon2id$v=19$m=19456,t=2,p=1$xyz$uvw",
        );
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].0, "alice");
        assert_eq!(users[0].1, "$argon2id$v=19$m=19456,t=2,p=1$abc$def");
        assert_eq!(users[1].0, "bob");
    }

    #[test]
    fn skips_malformed_entries() {
        let users = parse_users("no-colon-here;:empty-user;empty-hash:;ok:phc");
        assert_eq!(users, vec![("ok".to_string(), "phc".to_string())]);
    }
}

//! Authentication utilities
//!
//! Provides:
//! - Opaque bearer-token sessions held in memory
//! - Credential checking (configured user, or mock login in development)
//! - Expired session sweeping
//! - Session context extraction for handlers

use crate::config::AuthConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Prefix of every issued session token
pub const TOKEN_PREFIX: &str = "nsb_";

/// Accepted login credentials
#[derive(Debug, Clone)]
pub enum Credentials {
    /// A single back-office user with a SHA-256 password hash
    Fixed {
        username: String,
        password_sha256: String,
    },
    /// Any non-empty username and password (development only)
    AnyNonEmpty,
    /// No credentials configured outside development; every login fails
    Unconfigured,
}

impl Credentials {
    /// Pick credentials from configuration. Mock login is only ever
    /// enabled in development.
    pub fn from_config(config: &AuthConfig, development: bool) -> Self {
        match (&config.username, &config.password_sha256) {
            (Some(username), Some(hash)) if !username.trim().is_empty() && !hash.is_empty() => {
                Credentials::Fixed {
                    username: username.trim().to_string(),
                    password_sha256: hash.trim().to_string(),
                }
            }
            _ if development => Credentials::AnyNonEmpty,
            _ => Credentials::Unconfigured,
        }
    }

    /// Check a username/password pair
    pub fn verify(&self, username: &str, password: &str) -> bool {
        if username.trim().is_empty() || password.is_empty() {
            return false;
        }
        match self {
            Credentials::Fixed { username: expected, password_sha256 } => {
                username == expected && hash_secret(password).eq_ignore_ascii_case(password_sha256)
            }
            Credentials::AnyNonEmpty => true,
            Credentials::Unconfigured => false,
        }
    }
}

/// An authenticated session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if session is expired at the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// A freshly issued token; the plain token is only ever returned here
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

/// In-memory session registry keyed by token hash
pub struct SessionStore {
    credentials: Credentials,
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(credentials: Credentials, ttl: std::time::Duration) -> Self {
        Self {
            credentials,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(1)),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Check credentials and open a session
    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedSession> {
        if matches!(self.credentials, Credentials::Unconfigured) {
            return Err(AppError::Configuration {
                message: "no back-office credentials are configured".to_string(),
            });
        }

        if !self.credentials.verify(username, password) {
            metrics::record_login(false);
            tracing::warn!(username = %username, "Login rejected");
            return Err(AppError::InvalidCredentials);
        }

        let token = generate_token();
        let now = Utc::now();
        let session = Session {
            username: username.trim().to_string(),
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.sessions
            .write()
            .await
            .insert(hash_secret(&token), session.clone());

        metrics::record_login(true);
        tracing::info!(username = %session.username, expires_at = %session.expires_at, "Session created");

        Ok(IssuedSession { token, session })
    }

    /// Resolve a token to its live session
    pub async fn validate(&self, token: &str) -> Result<Session> {
        self.validate_at(token, Utc::now()).await
    }

    /// Resolve a token as of `now`; an expired session is removed
    pub async fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Session> {
        let key = hash_secret(token);

        let session = self
            .sessions
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| AppError::Unauthorized {
                message: "Invalid session token".to_string(),
            })?;

        if session.is_expired_at(now) {
            self.sessions.write().await.remove(&key);
            return Err(AppError::ExpiredToken);
        }

        Ok(session)
    }

    /// Close a session; returns whether one existed
    pub async fn logout(&self, token: &str) -> bool {
        self.sessions
            .write()
            .await
            .remove(&hash_secret(token))
            .is_some()
    }

    /// Remove sessions expired as of `now`
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        let removed = before - sessions.len();

        if removed > 0 {
            metrics::record_sessions_expired(removed);
            tracing::debug!(removed, remaining = sessions.len(), "Expired sessions swept");
        }
        removed
    }

    /// Remove sessions that have expired
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Whether logins are accepted without configured credentials
    pub fn is_mock(&self) -> bool {
        matches!(self.credentials, Credentials::AnyNonEmpty)
    }

    /// Number of tracked sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Hash a secret (token or password) for storage and comparison
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new session token
pub fn generate_token() -> String {
    let random_bytes: [u8; 32] = rand::random();
    format!("{}{}", TOKEN_PREFIX, hex::encode(random_bytes))
}

/// Extract the token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extracted session context available to handlers
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub session: Session,
}

/// Axum extractor for AuthSession
impl<S> FromRequestParts<S> for AuthSession
where
    Arc<SessionStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must be a Bearer token".to_string(),
        })?;

        let store = Arc::<SessionStore>::from_ref(state);
        let session = store.validate(token).await?;

        Ok(AuthSession {
            token: token.to_string(),
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> Credentials {
        Credentials::Fixed {
            username: "manager".into(),
            password_sha256: hash_secret("omakase"),
        }
    }

    fn store(credentials: Credentials) -> SessionStore {
        SessionStore::new(credentials, std::time::Duration::from_secs(3600))
    }

    #[test]
    fn test_fixed_credentials() {
        let credentials = fixed();
        assert!(credentials.verify("manager", "omakase"));
        assert!(!credentials.verify("manager", "wrong"));
        assert!(!credentials.verify("chef", "omakase"));
    }

    #[test]
    fn test_mock_credentials_reject_empty() {
        let credentials = Credentials::AnyNonEmpty;
        assert!(credentials.verify("anyone", "x"));
        assert!(!credentials.verify("  ", "x"));
        assert!(!credentials.verify("anyone", ""));
    }

    #[test]
    fn test_credentials_from_config() {
        let mut config = AuthConfig::default();
        assert!(matches!(Credentials::from_config(&config, true), Credentials::AnyNonEmpty));
        assert!(matches!(Credentials::from_config(&config, false), Credentials::Unconfigured));

        config.username = Some("manager".into());
        config.password_sha256 = Some(hash_secret("omakase"));
        assert!(matches!(Credentials::from_config(&config, false), Credentials::Fixed { .. }));
    }

    #[tokio::test]
    async fn test_unconfigured_login_is_a_configuration_error() {
        let store = store(Credentials::Unconfigured);
        let err = store.login("manager", "omakase").await.unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(token.len(), TOKEN_PREFIX.len() + 64);
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer nsb_123"), Some("nsb_123"));
        assert_eq!(extract_bearer("Bearer   "), None);
        assert_eq!(extract_bearer("nsb_123"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[tokio::test]
    async fn test_login_and_validate() {
        let store = store(fixed());
        let issued = store.login("manager", "omakase").await.unwrap();

        let session = store.validate(&issued.token).await.unwrap();
        assert_eq!(session.username, "manager");
        assert!(session.expires_at > session.created_at);
    }

    #[tokio::test]
    async fn test_bad_login() {
        let store = store(fixed());
        let err = store.login("manager", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let store = store(Credentials::AnyNonEmpty);
        let err = store.validate("nsb_missing").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_removed() {
        let store = store(Credentials::AnyNonEmpty);
        let issued = store.login("server", "pw").await.unwrap();

        let later = issued.session.expires_at + Duration::seconds(1);
        let err = store.validate_at(&issued.token, later).await.unwrap_err();
        assert!(matches!(err, AppError::ExpiredToken));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let store = store(Credentials::AnyNonEmpty);
        let first = store.login("a", "pw").await.unwrap();
        store.login("b", "pw").await.unwrap();

        assert_eq!(store.sweep_expired().await, 0);
        let later = first.session.expires_at + Duration::hours(1);
        assert_eq!(store.sweep_expired_at(later).await, 2);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_logout() {
        let store = store(Credentials::AnyNonEmpty);
        let issued = store.login("a", "pw").await.unwrap();
        assert!(store.logout(&issued.token).await);
        assert!(!store.logout(&issued.token).await);
        assert!(store.validate(&issued.token).await.is_err());
    }
}

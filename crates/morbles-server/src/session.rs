//! Server-side sessions keyed by a random cookie token.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use morbles_shared::constants::SESSION_COOKIE;
use morbles_shared::credentials::generate_session_token;
use morbles_shared::types::{PlayerId, PlayerRecord};
use tokio::sync::RwLock;
use tracing::debug;

use crate::api::AppState;
use crate::config::MAX_SESSION_TTL_SECS;
use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Session entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,
    pub name: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn is_fresh(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// The caller of an `/api` request, attached by [`require_session`].
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub token: String,
    /// Re-read from storage on every request so admin changes apply at once.
    pub player: PlayerRecord,
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    /// `ttl_secs` is clamped to `0..=MAX_SESSION_TTL_SECS`.
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs.clamp(0, MAX_SESSION_TTL_SECS)),
        }
    }

    /// Open a session for `player` and return its token.
    pub async fn create(&self, player: &PlayerRecord) -> String {
        let token = generate_session_token();
        let session = Session {
            player_id: player.id,
            name: player.name.clone(),
            expires_at: Utc::now()
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.sessions.write().await.insert(token.clone(), session);
        debug!(player_id = player.id, "Session opened");
        token
    }

    /// Look up a live session.
    pub async fn get(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions.get(token).filter(|s| s.is_fresh()).cloned()
    }

    pub async fn remove(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Evict expired sessions.
    pub async fn purge_expired(&self) {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.is_fresh());
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Purged expired sessions");
        }
    }
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

/// Read the session token from the `Cookie` header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying `token`.
pub fn session_cookie(token: &str, domain: Option<&str>, max_age_secs: i64) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    );
    if let Some(domain) = domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    cookie
}

/// `Set-Cookie` value that deletes the session cookie.
pub fn clear_cookie(domain: Option<&str>) -> String {
    session_cookie("", domain, 0)
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Reject requests without a live session and attach [`CurrentSession`].
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let unauthorized = || ServerError::Unauthorized("unauthorized".into());

    let token = token_from_headers(req.headers()).ok_or_else(unauthorized)?;
    let session = state.sessions.get(&token).await.ok_or_else(unauthorized)?;
    let player = state
        .directory
        .get(session.player_id)
        .await?
        .ok_or_else(unauthorized)?;
    tracing::trace!(player_id = player.id, session_name = %session.name, "Session accepted");

    req.extensions_mut().insert(CurrentSession { token, player });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ann() -> PlayerRecord {
        PlayerRecord {
            id: 1,
            name: "ann".into(),
            admin: false,
        }
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let store = SessionStore::new(60);
        let token = store.create(&ann()).await;

        let session = store.get(&token).await.unwrap();
        assert_eq!(session.player_id, 1);
        assert_eq!(session.name, "ann");

        assert!(store.remove(&token).await);
        assert!(store.get(&token).await.is_none());
        assert!(!store.remove(&token).await);
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_purged() {
        let store = SessionStore::new(0);
        let token = store.create(&ann()).await;
        assert!(store.get(&token).await.is_none());

        store.purge_expired().await;
        assert!(store.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_huge_ttl_is_clamped() {
        let store = SessionStore::new(i64::MAX);
        assert_eq!(store.ttl, Duration::seconds(MAX_SESSION_TTL_SECS));

        let token = store.create(&ann()).await;
        assert!(store.get(&token).await.is_some());
    }

    #[test]
    fn test_token_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; morbles_session=abc123; other=1"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc123"));

        let mut empty = HeaderMap::new();
        empty.insert(header::COOKIE, HeaderValue::from_static("morbles_session="));
        assert_eq!(token_from_headers(&empty), None);
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_domain() {
        let plain = session_cookie("t", None, 10);
        assert!(plain.starts_with("morbles_session=t;"));
        assert!(!plain.contains("Domain"));

        let scoped = session_cookie("t", Some("morbles.example"), 10);
        assert!(scoped.ends_with("; Domain=morbles.example"));
        assert!(clear_cookie(None).contains("Max-Age=0"));
    }
}

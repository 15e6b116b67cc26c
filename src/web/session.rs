//! Server-side browser sessions.
//!
//! The client only ever sees an opaque random token in a cookie. The
//! session data (who is logged in) stays on the server and is dropped after
//! a period of inactivity.

use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SessionConfig;

/// Data kept for a logged in browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    /// Logged in user.
    pub user_id: Uuid,
    /// Name to show for the user.
    pub display_name: Option<String>,
}

#[derive(Debug)]
struct SessionEntry {
    data: SessionData,
    last_activity: Instant,
}

impl SessionEntry {
    fn is_idle(&self, idle_timeout: Duration) -> bool {
        self.last_activity.elapsed() >= idle_timeout
    }
}

/// In-memory session store keyed by cookie token.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    cookie_name: String,
    idle_timeout: Duration,
}

impl SessionStore {
    /// Create a session store.
    pub fn new(cookie_name: impl Into<String>, idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            cookie_name: cookie_name.into(),
            idle_timeout,
        }
    }

    /// Create a session store from the `[session]` config section.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.cookie_name.clone(),
            Duration::from_secs(config.idle_timeout_secs),
        )
    }

    /// Name of the session cookie.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Start a session and return its token.
    pub fn create(&self, data: SessionData) -> String {
        self.purge_idle();

        let token = Uuid::new_v4().simple().to_string();
        info!(user_id = %data.user_id, "Session started");
        self.sessions.insert(
            token.clone(),
            SessionEntry {
                data,
                last_activity: Instant::now(),
            },
        );
        token
    }

    /// Look up a session, refreshing its idle timer.
    ///
    /// Idle sessions are removed and reported as missing.
    pub fn get(&self, token: &str) -> Option<SessionData> {
        let mut entry = self.sessions.get_mut(token)?;
        if entry.is_idle(self.idle_timeout) {
            drop(entry);
            self.sessions.remove(token);
            debug!("Idle session expired");
            return None;
        }
        entry.last_activity = Instant::now();
        Some(entry.data.clone())
    }

    /// End a session. Returns whether it existed.
    pub fn destroy(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Remove every idle session.
    pub fn purge_idle(&self) -> usize {
        let before = self.sessions.len();
        let timeout = self.idle_timeout;
        self.sessions.retain(|_, entry| !entry.is_idle(timeout));
        before - self.sessions.len()
    }

    /// Number of live sessions, idle ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session token carried by a cookie jar, if any.
    pub fn token_from_jar(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.cookie_name).map(|c| c.value().to_string())
    }

    /// Session token carried by a request, if any.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        self.token_from_jar(&CookieJar::from_headers(headers))
    }

    /// Session referenced by a request, if any and still live.
    pub fn from_headers(&self, headers: &HeaderMap) -> Option<SessionData> {
        self.get(&self.token_from_headers(headers)?)
    }

    /// Cookie carrying a session token.
    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    /// Cookie that clears the session token on the client.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), "")).path("/").build()
    }
}

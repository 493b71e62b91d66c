use axum::http::{header::COOKIE, HeaderMap};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::api::BackendClient;
use crate::config::{AppConfig, KeyStatus};
use crate::session::{SessionState, Tab};

pub const SESSION_COOKIE: &str = "lumabot_session";

// ── Busy flags ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BusyFlags {
    chat: AtomicBool,
    analysis: AtomicBool,
    generation: AtomicBool,
}

impl BusyFlags {
    fn flag(&self, tab: Tab) -> &AtomicBool {
        match tab {
            Tab::Chat => &self.chat,
            Tab::Analysis => &self.analysis,
            Tab::Generation => &self.generation,
        }
    }
}

/// Marks a tab as having a request in flight until dropped.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// One browser session.
///
/// `state` is locked only to read inputs or apply an outcome, never across a
/// backend call. Overlap on one tab is refused through the busy flags.
#[derive(Debug)]
pub struct Session {
    pub state: Mutex<SessionState>,
    busy: BusyFlags,
    last_seen: std::sync::Mutex<Instant>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::new()),
            busy: BusyFlags::default(),
            last_seen: std::sync::Mutex::new(Instant::now()),
        }
    }

    /// Claim `tab` for one request. `None` while another request on the
    /// same tab is still pending.
    pub fn try_begin(&self, tab: Tab) -> Option<BusyGuard<'_>> {
        let flag = self.busy.flag(tab);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { flag })
    }

    pub fn is_busy(&self, tab: Tab) -> bool {
        self.busy.flag(tab).load(Ordering::Acquire)
    }

    fn touch(&self) {
        let mut last = self.last_seen.lock().unwrap_or_else(|e| e.into_inner());
        *last = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }
}

/// A resolved session plus whether the cookie still has to be set.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub session: Arc<Session>,
    pub is_new: bool,
}

// ── Shared dashboard state ───────────────────────────────────────────

pub struct DashboardState {
    pub config: AppConfig,
    pub keys: KeyStatus,
    pub client: BackendClient,
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    idle_limit: Duration,
}

impl DashboardState {
    pub fn new(config: AppConfig, keys: KeyStatus) -> Self {
        let client = BackendClient::new(config.api_base_url.clone());
        let idle_limit = Duration::from_secs(config.session_idle_minutes.saturating_mul(60));
        Self {
            config,
            keys,
            client,
            sessions: RwLock::new(HashMap::new()),
            idle_limit,
        }
    }

    /// Find the caller's session from its cookie, or start a fresh one.
    ///
    /// Idle sessions are evicted here. An existing session is never reset.
    pub async fn resolve_session(&self, headers: &HeaderMap) -> SessionHandle {
        let requested = session_id_from_headers(headers);
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        let limit = self.idle_limit;
        sessions.retain(|_, session| session.idle_for() < limit);
        if sessions.len() < before {
            debug!("evicted {} idle session(s)", before - sessions.len());
        }

        if let Some(id) = requested {
            if let Some(session) = sessions.get(&id) {
                session.touch();
                return SessionHandle {
                    id,
                    session: Arc::clone(session),
                    is_new: false,
                };
            }
        }

        let id = Uuid::new_v4();
        let session = Arc::new(Session::new());
        sessions.insert(id, Arc::clone(&session));
        info!("started session {} ({} active)", id, sessions.len());
        SessionHandle {
            id,
            session,
            is_new: true,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Session id from the `lumabot_session` cookie, if present and well-formed.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// `Set-Cookie` value for a session. No Max-Age: it ends with the browser session.
pub fn session_cookie(id: Uuid) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn state() -> DashboardState {
        DashboardState::new(AppConfig::default(), KeyStatus::default())
    }

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_session_id_from_headers() {
        let id = Uuid::new_v4();
        let headers = cookie_headers(&format!("theme=dark; {SESSION_COOKIE}={id}; other=1"));
        assert_eq!(session_id_from_headers(&headers), Some(id));

        let garbage = cookie_headers(&format!("{SESSION_COOKIE}=not-a-uuid"));
        assert_eq!(session_id_from_headers(&garbage), None);
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_session_cookie_format() {
        let id = Uuid::nil();
        let cookie = session_cookie(id);
        assert!(cookie.starts_with("lumabot_session=00000000-0000-0000-0000-000000000000;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Max-Age"));
    }

    #[test]
    fn test_busy_guard_blocks_same_tab_only() {
        let session = Session::new();
        let guard = session.try_begin(Tab::Chat).unwrap();
        assert!(session.is_busy(Tab::Chat));
        assert!(session.try_begin(Tab::Chat).is_none());
        assert!(session.try_begin(Tab::Generation).is_some());

        drop(guard);
        assert!(!session.is_busy(Tab::Chat));
        assert!(session.try_begin(Tab::Chat).is_some());
    }

    #[tokio::test]
    async fn test_resolve_reuses_existing_session() {
        let state = state();
        let first = state.resolve_session(&HeaderMap::new()).await;
        assert!(first.is_new);

        first.session.state.lock().await.generated.push(crate::session::GeneratedImageEntry {
            prompt: "p".to_string(),
            url: "u".to_string(),
            size: crate::session::ImageSize::Square,
            timestamp: "t".to_string(),
        });

        let headers = cookie_headers(&format!("{SESSION_COOKIE}={}", first.id));
        let again = state.resolve_session(&headers).await;
        assert!(!again.is_new);
        assert_eq!(again.id, first.id);
        assert_eq!(again.session.state.lock().await.generated.len(), 1);
        assert_eq!(state.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_cookie_gets_fresh_session() {
        let state = state();
        let stale = Uuid::new_v4();
        let handle = state
            .resolve_session(&cookie_headers(&format!("{SESSION_COOKIE}={stale}")))
            .await;
        assert!(handle.is_new);
        assert_ne!(handle.id, stale);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let mut state = state();
        state.idle_limit = Duration::ZERO;
        let first = state.resolve_session(&HeaderMap::new()).await;

        let headers = cookie_headers(&format!("{SESSION_COOKIE}={}", first.id));
        let second = state.resolve_session(&headers).await;
        assert!(second.is_new);
        assert_ne!(second.id, first.id);
        assert_eq!(state.session_count().await, 1);
    }
}

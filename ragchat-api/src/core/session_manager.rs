use parking_lot::RwLock;
use ragchat_core::{ChatSession, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

struct LiveSession {
    session: Arc<ChatSession>,
    expires_at: Instant,
}

impl LiveSession {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Live chat sessions by id
///
/// A session lives for `ttl` after sign-in, like the token issued with it.
/// Expired sessions are no longer returned and are dropped by
/// [`SessionManager::remove_expired`].
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SessionId, LiveSession>>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn create_session(&self, user: &str, language: &str, welcome: &str) -> Arc<ChatSession> {
        let session = Arc::new(ChatSession::new(user, language, welcome));
        self.sessions.write().insert(
            session.session_id(),
            LiveSession {
                session: Arc::clone(&session),
                expires_at: Instant::now() + self.ttl,
            },
        );
        info!("Created session {} for {}", session.session_id(), user);
        session
    }

    pub fn get(&self, session_id: SessionId) -> Option<Arc<ChatSession>> {
        let now = Instant::now();
        self.sessions
            .read()
            .get(&session_id)
            .filter(|live| !live.is_expired(now))
            .map(|live| Arc::clone(&live.session))
    }

    pub fn remove(&self, session_id: SessionId) -> Option<Arc<ChatSession>> {
        self.sessions
            .write()
            .remove(&session_id)
            .map(|live| live.session)
    }

    /// Drop every expired session and hand them back for cleanup
    pub fn remove_expired(&self) -> Vec<Arc<ChatSession>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write();
        let expired: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, live)| live.is_expired(now))
            .map(|(id, _)| *id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| sessions.remove(&id))
            .map(|live| {
                debug!("Session {} of {} expired", live.session.session_id(), live.session.user());
                live.session
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }
}

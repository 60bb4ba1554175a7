//! Per-user chat session state

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{RagError, Result};
use crate::types::Message;

/// Opaque session identifier, assigned when the session is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a session is inside its current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    AwaitingQuestion,
    BuildingContext,
    Streaming,
    Finalizing,
}

/// A signed-in user's conversation
///
/// The message log always starts with the welcome message.
#[derive(Debug)]
pub struct ChatSession {
    user: String,
    session_id: SessionId,
    language: String,
    messages: RwLock<Vec<Message>>,
    phase: Mutex<TurnPhase>,
}

impl ChatSession {
    pub fn new(user: impl Into<String>, language: impl Into<String>, welcome: impl Into<String>) -> Self {
        Self::with_id(user, SessionId::new(), language, welcome)
    }

    pub fn with_id(
        user: impl Into<String>,
        session_id: SessionId,
        language: impl Into<String>,
        welcome: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            session_id,
            language: language.into(),
            messages: RwLock::new(vec![Message::assistant(welcome)]),
            phase: Mutex::new(TurnPhase::Idle),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Key under which chat history is stored: `{user}_{session_id}`
    pub fn session_key(&self) -> String {
        format!("{}_{}", self.user, self.session_id)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn push(&self, message: Message) {
        self.messages.write().push(message);
    }

    /// Drop the log and start again from the welcome message
    pub fn reset(&self, welcome: impl Into<String>) {
        let mut messages = self.messages.write();
        messages.clear();
        messages.push(Message::assistant(welcome));
        debug!("Reset message log of {}", self.session_key());
    }

    pub fn phase(&self) -> TurnPhase {
        *self.phase.lock()
    }

    /// Claim the session for one turn
    ///
    /// Fails with [`RagError::TurnInProgress`] while another turn holds it.
    pub fn begin_turn(self: &Arc<Self>) -> Result<TurnGuard> {
        let mut phase = self.phase.lock();
        if *phase != TurnPhase::Idle {
            return Err(RagError::TurnInProgress(self.session_key()));
        }
        *phase = TurnPhase::AwaitingQuestion;
        Ok(TurnGuard {
            session: Arc::clone(self),
        })
    }
}

/// Exclusive claim on a session's turn; the session returns to idle on drop
#[derive(Debug)]
pub struct TurnGuard {
    session: Arc<ChatSession>,
}

impl TurnGuard {
    pub fn advance(&self, phase: TurnPhase) {
        *self.session.phase.lock() = phase;
    }

    pub fn session(&self) -> &Arc<ChatSession> {
        &self.session
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        *self.session.phase.lock() = TurnPhase::Idle;
    }
}

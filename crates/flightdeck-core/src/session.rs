// ABOUTME: In-memory conversation state store keyed by session id.
// ABOUTME: Supports get-or-create, append, and clear, retaining only the most recent turns per session.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::turn::Turn;

/// Errors returned by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown session: {0}")]
    UnknownSession(String),
}

/// One conversation: its id and the turns appended so far, oldest first.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Conversation state for every live session. Owned explicitly by whoever
/// drives the orchestrator; there is no process-wide instance.
///
/// The lock is only held for map operations, never across tool calls, so
/// turns for distinct sessions do not wait on each other.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    max_turns: usize,
}

impl SessionStore {
    /// Create a store that keeps at most `max_turns` turns per session.
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Resolve a session for an incoming request. A missing or blank id
    /// allocates a fresh one; a supplied id that is unknown (never seen, or
    /// cleared) starts an empty session under that id. Supplied ids are used
    /// verbatim, surrounding whitespace included. Returns the id and a
    /// copy of the retained history in insertion order.
    pub async fn get_or_create(&self, session_id: Option<&str>) -> (String, Vec<Turn>) {
        let id = match session_id.filter(|s| !s.trim().is_empty()) {
            Some(id) => id.to_string(),
            None => Ulid::new().to_string(),
        };

        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&id) {
                return (id, session.turns.clone());
            }
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.clone()).or_insert_with(|| {
            tracing::debug!(session_id = %id, "session created");
            Session::new(id.clone())
        });
        (id, session.turns.clone())
    }

    /// Append a completed turn. Fails if the session was cleared while the
    /// turn was running.
    pub async fn append(&self, session_id: &str, turn: Turn) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))?;

        session.turns.push(turn);
        if session.turns.len() > self.max_turns {
            let excess = session.turns.len() - self.max_turns;
            session.turns.drain(..excess);
        }
        Ok(())
    }

    /// Discard a session and all of its history.
    pub async fn clear(&self, session_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(session_id) {
            Some(_) => {
                tracing::info!(session_id, "session cleared");
                Ok(())
            }
            None => Err(SessionError::UnknownSession(session_id.to_string())),
        }
    }

    /// Full retained history for a known session.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Turn>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|s| s.turns.clone())
            .ok_or_else(|| SessionError::UnknownSession(session_id.to_string()))
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(10)
    }
}

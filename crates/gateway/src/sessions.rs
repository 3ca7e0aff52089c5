//! In-memory browser session store.

use chrono::{DateTime, Utc};
use relaychat_core::session::{Session, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Maximum number of in-memory sessions before the least recently used is evicted.
pub const MAX_SESSIONS: usize = 1_000;

/// Longest client-supplied session id that is accepted as-is.
const MAX_SESSION_ID_LEN: usize = 64;

struct Entry {
    last_used: DateTime<Utc>,
    session: Arc<Mutex<Session>>,
}

/// Sessions keyed by id.
///
/// Each session sits behind its own lock, so turns on one session are
/// serialized while the store itself stays available.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    capacity: usize,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Look up a session by id, marking it as used.
    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_used = Utc::now();
        Some(entry.session.clone())
    }

    /// Return the session for `id`, creating it if needed.
    ///
    /// Unknown ids are adopted when they look like ids; otherwise a fresh
    /// id is generated.
    pub async fn get_or_create(&self, id: Option<&str>) -> (String, Arc<Mutex<Session>>) {
        let id = match id {
            Some(id) if is_valid_id(id) => id.to_string(),
            _ => SessionId::new().to_string(),
        };

        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(&id) {
            entry.last_used = Utc::now();
            return (id, entry.session.clone());
        }

        // Evict the least recently used session if at capacity
        if sessions.len() >= self.capacity {
            if let Some(idle_key) = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            {
                debug!(session_id = %idle_key, "Evicting least recently used session");
                sessions.remove(&idle_key);
            }
        }

        let session = Session::with_id(SessionId::from(&id));
        let entry = Entry {
            last_used: session.created_at(),
            session: Arc::new(Mutex::new(session)),
        };
        let handle = entry.session.clone();
        sessions.insert(id.clone(), entry);
        (id, handle)
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
        Self::new()
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

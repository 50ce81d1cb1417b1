use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// One authenticated dashboard session, bridging the browser's bearer
/// token to the caller's appliance session token.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub scanner_token: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory session registry. Sessions live for the lifetime of the
/// process; a restart signs everyone out.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Registers a session and returns the bearer token handed to the
    /// browser.
    pub fn create(&self, username: &str, scanner_token: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                scanner_token: scanner_token.to_string(),
                created_at: Utc::now(),
            },
        );
        token
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        self.sessions.remove(token).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

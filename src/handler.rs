use std::sync::Arc;

use chrono::Duration;

use crate::audit::AuditLog;
use crate::db::Repository;
use crate::session::SessionStore;

/// Shared state handed to every request handler.
pub struct AppData {
    pub repo: Arc<dyn Repository>,
    pub sessions: SessionStore,
    pub audit: Arc<dyn AuditLog>,
}

impl AppData {
    pub fn new(repo: Arc<dyn Repository>, audit: Arc<dyn AuditLog>, session_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            repo,
            sessions: SessionStore::new(session_ttl),
            audit,
        })
    }

    /// Drains flash messages for the session, if there is one.
    pub fn take_messages(&self, token: Option<&str>) -> Vec<crate::session::Message> {
        match token {
            None => Vec::new(),
            Some(v) => self.sessions.take_messages(v),
        }
    }
}

use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuditEvent {
    Login { username: String, ip: String },
    Logout { username: String, ip: String },
    LoginFailed { username: String, ip: String },
    Vote { username: String, id_question: i32, ip: String },
}

/// Sink for account and voting events.
pub trait AuditLog: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes audit events to `tracing` under the `polls::audit` target.
#[derive(Default)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn record(&self, event: AuditEvent) {
        match event {
            AuditEvent::Login { username, ip } => {
                info!(target: "polls::audit", %username, %ip, "User logged in.");
            }
            AuditEvent::Logout { username, ip } => {
                info!(target: "polls::audit", %username, %ip, "User logged out.");
            }
            AuditEvent::LoginFailed { username, ip } => {
                warn!(target: "polls::audit", %username, %ip, "Failed login attempt.");
            }
            AuditEvent::Vote { username, id_question, ip } => {
                info!(target: "polls::audit", %username, id_question, %ip, "User voted.");
            }
        }
    }
}

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method};
use axum::response::Redirect;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::db::schema::Account;
use crate::handler::AppData;
use crate::support::password::random_hex;

pub const SESSION_COOKIE: &str = "polls_session";

/// Two weeks of inactivity.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 14 * 24 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct Session {
    pub id_account: i32,
    pub username: String,
    pub messages: Vec<Message>,
    pub last_seen: DateTime<Utc>,
}

/// Logged-in sessions keyed by cookie token. A session that goes unused for
/// longer than the TTL stops authenticating and is dropped.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn create(&self, account: &Account) -> String {
        self.create_at(account, Utc::now())
    }

    /// Expired sessions are pruned on every login.
    pub fn create_at(&self, account: &Account, now: DateTime<Utc>) -> String {
        let cutoff = now - self.ttl;
        self.sessions.retain(|_, session| session.last_seen > cutoff);

        let token = random_hex(32);

        self.sessions.insert(token.clone(), Session {
            id_account: account.id,
            username: account.username.clone(),
            messages: Vec::new(),
            last_seen: now,
        });

        token
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.get_at(token, Utc::now())
    }

    /// Returns the live session and marks it as seen at `now`.
    pub fn get_at(&self, token: &str, now: DateTime<Utc>) -> Option<Session> {
        match self.sessions.get_mut(token) {
            None => return None,
            Some(mut session) if now - session.last_seen <= self.ttl => {
                session.last_seen = now;
                return Some(session.value().clone());
            }
            Some(_) => {}
        }

        self.sessions.remove(token);
        None
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        self.sessions.remove(token).map(|(_, session)| session)
    }

    pub fn push_message(&self, token: &str, level: Level, text: impl Into<String>) {
        if let Some(mut session) = self.sessions.get_mut(token) {
            session.messages.push(Message { level, text: text.into() });
        }
    }

    pub fn take_messages(&self, token: &str) -> Vec<Message> {
        match self.sessions.get_mut(token) {
            None => Vec::new(),
            Some(mut session) => std::mem::take(&mut session.messages),
        }
    }
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers.get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_owned())
}

pub fn session_cookie(token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token)
}

pub fn expired_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// The logged-in account behind the request's session cookie.
#[derive(Clone, Debug)]
pub struct SessionUser {
    pub token: String,
    pub id_account: i32,
    pub username: String,
}

fn lookup(parts: &Parts, data: &AppData) -> Option<SessionUser> {
    let token = token_from_headers(&parts.headers)?;
    let session = data.sessions.get(&token)?;

    Some(SessionUser {
        token,
        id_account: session.id_account,
        username: session.username,
    })
}

/// Resolves to `None` for anonymous requests.
pub struct MaybeUser(pub Option<SessionUser>);

impl FromRequestParts<Arc<AppData>> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, data: &Arc<AppData>) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(lookup(parts, data)))
    }
}

/// Requires a session; anonymous requests are sent to the login page.
pub struct AuthUser(pub SessionUser);

impl FromRequestParts<Arc<AppData>> for AuthUser {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, data: &Arc<AppData>) -> Result<Self, Self::Rejection> {
        match lookup(parts, data) {
            Some(user) => Ok(AuthUser(user)),
            None => Err(Redirect::to(&format!("/accounts/login/?next={}", return_path(&parts.method, parts.uri.path())))),
        }
    }
}

/// Where to come back to after logging in. Form posts return to the page that
/// submitted them, one segment up.
fn return_path(method: &Method, path: &str) -> String {
    if method == Method::GET || method == Method::HEAD {
        return path.to_owned();
    }

    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => format!("{}/", parent),
        _ => "/".to_owned(),
    }
}

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tracing::info;

use crate::audit::AuditEvent;
use crate::error::AppError;
use crate::handler::AppData;
use crate::session::{expired_session_cookie, session_cookie, token_from_headers, MaybeUser};
use crate::support::client_ip::ClientIp;
use crate::support::html::{escape, page};
use crate::support::password::verify_password;

pub const INVALID_LOGIN: &str = "Invalid username or password.";

#[derive(Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    next: Option<String>,
}

/// Only same-site paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(v) if v.starts_with('/') && !v.starts_with("//") => v,
        _ => "/polls/",
    }
}

fn render_login(next: &str, error_message: Option<&str>) -> Html<String> {
    let mut body = String::from("<h1>Log in</h1>\n");

    if let Some(v) = error_message {
        body.push_str(&format!("<p class=\"error\">{}</p>\n", escape(v)));
    }

    body.push_str(&format!(
        "<form action=\"/accounts/login/\" method=\"post\">\n\
         <label>Username <input type=\"text\" name=\"username\"></label><br>\n\
         <label>Password <input type=\"password\" name=\"password\"></label><br>\n\
         <input type=\"hidden\" name=\"next\" value=\"{}\">\n\
         <input type=\"submit\" value=\"Log in\">\n</form>\n",
        escape(next)
    ));

    page("Log in", None, &[], &body)
}

pub async fn login_form(Query(query): Query<NextQuery>, MaybeUser(user): MaybeUser) -> Response {
    let next = safe_next(query.next.as_deref());

    match user {
        Some(_) => Redirect::to(next).into_response(),
        None => render_login(next, None).into_response(),
    }
}

pub async fn login(
    State(data): State<Arc<AppData>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref()).to_owned();
    let username = form.username.trim();

    let account = match data.repo.find_account(username).await? {
        Some(v) if verify_password(&form.password, &v.password_hash) => v,
        _ => {
            data.audit.record(AuditEvent::LoginFailed {
                username: username.to_owned(),
                ip,
            });
            return Ok(render_login(&next, Some(INVALID_LOGIN)).into_response());
        }
    };

    if let Some(previous) = token_from_headers(&headers) {
        data.sessions.remove(&previous);
    }

    let token = data.sessions.create(&account);
    data.audit.record(AuditEvent::Login {
        username: account.username.clone(),
        ip,
    });

    Ok((
        [(header::SET_COOKIE, session_cookie(&token))],
        Redirect::to(&next),
    ).into_response())
}

pub async fn logout(
    State(data): State<Arc<AppData>>,
    MaybeUser(user): MaybeUser,
    ClientIp(ip): ClientIp,
) -> Response {
    match user {
        None => {
            info!(%ip, "Logout requested without a session.");
        }
        Some(v) => {
            data.sessions.remove(&v.token);
            data.audit.record(AuditEvent::Logout {
                username: v.username,
                ip,
            });
        }
    }

    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Redirect::to("/polls/"),
    ).into_response()
}

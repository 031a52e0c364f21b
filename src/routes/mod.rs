use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::handler::AppData;

pub mod accounts;
pub mod polls;

pub fn router(data: Arc<AppData>) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/polls/") }))
        .route("/polls/", get(polls::index))
        .route("/polls/{id_question}/", get(polls::detail))
        .route("/polls/{id_question}/results/", get(polls::results))
        .route("/polls/{id_question}/vote/", post(polls::vote))
        .route("/accounts/login/", get(accounts::login_form).post(accounts::login))
        .route("/accounts/logout/", post(accounts::logout))
        .layer(TraceLayer::new_for_http())
        .with_state(data)
}

/// The `{id_question}` path segment. Anything that isn't an id is treated
/// like an id that doesn't exist.
pub struct QuestionId(pub i32);

impl<S: Send + Sync> FromRequestParts<S> for QuestionId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<i32>::from_request_parts(parts, state).await {
            Ok(Path(v)) => Ok(QuestionId(v)),
            Err(_) => Err(AppError::NotFound),
        }
    }
}

pub fn results_path(id_question: i32) -> String {
    format!("/polls/{}/results/", id_question)
}

pub fn detail_path(id_question: i32) -> String {
    format!("/polls/{}/", id_question)
}

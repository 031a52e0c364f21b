use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use chrono::Utc;
use tracing::info;

use crate::audit::AuditEvent;
use crate::db::schema::{Choice, Question};
use crate::error::AppError;
use crate::handler::AppData;
use crate::routes::{detail_path, results_path, QuestionId};
use crate::session::{AuthUser, Level, MaybeUser, Message, SessionUser};
use crate::support::client_ip::ClientIp;
use crate::support::html::{escape, page};

pub const NO_POLLS: &str = "No polls are available.";
pub const NO_CHOICE: &str = "You didn't select a choice.";
pub const VOTING_NOT_ALLOWED: &str = "Voting is not allowed for this poll.";
pub const VOTE_RECORDED: &str = "Your vote was recorded.";

fn username(user: &Option<SessionUser>) -> Option<&str> {
    user.as_ref().map(|v| v.username.as_str())
}

pub async fn index(
    State(data): State<Arc<AppData>>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    let now = Utc::now();
    let questions = data.repo.find_published_questions(now).await?;
    let messages = data.take_messages(user.as_ref().map(|v| v.token.as_str()));

    let mut body = String::from("<h1>Polls</h1>\n");

    if questions.is_empty() {
        body.push_str(&format!("<p>{}</p>\n", NO_POLLS));
    } else {
        body.push_str("<ul class=\"questions\">\n");
        for question in &questions {
            body.push_str(&format!(
                "<li><a href=\"{}\">{}</a>",
                detail_path(question.id), escape(&question.question_text)
            ));
            if question.was_published_recently_at(now) {
                body.push_str(" <em>new</em>");
            }
            if question.can_vote_at(now) {
                body.push_str(" (open)");
            } else {
                body.push_str(&format!(" (closed, <a href=\"{}\">results</a>)", results_path(question.id)));
            }
            body.push_str("</li>\n");
        }
        body.push_str("</ul>\n");
    }

    Ok(page("Polls", username(&user), &messages, &body))
}

fn render_detail(
    question: &Question,
    choices: &[Choice],
    previous: Option<i32>,
    error_message: Option<&str>,
    user: &Option<SessionUser>,
    messages: &[Message],
) -> Html<String> {
    let mut body = format!("<h1>{}</h1>\n", escape(&question.question_text));

    if let Some(v) = error_message {
        body.push_str(&format!("<p class=\"error\"><strong>{}</strong></p>\n", escape(v)));
    }

    if !question.can_vote() {
        body.push_str("<p>Voting is closed for this poll.</p>\n");
    }

    body.push_str(&format!("<form action=\"/polls/{}/vote/\" method=\"post\">\n", question.id));
    for choice in choices {
        let checked = if previous == Some(choice.id) { " checked" } else { "" };
        body.push_str(&format!(
            "<input type=\"radio\" name=\"choice\" id=\"choice{id}\" value=\"{id}\"{checked}>\
             <label for=\"choice{id}\">{text}</label><br>\n",
            id = choice.id, checked = checked, text = escape(&choice.choice_text)
        ));
    }
    body.push_str("<input type=\"submit\" value=\"Vote\">\n</form>\n");
    body.push_str(&format!("<a href=\"{}\">View results</a>\n", results_path(question.id)));

    page(&question.question_text, username(user), messages, &body)
}

async fn previous_choice(data: &AppData, user: &Option<SessionUser>, id_question: i32) -> anyhow::Result<Option<i32>> {
    match user {
        None => Ok(None),
        Some(v) => Ok(data.repo.find_vote(v.id_account, id_question).await?.map(|vote| vote.id_choice)),
    }
}

pub async fn detail(
    State(data): State<Arc<AppData>>,
    QuestionId(id_question): QuestionId,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    let question = data.repo.find_published_question(id_question, Utc::now()).await?
        .ok_or(AppError::NotFound)?;

    let choices = data.repo.find_choices(question.id).await?;
    let previous = previous_choice(&data, &user, question.id).await?;
    let messages = data.take_messages(user.as_ref().map(|v| v.token.as_str()));

    Ok(render_detail(&question, &choices, previous, None, &user, &messages))
}

pub async fn results(
    State(data): State<Arc<AppData>>,
    QuestionId(id_question): QuestionId,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    let question = data.repo.find_question(id_question).await?
        .ok_or(AppError::NotFound)?;

    let tally = data.repo.tally(question.id).await?;
    let messages = data.take_messages(user.as_ref().map(|v| v.token.as_str()));

    let mut body = format!("<h1>{}</h1>\n<ul class=\"results\">\n", escape(&question.question_text));
    for row in &tally {
        body.push_str(&format!(
            "<li>{} -- {} vote{}</li>\n",
            escape(&row.choice.choice_text), row.votes, if row.votes == 1 { "" } else { "s" }
        ));
    }
    body.push_str("</ul>\n");
    body.push_str(&format!("<a href=\"{}\">Vote again?</a> <a href=\"/polls/\">Back to polls</a>\n", detail_path(question.id)));

    Ok(page(&question.question_text, username(&user), &messages, &body))
}

pub async fn vote(
    State(data): State<Arc<AppData>>,
    QuestionId(id_question): QuestionId,
    AuthUser(user): AuthUser,
    ClientIp(ip): ClientIp,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let question = data.repo.find_question(id_question).await?
        .ok_or(AppError::NotFound)?;

    let selected = match form.get("choice").and_then(|v| v.trim().parse::<i32>().ok()) {
        None => None,
        Some(id_choice) => data.repo.find_choice(question.id, id_choice).await?,
    };

    let selected = match selected {
        None => {
            if !question.is_published() {
                return Err(AppError::NotFound);
            }

            info!(id_question = question.id, username = %user.username, "Vote submitted without a valid choice.");

            let choices = data.repo.find_choices(question.id).await?;
            let user = Some(user);
            let previous = previous_choice(&data, &user, question.id).await?;

            return Ok(render_detail(&question, &choices, previous, Some(NO_CHOICE), &user, &[]).into_response());
        }
        Some(v) => v,
    };

    if !question.can_vote() {
        info!(id_question = question.id, username = %user.username, "User attempted to vote outside the voting window.");
        data.sessions.push_message(&user.token, Level::Warning, VOTING_NOT_ALLOWED);

        return Ok(Redirect::to(&results_path(question.id)).into_response());
    }

    match data.repo.find_vote(user.id_account, question.id).await? {
        Some(existing) => {
            data.repo.update_vote_choice(existing.id, selected.id).await?;
        }
        None => {
            data.repo.add_vote(question.id, selected.id, user.id_account).await?;
        }
    }

    data.sessions.push_message(&user.token, Level::Success, VOTE_RECORDED);
    data.audit.record(AuditEvent::Vote {
        username: user.username.clone(),
        id_question: question.id,
        ip,
    });

    Ok(Redirect::to(&results_path(question.id)).into_response())
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::schema::{Account, Choice, ChoiceTally, Question, Vote};

pub mod dbclient;
pub mod memory;
pub mod model;
pub mod schema;

/// Storage operations the request handlers rely on.
///
/// Nothing here enforces one vote per (question, account); callers check with
/// [`Repository::find_vote`] before writing.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Questions with `pub_date <= now`, newest first.
    async fn find_published_questions(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Question>>;

    async fn find_question(&self, id_question: i32) -> anyhow::Result<Option<Question>>;

    async fn find_published_question(&self, id_question: i32, now: DateTime<Utc>) -> anyhow::Result<Option<Question>>;

    async fn find_choices(&self, id_question: i32) -> anyhow::Result<Vec<Choice>>;

    /// Only returns the choice if it belongs to `id_question`.
    async fn find_choice(&self, id_question: i32, id_choice: i32) -> anyhow::Result<Option<Choice>>;

    /// Every choice of the question with its vote count, in choice order.
    async fn tally(&self, id_question: i32) -> anyhow::Result<Vec<ChoiceTally>>;

    async fn find_vote(&self, id_account: i32, id_question: i32) -> anyhow::Result<Option<Vote>>;

    async fn add_vote(&self, id_question: i32, id_choice: i32, id_account: i32) -> anyhow::Result<Vote>;

    async fn update_vote_choice(&self, id_vote: i32, id_choice: i32) -> anyhow::Result<()>;

    async fn add_question(
        &self,
        question_text: &str,
        pub_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        choices: &[String],
    ) -> anyhow::Result<(Question, Vec<Choice>)>;

    /// Removes the question along with its choices and votes.
    async fn delete_question(&self, id_question: i32) -> anyhow::Result<bool>;

    async fn find_account(&self, username: &str) -> anyhow::Result<Option<Account>>;

    async fn add_account(&self, username: &str, password_hash: &str) -> anyhow::Result<Account>;
}

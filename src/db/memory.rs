use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use tokio::sync::Mutex;

use crate::db::schema::{Account, Choice, ChoiceTally, Question, Vote};
use crate::db::Repository;

#[derive(Default)]
struct Tables {
    next_id: i32,
    questions: BTreeMap<i32, Question>,
    choices: BTreeMap<i32, Choice>,
    votes: BTreeMap<i32, Vote>,
    accounts: BTreeMap<i32, Account>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store with the same semantics as the Postgres schema,
/// including cascading deletes.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn count_votes(&self) -> usize {
        self.tables.lock().await.votes.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_published_questions(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Question>> {
        let tables = self.tables.lock().await;

        Ok(tables.questions.values()
            .filter(|q| q.is_published_at(now))
            .sorted_by(|a, b| b.pub_date.cmp(&a.pub_date))
            .cloned()
            .collect())
    }

    async fn find_question(&self, id_question: i32) -> anyhow::Result<Option<Question>> {
        Ok(self.tables.lock().await.questions.get(&id_question).cloned())
    }

    async fn find_published_question(&self, id_question: i32, now: DateTime<Utc>) -> anyhow::Result<Option<Question>> {
        let tables = self.tables.lock().await;

        Ok(tables.questions.get(&id_question)
            .filter(|q| q.is_published_at(now))
            .cloned())
    }

    async fn find_choices(&self, id_question: i32) -> anyhow::Result<Vec<Choice>> {
        let tables = self.tables.lock().await;

        Ok(tables.choices.values()
            .filter(|c| c.id_question == id_question)
            .cloned()
            .collect())
    }

    async fn find_choice(&self, id_question: i32, id_choice: i32) -> anyhow::Result<Option<Choice>> {
        let tables = self.tables.lock().await;

        Ok(tables.choices.get(&id_choice)
            .filter(|c| c.id_question == id_question)
            .cloned())
    }

    async fn tally(&self, id_question: i32) -> anyhow::Result<Vec<ChoiceTally>> {
        let tables = self.tables.lock().await;

        let counts = tables.votes.values()
            .filter(|v| v.id_question == id_question)
            .counts_by(|v| v.id_choice);

        Ok(tables.choices.values()
            .filter(|c| c.id_question == id_question)
            .map(|c| ChoiceTally {
                choice: c.clone(),
                votes: counts.get(&c.id).copied().unwrap_or(0) as i64,
            })
            .collect())
    }

    async fn find_vote(&self, id_account: i32, id_question: i32) -> anyhow::Result<Option<Vote>> {
        let tables = self.tables.lock().await;

        Ok(tables.votes.values()
            .find(|v| v.id_account == id_account && v.id_question == id_question)
            .cloned())
    }

    async fn add_vote(&self, id_question: i32, id_choice: i32, id_account: i32) -> anyhow::Result<Vote> {
        let mut tables = self.tables.lock().await;

        if !tables.questions.contains_key(&id_question) {
            anyhow::bail!("question {} does not exist", id_question);
        }
        if !tables.choices.contains_key(&id_choice) {
            anyhow::bail!("choice {} does not exist", id_choice);
        }
        if !tables.accounts.contains_key(&id_account) {
            anyhow::bail!("account {} does not exist", id_account);
        }

        let vote = Vote {
            id: tables.next_id(),
            id_question,
            id_choice,
            id_account,
        };
        tables.votes.insert(vote.id, vote.clone());

        Ok(vote)
    }

    async fn update_vote_choice(&self, id_vote: i32, id_choice: i32) -> anyhow::Result<()> {
        let mut tables = self.tables.lock().await;

        if !tables.choices.contains_key(&id_choice) {
            anyhow::bail!("choice {} does not exist", id_choice);
        }
        if let Some(vote) = tables.votes.get_mut(&id_vote) {
            vote.id_choice = id_choice;
        }

        Ok(())
    }

    async fn add_question(
        &self,
        question_text: &str,
        pub_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        choices: &[String],
    ) -> anyhow::Result<(Question, Vec<Choice>)> {
        let mut tables = self.tables.lock().await;

        let question = Question {
            id: tables.next_id(),
            question_text: question_text.to_owned(),
            pub_date,
            end_date,
        };
        tables.questions.insert(question.id, question.clone());

        let mut choice_result = Vec::new();
        for choice_text in choices {
            let choice = Choice {
                id: tables.next_id(),
                id_question: question.id,
                choice_text: choice_text.to_owned(),
            };
            tables.choices.insert(choice.id, choice.clone());
            choice_result.push(choice);
        }

        Ok((question, choice_result))
    }

    async fn delete_question(&self, id_question: i32) -> anyhow::Result<bool> {
        let mut tables = self.tables.lock().await;

        if tables.questions.remove(&id_question).is_none() {
            return Ok(false);
        }
        tables.choices.retain(|_, c| c.id_question != id_question);
        tables.votes.retain(|_, v| v.id_question != id_question);

        Ok(true)
    }

    async fn find_account(&self, username: &str) -> anyhow::Result<Option<Account>> {
        let tables = self.tables.lock().await;

        Ok(tables.accounts.values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn add_account(&self, username: &str, password_hash: &str) -> anyhow::Result<Account> {
        let mut tables = self.tables.lock().await;

        if tables.accounts.values().any(|a| a.username == username) {
            anyhow::bail!("account '{}' already exists", username);
        }

        let account = Account {
            id: tables.next_id(),
            username: username.to_owned(),
            password_hash: password_hash.to_owned(),
        };
        tables.accounts.insert(account.id, account.clone());

        Ok(account)
    }
}

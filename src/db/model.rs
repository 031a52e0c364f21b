use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, PgPool};
use tokio_stream::StreamExt;

use crate::db::dbclient::DBClient;
use crate::db::schema::{Account, Choice, ChoiceTally, Question, Vote};
use crate::db::Repository;

#[derive(sqlx::FromRow)]
struct TallyRow {
    id: i32,
    id_question: i32,
    choice_text: String,
    votes: i64,
}

pub async fn find_published_questions(conn: &PgPool, now: DateTime<Utc>) -> anyhow::Result<Vec<Question>> {
    let mut stream = query_as::<_, Question>(
        "SELECT id, question_text, pub_date, end_date FROM question WHERE pub_date <= $1 ORDER BY pub_date DESC;")
        .bind(now)
        .fetch(conn);

    let mut result = Vec::new();
    while let Some(row) = stream.try_next().await? {
        result.push(row);
    }

    Ok(result)
}

pub async fn find_question(conn: &PgPool, id_question: i32) -> anyhow::Result<Option<Question>> {
    let r = query_as::<_, Question>("SELECT id, question_text, pub_date, end_date FROM question WHERE id=$1;")
        .bind(id_question)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn find_published_question(conn: &PgPool, id_question: i32, now: DateTime<Utc>) -> anyhow::Result<Option<Question>> {
    let r = query_as::<_, Question>(
        "SELECT id, question_text, pub_date, end_date FROM question WHERE id=$1 AND pub_date <= $2;")
        .bind(id_question)
        .bind(now)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn find_choices(conn: &PgPool, id_question: i32) -> anyhow::Result<Vec<Choice>> {
    let r = query_as::<_, Choice>("SELECT id, id_question, choice_text FROM choice WHERE id_question=$1 ORDER BY id;")
        .bind(id_question)
        .fetch_all(conn)
        .await?;

    Ok(r)
}

pub async fn find_choice(conn: &PgPool, id_question: i32, id_choice: i32) -> anyhow::Result<Option<Choice>> {
    let r = query_as::<_, Choice>("SELECT id, id_question, choice_text FROM choice WHERE id=$1 AND id_question=$2;")
        .bind(id_choice)
        .bind(id_question)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn tally(conn: &PgPool, id_question: i32) -> anyhow::Result<Vec<ChoiceTally>> {
    let mut stream = query_as::<_, TallyRow>(
        "SELECT c.id, c.id_question, c.choice_text, COUNT(v.id) AS votes
         FROM choice c LEFT JOIN vote v ON v.id_choice = c.id
         WHERE c.id_question=$1
         GROUP BY c.id, c.id_question, c.choice_text
         ORDER BY c.id;")
        .bind(id_question)
        .fetch(conn);

    let mut result = Vec::new();
    while let Some(row) = stream.try_next().await? {
        result.push(ChoiceTally {
            choice: Choice {
                id: row.id,
                id_question: row.id_question,
                choice_text: row.choice_text,
            },
            votes: row.votes,
        });
    }

    Ok(result)
}

pub async fn find_vote(conn: &PgPool, id_account: i32, id_question: i32) -> anyhow::Result<Option<Vote>> {
    let r = query_as::<_, Vote>(
        "SELECT id, id_question, id_choice, id_account FROM vote WHERE id_account=$1 AND id_question=$2 ORDER BY id LIMIT 1;")
        .bind(id_account)
        .bind(id_question)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn add_vote(conn: &PgPool, id_question: i32, id_choice: i32, id_account: i32) -> anyhow::Result<Vote> {
    let r = query_as::<_, Vote>(
        "INSERT INTO vote (id_question, id_choice, id_account)
         VALUES ($1, $2, $3)
         RETURNING id, id_question, id_choice, id_account;")
        .bind(id_question)
        .bind(id_choice)
        .bind(id_account)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn update_vote_choice(conn: &PgPool, id_vote: i32, id_choice: i32) -> anyhow::Result<()> {
    query("UPDATE vote SET id_choice=$1 WHERE id=$2;")
        .bind(id_choice)
        .bind(id_vote)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn add_question(
    conn: &PgPool,
    question_text: &str,
    pub_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    choices: &[String],
) -> anyhow::Result<(Question, Vec<Choice>)> {
    let mut tx = conn.begin().await?;

    let question = query_as::<_, Question>(
        "INSERT INTO question (question_text, pub_date, end_date)
         VALUES ($1, $2, $3)
         RETURNING id, question_text, pub_date, end_date;")
        .bind(question_text)
        .bind(pub_date)
        .bind(end_date)
        .fetch_one(&mut *tx)
        .await?;

    let mut choice_result = Vec::new();

    for choice_text in choices {
        let choice = query_as::<_, Choice>(
            "INSERT INTO choice (id_question, choice_text)
             VALUES ($1, $2)
             RETURNING id, id_question, choice_text;")
            .bind(question.id)
            .bind(choice_text)
            .fetch_one(&mut *tx)
            .await?;

        choice_result.push(choice);
    }

    tx.commit().await?;

    Ok((question, choice_result))
}

pub async fn delete_question(conn: &PgPool, id_question: i32) -> anyhow::Result<bool> {
    let r = query("DELETE FROM question WHERE id=$1;")
        .bind(id_question)
        .execute(conn)
        .await?;

    Ok(r.rows_affected() > 0)
}

pub async fn find_account(conn: &PgPool, username: &str) -> anyhow::Result<Option<Account>> {
    let r = query_as::<_, Account>("SELECT id, username, password_hash FROM account WHERE username=$1;")
        .bind(username)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn add_account(conn: &PgPool, username: &str, password_hash: &str) -> anyhow::Result<Account> {
    let r = query_as::<_, Account>(
        "INSERT INTO account (username, password_hash)
         VALUES ($1, $2)
         RETURNING id, username, password_hash;")
        .bind(username)
        .bind(password_hash)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

#[async_trait]
impl Repository for DBClient {
    async fn find_published_questions(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Question>> {
        find_published_questions(self.conn(), now).await
    }

    async fn find_question(&self, id_question: i32) -> anyhow::Result<Option<Question>> {
        find_question(self.conn(), id_question).await
    }

    async fn find_published_question(&self, id_question: i32, now: DateTime<Utc>) -> anyhow::Result<Option<Question>> {
        find_published_question(self.conn(), id_question, now).await
    }

    async fn find_choices(&self, id_question: i32) -> anyhow::Result<Vec<Choice>> {
        find_choices(self.conn(), id_question).await
    }

    async fn find_choice(&self, id_question: i32, id_choice: i32) -> anyhow::Result<Option<Choice>> {
        find_choice(self.conn(), id_question, id_choice).await
    }

    async fn tally(&self, id_question: i32) -> anyhow::Result<Vec<ChoiceTally>> {
        tally(self.conn(), id_question).await
    }

    async fn find_vote(&self, id_account: i32, id_question: i32) -> anyhow::Result<Option<Vote>> {
        find_vote(self.conn(), id_account, id_question).await
    }

    async fn add_vote(&self, id_question: i32, id_choice: i32, id_account: i32) -> anyhow::Result<Vote> {
        add_vote(self.conn(), id_question, id_choice, id_account).await
    }

    async fn update_vote_choice(&self, id_vote: i32, id_choice: i32) -> anyhow::Result<()> {
        update_vote_choice(self.conn(), id_vote, id_choice).await
    }

    async fn add_question(
        &self,
        question_text: &str,
        pub_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        choices: &[String],
    ) -> anyhow::Result<(Question, Vec<Choice>)> {
        add_question(self.conn(), question_text, pub_date, end_date, choices).await
    }

    async fn delete_question(&self, id_question: i32) -> anyhow::Result<bool> {
        delete_question(self.conn(), id_question).await
    }

    async fn find_account(&self, username: &str) -> anyhow::Result<Option<Account>> {
        find_account(self.conn(), username).await
    }

    async fn add_account(&self, username: &str, password_hash: &str) -> anyhow::Result<Account> {
        add_account(self.conn(), username, password_hash).await
    }
}

/// These run against a real Postgres when `POLLS_TEST_DATABASE_URL` is set and
/// are skipped otherwise.
#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::support::password::random_hex;

    use super::*;

    async fn connect() -> Option<DBClient> {
        let url = match std::env::var("POLLS_TEST_DATABASE_URL") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => {
                eprintln!("POLLS_TEST_DATABASE_URL not set, skipping");
                return None;
            }
        };

        Some(DBClient::new(&url, 2).await.unwrap())
    }

    fn opts(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    async fn account(conn: &PgPool) -> Account {
        add_account(conn, &format!("user-{}", random_hex(8)), "x").await.unwrap()
    }

    #[tokio::test]
    async fn tally_includes_choices_without_votes() {
        let Some(db) = connect().await else { return };
        let conn = db.conn();
        let now = Utc::now();

        let (q, c) = add_question(conn, "Tally?", now, now + Duration::days(1), &opts(&["a", "b", "c"])).await.unwrap();
        let alice = account(conn).await;
        let bob = account(conn).await;
        add_vote(conn, q.id, c[2].id, alice.id).await.unwrap();
        add_vote(conn, q.id, c[2].id, bob.id).await.unwrap();

        let counts = tally(conn, q.id).await.unwrap()
            .into_iter()
            .map(|t| (t.choice.id, t.votes))
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![(c[0].id, 0), (c[1].id, 0), (c[2].id, 2)]);

        delete_question(conn, q.id).await.unwrap();
    }

    #[tokio::test]
    async fn find_vote_returns_oldest_row() {
        let Some(db) = connect().await else { return };
        let conn = db.conn();
        let now = Utc::now();

        let (q, c) = add_question(conn, "Oldest?", now, now + Duration::days(1), &opts(&["a", "b"])).await.unwrap();
        let alice = account(conn).await;
        let first = add_vote(conn, q.id, c[0].id, alice.id).await.unwrap();
        add_vote(conn, q.id, c[1].id, alice.id).await.unwrap();

        let found = find_vote(conn, alice.id, q.id).await.unwrap().unwrap();
        assert_eq!(found.id, first.id);

        update_vote_choice(conn, found.id, c[1].id).await.unwrap();
        let counts = tally(conn, q.id).await.unwrap();
        assert_eq!((counts[0].votes, counts[1].votes), (0, 2));

        delete_question(conn, q.id).await.unwrap();
    }

    #[tokio::test]
    async fn failed_question_insert_rolls_back() {
        let Some(db) = connect().await else { return };
        let conn = db.conn();
        let now = Utc::now();
        let text = format!("Rollback {}", random_hex(8));

        let too_long = "x".repeat(201);
        assert!(add_question(conn, &text, now, now, &[too_long]).await.is_err());

        let stored = find_published_questions(conn, now + Duration::seconds(1)).await.unwrap();
        assert!(!stored.iter().any(|q| q.question_text == text));
    }

    #[tokio::test]
    async fn delete_question_cascades_in_postgres() {
        let Some(db) = connect().await else { return };
        let conn = db.conn();
        let now = Utc::now();

        let (q, c) = add_question(conn, "Cascade?", now, now, &opts(&["a"])).await.unwrap();
        let alice = account(conn).await;
        add_vote(conn, q.id, c[0].id, alice.id).await.unwrap();

        assert!(delete_question(conn, q.id).await.unwrap());
        assert!(find_question(conn, q.id).await.unwrap().is_none());
        assert!(find_choices(conn, q.id).await.unwrap().is_empty());
        assert!(find_vote(conn, alice.id, q.id).await.unwrap().is_none());
        assert!(!delete_question(conn, q.id).await.unwrap());
    }
}

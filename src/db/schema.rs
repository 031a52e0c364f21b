use std::fmt;

use chrono::{DateTime, Duration, Utc};

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Question {
    pub id: i32,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl Question {
    /// True when `pub_date` falls within the day leading up to `now`, inclusive at both ends.
    pub fn was_published_recently_at(&self, now: DateTime<Utc>) -> bool {
        now - Duration::days(1) <= self.pub_date && self.pub_date <= now
    }

    pub fn was_published_recently(&self) -> bool {
        self.was_published_recently_at(Utc::now())
    }

    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.pub_date
    }

    pub fn is_published(&self) -> bool {
        self.is_published_at(Utc::now())
    }

    /// Votes are accepted in `[pub_date, end_date]`.
    pub fn can_vote_at(&self, now: DateTime<Utc>) -> bool {
        self.pub_date <= now && now <= self.end_date
    }

    pub fn can_vote(&self) -> bool {
        self.can_vote_at(Utc::now())
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.question_text)
    }
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Choice {
    pub id: i32,
    pub id_question: i32,
    pub choice_text: String,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.choice_text)
    }
}

/// A choice together with the number of votes currently pointing at it.
#[derive(Clone, Debug, PartialEq)]
pub struct ChoiceTally {
    pub choice: Choice,
    pub votes: i64,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Vote {
    pub id: i32,
    pub id_question: i32,
    pub id_choice: i32,
    pub id_account: i32,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Account {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
}

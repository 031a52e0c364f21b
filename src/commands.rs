use anyhow::bail;
use tracing::info;

use crate::config::Config;
use crate::db::dbclient::DBClient;
use crate::db::schema::Account;
use crate::db::Repository;
use crate::support::password::hash_password;

pub const USAGE: &str = "usage: polls [serve | add-user <username> <password>]";

/// `polls add-user <username> <password>`. Accounts are only ever written to
/// the configured database.
pub async fn add_user(config: &Config, args: &[String]) -> anyhow::Result<Account> {
    let (username, password) = match args {
        [username, password] => (username.as_str(), password.as_str()),
        _ => bail!(USAGE),
    };

    let url = match &config.database_url {
        None => bail!("add-user requires POLLS_DATABASE_URL; an in-memory account would be lost on exit"),
        Some(v) => v,
    };

    let db = DBClient::new(url, config.db_max_connections).await?;
    create_account(&db, username, password).await
}

pub async fn create_account(repo: &dyn Repository, username: &str, password: &str) -> anyhow::Result<Account> {
    let username = username.trim();

    if username.is_empty() || password.is_empty() {
        bail!("username and password must not be empty");
    }

    if repo.find_account(username).await?.is_some() {
        bail!("account '{}' already exists", username);
    }

    let account = repo.add_account(username, &hash_password(password)).await?;
    info!(id = account.id, username = %account.username, "Account created.");

    Ok(account)
}

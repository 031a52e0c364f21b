use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

pub struct DBClient {
    pool: PgPool,
}

impl DBClient {
    pub async fn new(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .context("failed to connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        info!(max_connections, "Connected to database.");

        Ok(Self { pool })
    }

    pub fn conn(&self) -> &PgPool {
        &self.pool
    }
}

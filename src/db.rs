use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::config::Config;

pub type Db = Pool<Postgres>;

pub async fn connect(cfg: &Config) -> Result<Db> {
    let url = cfg.database_url.as_deref().context("DATABASE_URL not set")?;
    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .connect(url)
        .await?;
    // crate-relative path for sqlx migrations
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

use std::{env, str::FromStr};

use sqlx::{
    Error, SqlitePool,
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub mod models;
pub mod serde_helpers;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct DBService {
    pub pool: SqlitePool,
}

impl DBService {
    /// Create a new DBService connecting to SQLite.
    /// Uses DATABASE_URL environment variable.
    pub async fn new() -> Result<DBService, Error> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://podboard.db".to_string());
        Self::connect(&database_url).await
    }

    /// Connect to the given SQLite URL and run embedded migrations.
    pub async fn connect(database_url: &str) -> Result<DBService, Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to an in-memory database sees its own empty
        // store, so those pools must stay at a single connection.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&pool).await?;

        tracing::debug!("connected to {database_url}");
        Ok(DBService { pool })
    }
}

use crate::{
    config::DatabaseConfig,
    error::{AppError, Result},
    models::{AssessmentSource, PredictionRecord, User},
    risk::RiskLevel,
};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use uuid::Uuid;

/// Summaries kept with each history entry are cut to this many characters.
const SUMMARY_CHARS: usize = 120;

pub struct Database {
    pool: SqlitePool,
}

/// A prediction about to be stored.
pub struct NewPrediction<'a> {
    pub user_id: Uuid,
    pub prompt: &'a str,
    pub score: i64,
    pub risk_level: RiskLevel,
    pub explanation: &'a str,
    pub source: AssessmentSource,
    pub provider: Option<&'a str>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(AppError::Database)?
            .create_if_missing(true);

        // Every connection to an in-memory database sees its own copy, and
        // the data goes away with the connection.
        let pool_options = if config.url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(AppError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BLOB PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(AppError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id BLOB PRIMARY KEY NOT NULL,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                prompt TEXT NOT NULL,
                score INTEGER NOT NULL,
                risk_level TEXT NOT NULL,
                summary TEXT NOT NULL,
                explanation TEXT NOT NULL,
                source TEXT NOT NULL,
                provider TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(AppError::Database)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_predictions_user ON predictions (user_id, created_at)",
        )
        .execute(&pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Self { pool })
    }

    pub async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Email already registered".to_string())
            }
            other => AppError::Database(other),
        })?;

        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(user)
    }

    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(user)
    }

    pub async fn insert_prediction(&self, prediction: NewPrediction<'_>) -> Result<PredictionRecord> {
        let summary: String = prediction.explanation.chars().take(SUMMARY_CHARS).collect();

        let record = sqlx::query_as::<_, PredictionRecord>(
            r#"
            INSERT INTO predictions
                (id, user_id, prompt, score, risk_level, summary, explanation, source, provider, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(prediction.user_id)
        .bind(prediction.prompt)
        .bind(prediction.score)
        .bind(prediction.risk_level)
        .bind(summary)
        .bind(prediction.explanation)
        .bind(prediction.source)
        .bind(prediction.provider)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(record)
    }

    /// Newest first.
    pub async fn list_predictions(&self, user_id: Uuid, limit: i64) -> Result<Vec<PredictionRecord>> {
        let records = sqlx::query_as::<_, PredictionRecord>(
            r#"
            SELECT * FROM predictions
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(records)
    }

    pub async fn clear_predictions(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM predictions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(true)
    }
}

//! PostgreSQL-backed store.

use anyhow::{Context, Result};
use sqlx::{Connection, PgPool, Row};
use std::time::Duration;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{
    session::{Session, SessionStore},
    store::{AccountStore, CredentialStore, PasswordHasher, RelationshipStore},
    types::{Account, InsertOutcome, PasswordHash, SessionUser},
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    hasher: PasswordHasher,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool, hasher: PasswordHasher) -> Self {
        Self { pool, hasher }
    }

    /// Create any missing tables and indexes.
    ///
    /// # Errors
    /// Returns an error if a statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }

}

fn db_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Split a schema file into executable statements, dropping blank and comment-only chunks.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

impl CredentialStore for PgStore {
    async fn is_unique_user_name(&self, user_name: &str) -> Result<bool> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE user_name = $1) AS exists";
        let row = sqlx::query(query)
            .bind(user_name)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to check user name")?;
        let exists: bool = row.get("exists");
        Ok(!exists)
    }

    async fn insert(&self, user_name: &str, password: &str) -> Result<InsertOutcome> {
        let query = "INSERT INTO users (id, user_name, password) VALUES ($1, $2, $3)";
        let password_hash = self.hasher.hash(password);
        let result = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(user_name)
            .bind(password_hash.as_str())
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn fetch_by_user_name(&self, user_name: &str) -> Result<Option<Account>> {
        let query = "SELECT id, user_name, password FROM users WHERE user_name = $1";
        let row = sqlx::query(query)
            .bind(user_name)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to fetch user")?;

        Ok(row.map(|row| Account {
            id: row.get("id"),
            user_name: row.get("user_name"),
            password_hash: PasswordHash::new(row.get("password")),
        }))
    }

    fn hash_password(&self, password: &str) -> PasswordHash {
        self.hasher.hash(password)
    }
}

impl RelationshipStore for PgStore {
    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let query = r"
            SELECT EXISTS(
                SELECT 1 FROM following WHERE user_id = $1 AND following_id = $2
            ) AS exists
        ";
        let row = sqlx::query(query)
            .bind(follower_id)
            .bind(followee_id)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to check follow edge")?;
        Ok(row.get("exists"))
    }

    async fn insert(&self, follower_id: Uuid, followee_id: Uuid) -> Result<InsertOutcome> {
        // A duplicate edge is not an error; it simply inserts nothing.
        let query = r"
            INSERT INTO following (user_id, following_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
        ";
        let result = sqlx::query(query)
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert follow edge")?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::Conflict)
        } else {
            Ok(InsertOutcome::Created)
        }
    }

    async fn followings(&self, follower_id: Uuid) -> Result<Vec<SessionUser>> {
        let query = r"
            SELECT users.id, users.user_name
            FROM following
            JOIN users ON users.id = following.following_id
            WHERE following.user_id = $1
            ORDER BY following.created_at, users.user_name
        ";
        let rows = sqlx::query(query)
            .bind(follower_id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to list followings")?;

        Ok(rows
            .into_iter()
            .map(|row| SessionUser {
                id: row.get("id"),
                user_name: row.get("user_name"),
            })
            .collect())
    }
}

impl SessionStore for PgStore {
    async fn load_session(&self, key: &[u8]) -> Result<Option<Session>> {
        let query = r"
            SELECT payload::text AS payload
            FROM user_sessions
            WHERE session_hash = $1
              AND expires_at > NOW()
        ";
        let row = sqlx::query(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load session")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.get("payload");
        let session = serde_json::from_str(&payload).context("failed to decode session")?;
        Ok(Some(session))
    }

    async fn save_session(&self, key: &[u8], session: &Session, ttl: Duration) -> Result<()> {
        let query = r"
            INSERT INTO user_sessions (session_hash, payload, expires_at)
            VALUES ($1, $2::jsonb, NOW() + ($3 * INTERVAL '1 second'))
            ON CONFLICT (session_hash) DO UPDATE
            SET payload = EXCLUDED.payload,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
        ";
        let payload = serde_json::to_string(session).context("failed to encode session")?;
        let ttl_seconds = i64::try_from(ttl.as_secs()).context("session ttl out of range")?;
        sqlx::query(query)
            .bind(key)
            .bind(payload)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to save session")?;
        Ok(())
    }

    async fn destroy_session(&self, key: &[u8]) -> Result<()> {
        // Idempotent; it's fine if no rows are deleted.
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        sqlx::query(query)
            .bind(key)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn purge_expired_sessions(&self) -> Result<u64> {
        let query = "DELETE FROM user_sessions WHERE expires_at <= NOW()";
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to purge expired sessions")?;
        Ok(result.rows_affected())
    }
}

impl AccountStore for PgStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("failed to acquire database connection")?;
        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("failed to ping database")
    }
}

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{BearerToken, Role, Session, UserProfile};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use tokio::sync::RwLock;

const KEY_TOKEN: &str = "token";
const KEY_ROLE: &str = "role";
const KEY_NAME: &str = "name";
const KEY_SURNAME: &str = "surname";
const KEY_EMAIL: &str = "email";
const KEY_DEPARTMENT: &str = "department";
const KEY_COMPANY: &str = "company";
const KEY_IMAGE: &str = "image";
const KEY_SIGNED_IN_AT: &str = "signed_in_at";

/// Where the signed-in session lives between runs.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load_session(&self) -> Result<Option<Session>>;
    async fn save_session(&self, session: &Session) -> Result<()>;
    /// Drops every persisted entry, not just the token.
    async fn clear(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_credentials_table().await?;
        Ok(storage)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_credentials_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                key        TEXT PRIMARY KEY NOT NULL,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure credentials table exists")?;
        Ok(())
    }

    pub async fn get_entry(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM credentials WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read credential entry '{key}'"))?;
        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .map_err(Into::into)
    }

    pub async fn set_entry(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO credentials (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write credential entry '{key}'"))?;
        Ok(())
    }

    pub async fn entries(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM credentials")
            .fetch_all(&self.pool)
            .await
            .context("failed to list credential entries")?;
        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            entries.insert(row.try_get("key")?, row.try_get("value")?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl CredentialStore for Storage {
    async fn load_session(&self) -> Result<Option<Session>> {
        let entries = self.entries().await?;
        session_from_entries(&entries)
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM credentials")
            .execute(&mut *tx)
            .await
            .context("failed to reset credential entries")?;
        for (key, value) in session_entries(session) {
            sqlx::query("INSERT INTO credentials (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to store credential entry '{key}'"))?;
        }
        tx.commit().await.context("failed to commit session")?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM credentials")
            .execute(&self.pool)
            .await
            .context("failed to clear credential entries")?;
        Ok(())
    }
}

/// Process-local store for tests and one-shot runs.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn raw_entries(&self) -> HashMap<String, String> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load_session(&self) -> Result<Option<Session>> {
        let guard = self.entries.read().await;
        session_from_entries(&guard)
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let mut guard = self.entries.write().await;
        guard.clear();
        for (key, value) in session_entries(session) {
            guard.insert(key.to_string(), value);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

fn session_entries(session: &Session) -> Vec<(&'static str, String)> {
    let profile = &session.profile;
    let mut entries = vec![
        (KEY_TOKEN, session.token.expose().to_string()),
        (KEY_ROLE, session.role.as_str().to_string()),
        (KEY_NAME, profile.name.clone()),
        (KEY_SURNAME, profile.surname.clone()),
        (KEY_EMAIL, profile.email.clone()),
        (KEY_SIGNED_IN_AT, session.signed_in_at.to_rfc3339()),
    ];
    if let Some(department) = &profile.department {
        entries.push((KEY_DEPARTMENT, department.clone()));
    }
    if let Some(company) = &profile.company {
        entries.push((KEY_COMPANY, company.clone()));
    }
    if let Some(image) = &profile.image {
        entries.push((KEY_IMAGE, image.clone()));
    }
    entries
}

fn session_from_entries(entries: &HashMap<String, String>) -> Result<Option<Session>> {
    let Some(token) = entries.get(KEY_TOKEN) else {
        return Ok(None);
    };
    let role = entries.get(KEY_ROLE).cloned().unwrap_or_default();
    let field = |key: &str| entries.get(key).cloned().unwrap_or_default();
    let signed_in_at = match entries.get(KEY_SIGNED_IN_AT) {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid signed_in_at entry '{raw}'"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    Ok(Some(Session {
        token: BearerToken::new(token.clone()),
        role: Role::new(role.clone()),
        profile: UserProfile {
            name: field(KEY_NAME),
            surname: field(KEY_SURNAME),
            email: field(KEY_EMAIL),
            role,
            department: entries.get(KEY_DEPARTMENT).cloned(),
            company: entries.get(KEY_COMPANY).cloned(),
            image: entries.get(KEY_IMAGE).cloned(),
        },
        signed_in_at,
    }))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

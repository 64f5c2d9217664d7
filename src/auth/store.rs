//! Key-store backends.
//!
//! Writes come only from the out-of-band `create-key` tool; the request path
//! is read-only.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::error::KeyStoreError;

/// A resolved API-key row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ApiKeyRecord {
    /// Row id.
    pub id: i64,
    /// SHA-256 hex of the plaintext key; unique.
    pub hashed_key: String,
    /// Human owner label, used as a metric label.
    pub owner: String,
    /// Only active rows authenticate.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Lookup/insert interface over the `api_keys` table.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Finds a row by hashed key (exact equality).
    async fn find_by_hash(&self, hashed_key: &str) -> Result<Option<ApiKeyRecord>, KeyStoreError>;

    /// Inserts a new active row and returns it.
    async fn insert(&self, hashed_key: &str, owner: &str) -> Result<ApiKeyRecord, KeyStoreError>;
}

/// SQLite-backed key store.
#[derive(Clone)]
pub struct SqliteKeyStore {
    pool: SqlitePool,
}

impl SqliteKeyStore {
    /// Opens (creating if missing) the database and ensures the schema.
    pub async fn connect(database_url: &str) -> Result<Self, KeyStoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| KeyStoreError::Connect {
                url: database_url.to_string(),
                source: e,
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| KeyStoreError::Connect {
                url: database_url.to_string(),
                source: e,
            })?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wraps an existing pool (tests, shared pools). Schema is not created.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the `api_keys` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), KeyStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hashed_key TEXT NOT NULL UNIQUE,
                owner TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| KeyStoreError::Schema { source: e })?;

        Ok(())
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Flips `is_active` for a row; returns whether a row matched.
    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<bool, KeyStoreError> {
        let result = sqlx::query("UPDATE api_keys SET is_active = ? WHERE id = ?")
            .bind(is_active)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| KeyStoreError::Query { source: e })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn find_by_hash(&self, hashed_key: &str) -> Result<Option<ApiKeyRecord>, KeyStoreError> {
        sqlx::query_as::<_, ApiKeyRecord>(
            "SELECT id, hashed_key, owner, is_active, created_at FROM api_keys WHERE hashed_key = ?",
        )
        .bind(hashed_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KeyStoreError::Query { source: e })
    }

    async fn insert(&self, hashed_key: &str, owner: &str) -> Result<ApiKeyRecord, KeyStoreError> {
        sqlx::query_as::<_, ApiKeyRecord>(
            r#"
            INSERT INTO api_keys (hashed_key, owner, is_active, created_at)
            VALUES (?, ?, TRUE, ?)
            RETURNING id, hashed_key, owner, is_active, created_at
            "#,
        )
        .bind(hashed_key)
        .bind(owner)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| KeyStoreError::Query { source: e })
    }
}

/// In-memory key store for tests.
#[cfg(any(test, feature = "mock"))]
#[derive(Default)]
pub struct MockKeyStore {
    rows: parking_lot::Mutex<Vec<ApiKeyRecord>>,
    fail_lookups: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "mock"))]
impl MockKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an active row for `plaintext` and returns the record.
    pub fn insert_active(&self, plaintext: &str, owner: &str) -> ApiKeyRecord {
        self.insert_row(plaintext, owner, true)
    }

    /// Inserts a deactivated row for `plaintext` and returns the record.
    pub fn insert_inactive(&self, plaintext: &str, owner: &str) -> ApiKeyRecord {
        self.insert_row(plaintext, owner, false)
    }

    /// Makes every subsequent lookup fail, to exercise the fail-closed path.
    pub fn fail_lookups(&self) {
        self.fail_lookups
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn insert_row(&self, plaintext: &str, owner: &str, is_active: bool) -> ApiKeyRecord {
        let mut rows = self.rows.lock();
        let record = ApiKeyRecord {
            id: rows.len() as i64 + 1,
            hashed_key: crate::hashing::hash_api_key(plaintext),
            owner: owner.to_string(),
            is_active,
            created_at: Utc::now(),
        };
        rows.push(record.clone());
        record
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl KeyStore for MockKeyStore {
    async fn find_by_hash(&self, hashed_key: &str) -> Result<Option<ApiKeyRecord>, KeyStoreError> {
        if self.fail_lookups.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(KeyStoreError::Query {
                source: sqlx::Error::PoolClosed,
            });
        }

        Ok(self
            .rows
            .lock()
            .iter()
            .find(|r| r.hashed_key == hashed_key)
            .cloned())
    }

    async fn insert(&self, hashed_key: &str, owner: &str) -> Result<ApiKeyRecord, KeyStoreError> {
        let mut rows = self.rows.lock();
        let record = ApiKeyRecord {
            id: rows.len() as i64 + 1,
            hashed_key: hashed_key.to_string(),
            owner: owner.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        rows.push(record.clone());
        Ok(record)
    }
}

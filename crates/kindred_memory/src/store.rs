//! The backing store behind identity resolution and record persistence.
//!
//! Users are stored as one JSON document per canonical identity. `upsert`
//! takes a partial patch and deep-merges it into the stored document inside
//! a transaction, so concurrent writers touching disjoint fields don't
//! clobber each other.

use anyhow::{Context, Result};
use async_trait::async_trait;
use kindred_core::UserRecord;
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch the record stored under exactly this key, if any. Callers do
    /// format fallback themselves (see the identity resolver).
    async fn get(&self, key: &str) -> Result<Option<UserRecord>>;

    /// Create or replace the full record under its canonical identity.
    async fn insert(&self, record: &UserRecord) -> Result<()>;

    /// Deep-merge a partial JSON patch into the stored document.
    /// Errors if no record exists under `key`.
    async fn upsert(&self, key: &str, patch: Value) -> Result<()>;
}

/// RFC 7396-style merge: objects merge recursively, `null` removes a key,
/// everything else replaces.
pub fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_val) in patch_map {
                if patch_val.is_null() {
                    base_map.remove(&key);
                } else if let Some(base_val) = base_map.get_mut(&key) {
                    merge_json(base_val, patch_val);
                } else {
                    base_map.insert(key, patch_val);
                }
            }
        }
        (base_slot, patch_val) => *base_slot = patch_val,
    }
}

// ============================================================================
// SQLite store
// ============================================================================

#[derive(Clone)]
pub struct SqliteUserStore {
    pool: Pool<Sqlite>,
}

impl SqliteUserStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory database, for tests and local experiments.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory SQLite database")?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                identity TEXT PRIMARY KEY,
                doc TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create users table")?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get(&self, key: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT doc FROM users WHERE identity = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query user")?;
        match row {
            Some(row) => {
                let doc: String = row.get("doc");
                let record = serde_json::from_str(&doc)
                    .with_context(|| format!("Corrupt user document for {}", key))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, record: &UserRecord) -> Result<()> {
        let doc = serde_json::to_string(record).context("Failed to serialize user")?;
        sqlx::query(
            "INSERT INTO users (identity, doc, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(identity) DO UPDATE SET doc = excluded.doc, updated_at = excluded.updated_at",
        )
        .bind(&record.identity)
        .bind(&doc)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;
        Ok(())
    }

    async fn upsert(&self, key: &str, patch: Value) -> Result<()> {
        // Read-merge-write inside one transaction so two patches for the
        // same identity can't interleave at the row level.
        let mut tx = self.pool.begin().await.context("Failed to begin tx")?;
        let row = sqlx::query("SELECT doc FROM users WHERE identity = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to read user for merge")?;
        let row = row.ok_or_else(|| anyhow::anyhow!("No user stored under {}", key))?;
        let doc: String = row.get("doc");
        let mut base: Value =
            serde_json::from_str(&doc).with_context(|| format!("Corrupt user document for {}", key))?;
        merge_json(&mut base, patch);
        sqlx::query("UPDATE users SET doc = ?, updated_at = ? WHERE identity = ?")
            .bind(base.to_string())
            .bind(chrono::Utc::now().timestamp())
            .bind(key)
            .execute(&mut *tx)
            .await
            .context("Failed to write merged user")?;
        tx.commit().await.context("Failed to commit merge")?;
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// HashMap-backed store with the same merge semantics. Used by tests and as
/// the fallback when no database path is configured.
#[derive(Default)]
pub struct MemoryUserStore {
    docs: RwLock<HashMap<String, Value>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record under an arbitrary key, which may differ from the
    /// record's canonical identity. Exists to reproduce the heterogeneous
    /// historical key formats the resolver has to cope with.
    pub async fn seed_under_key(&self, key: &str, record: &UserRecord) {
        let doc = serde_json::to_value(record).expect("record serializes");
        self.docs.write().await.insert(key.to_string(), doc);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get(&self, key: &str) -> Result<Option<UserRecord>> {
        let docs = self.docs.read().await;
        match docs.get(key) {
            Some(doc) => {
                let record = serde_json::from_value(doc.clone())
                    .with_context(|| format!("Corrupt user document for {}", key))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, record: &UserRecord) -> Result<()> {
        let doc = serde_json::to_value(record).context("Failed to serialize user")?;
        self.docs
            .write()
            .await
            .insert(record.identity.clone(), doc);
        Ok(())
    }

    async fn upsert(&self, key: &str, patch: Value) -> Result<()> {
        let mut docs = self.docs.write().await;
        let base = docs
            .get_mut(key)
            .ok_or_else(|| anyhow::anyhow!("No user stored under {}", key))?;
        merge_json(base, patch);
        Ok(())
    }
}

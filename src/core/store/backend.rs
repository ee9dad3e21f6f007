use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, params};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::Entries;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// All entries of `store`; empty if it was never saved.
    async fn load(&self, store: &str) -> Result<Entries>;

    /// Replace the whole content of `store` with `entries`.
    async fn save(&self, store: &str, entries: &Entries) -> Result<()>;

    async fn clear(&self, store: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryBackend {
    stores: Mutex<HashMap<String, Entries>>,
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load(&self, store: &str) -> Result<Entries> {
        Ok(self
            .stores
            .lock()
            .await
            .get(store)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, store: &str, entries: &Entries) -> Result<()> {
        self.stores
            .lock()
            .await
            .insert(store.to_string(), entries.clone());
        Ok(())
    }

    async fn clear(&self, store: &str) -> Result<()> {
        self.stores.lock().await.remove(store);
        Ok(())
    }
}

pub struct SqliteBackend {
    db: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening preference database {}", path.display()))?;
        Self::with_connection(Arc::new(Mutex::new(conn))).await
    }

    pub async fn in_memory() -> Result<Self> {
        Self::with_connection(Arc::new(Mutex::new(Connection::open_in_memory()?))).await
    }

    async fn with_connection(db: Arc<Mutex<Connection>>) -> Result<Self> {
        let backend = Self { db };
        backend.initialize().await?;
        Ok(backend)
    }

    async fn initialize(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "CREATE TABLE IF NOT EXISTS preference_entries (
                store TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (store, key)
            )",
            [],
        )?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn load(&self, store: &str) -> Result<Entries> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT key, value FROM preference_entries WHERE store = ?1 ORDER BY key ASC",
        )?;
        let rows = stmt.query_map([store], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Entries::new();
        for row in rows {
            let (key, raw) = row?;
            let value: Value = serde_json::from_str(&raw)
                .with_context(|| format!("corrupt value for '{}' in store '{}'", key, store))?;
            entries.insert(key, value);
        }
        Ok(entries)
    }

    async fn save(&self, store: &str, entries: &Entries) -> Result<()> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        tx.execute("DELETE FROM preference_entries WHERE store = ?1", [store])?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO preference_entries (store, key, value) VALUES (?1, ?2, ?3)",
                params![store, key, value.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn clear(&self, store: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute("DELETE FROM preference_entries WHERE store = ?1", [store])?;
        Ok(())
    }
}

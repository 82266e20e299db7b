//! Durable key-value storage for the document array.
//!
//! The whole corpus lives as one JSON array under a fixed key. It is read
//! once when the application opens and overwritten wholesale after every
//! mutation; there are no partial updates and no schema versions.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::StoreConfig;
use crate::db;
use crate::migrate;
use crate::models::Document;

pub struct DocumentStore {
    pool: SqlitePool,
    documents_key: String,
    chat_key: String,
}

impl DocumentStore {
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = db::connect(config)
            .await
            .with_context(|| format!("Failed to open store at {}", config.path.display()))?;
        migrate::ensure_schema(&pool).await?;
        Ok(Self {
            pool,
            documents_key: config.documents_key.clone(),
            chat_key: config.chat_key.clone(),
        })
    }

    pub async fn load_documents(&self) -> Result<Vec<Document>> {
        Ok(self.get(&self.documents_key).await?.unwrap_or_default())
    }

    pub async fn save_documents(&self, documents: &[Document]) -> Result<()> {
        self.put(&self.documents_key, &documents).await
    }

    pub async fn load_chat<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        Ok(self.get(&self.chat_key).await?.unwrap_or_default())
    }

    pub async fn save_chat<T: Serialize>(&self, history: &[T]) -> Result<()> {
        self.put(&self.chat_key, &history).await
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match raw {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .with_context(|| format!("Stored value under '{}' is not valid JSON", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        tracing::debug!(key, bytes = json.len(), "store write");
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

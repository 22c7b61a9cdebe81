//! Per-agent conversation storage
//!
//! Every agent owns one partition (a table named after the agent) inside a
//! shared backend. Partitions are used to replay earlier turns of the same
//! session back to the model.

use crate::error::AppError;
use crate::models::ChatTurn;
use crate::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::info;
use uuid::Uuid;

enum StorageBackend {
    InMemory {
        partitions: RwLock<HashMap<(String, Uuid), Vec<ChatTurn>>>,
    },
    Sqlite {
        pool: SqlitePool,
    },
}

/// Shared storage every agent partition lives in.
#[derive(Clone)]
pub struct AgentStore {
    backend: Arc<StorageBackend>,
}

impl AgentStore {
    pub fn in_memory() -> Self {
        info!("Agent storage backend: in-memory");
        Self {
            backend: Arc::new(StorageBackend::InMemory {
                partitions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Connects lazily; tables are created on first use of each partition.
    pub fn sqlite(database_url: &str) -> Result<Self> {
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)?;

        info!(url = %database_url, "Agent storage backend: sqlite");
        Ok(Self {
            backend: Arc::new(StorageBackend::Sqlite { pool }),
        })
    }

    /// Storage handle for one agent.
    pub fn partition(&self, table: &str) -> Result<AgentStorage> {
        if !is_valid_table_name(table) {
            return Err(AppError::StorageError(format!(
                "invalid partition name: {:?}",
                table
            )));
        }

        Ok(AgentStorage {
            table: table.to_string(),
            backend: Arc::clone(&self.backend),
            schema_ready: Arc::new(OnceCell::new()),
        })
    }
}

/// One agent's storage partition.
#[derive(Clone)]
pub struct AgentStorage {
    table: String,
    backend: Arc<StorageBackend>,
    schema_ready: Arc<OnceCell<()>>,
}

impl AgentStorage {
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn ensure_schema_if_needed(&self) -> Result<()> {
        let StorageBackend::Sqlite { pool } = self.backend.as_ref() else {
            return Ok(());
        };

        self.schema_ready
            .get_or_try_init(|| async {
                let create_table = format!(
                    r#"
                    CREATE TABLE IF NOT EXISTS {table} (
                      run_id TEXT PRIMARY KEY,
                      session_id TEXT NOT NULL,
                      query TEXT NOT NULL,
                      response TEXT NOT NULL,
                      created_at TEXT NOT NULL
                    );
                    "#,
                    table = self.table
                );
                sqlx::query(&create_table).execute(pool).await?;

                let create_index = format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_session ON {table} (session_id);",
                    table = self.table
                );
                sqlx::query(&create_index).execute(pool).await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AppError::StorageError(format!(
                    "Failed to initialize {} schema: {}",
                    self.table, e
                ))
            })?;

        Ok(())
    }

    /// Up to `limit` most recent turns of a session, oldest first.
    pub async fn load_recent(&self, session_id: Uuid, limit: usize) -> Result<Vec<ChatTurn>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        match self.backend.as_ref() {
            StorageBackend::InMemory { partitions } => {
                let locked = partitions.read().await;
                let turns = locked
                    .get(&(self.table.clone(), session_id))
                    .map(|turns| {
                        let start = turns.len().saturating_sub(limit);
                        turns[start..].to_vec()
                    })
                    .unwrap_or_default();
                Ok(turns)
            }
            StorageBackend::Sqlite { pool } => {
                self.ensure_schema_if_needed().await?;

                let select = format!(
                    "SELECT query, response FROM {} WHERE session_id = ? ORDER BY rowid DESC LIMIT ?",
                    self.table
                );
                let rows = sqlx::query(&select)
                    .bind(session_id.to_string())
                    .bind(limit as i64)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| {
                        AppError::StorageError(format!(
                            "Failed to load history from {}: {}",
                            self.table, e
                        ))
                    })?;

                let mut turns = rows
                    .into_iter()
                    .map(|row| -> std::result::Result<ChatTurn, sqlx::Error> {
                        Ok(ChatTurn::new(
                            row.try_get::<String, _>("query")?,
                            row.try_get::<String, _>("response")?,
                        ))
                    })
                    .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;
                turns.reverse();
                Ok(turns)
            }
        }
    }

    pub async fn append(&self, session_id: Uuid, turn: &ChatTurn) -> Result<()> {
        match self.backend.as_ref() {
            StorageBackend::InMemory { partitions } => {
                let mut locked = partitions.write().await;
                locked
                    .entry((self.table.clone(), session_id))
                    .or_default()
                    .push(turn.clone());
                Ok(())
            }
            StorageBackend::Sqlite { pool } => {
                self.ensure_schema_if_needed().await?;

                let insert = format!(
                    "INSERT INTO {} (run_id, session_id, query, response, created_at) VALUES (?, ?, ?, ?, ?)",
                    self.table
                );
                sqlx::query(&insert)
                    .bind(Uuid::new_v4().to_string())
                    .bind(session_id.to_string())
                    .bind(&turn.query)
                    .bind(&turn.response)
                    .bind(chrono::Utc::now())
                    .execute(pool)
                    .await
                    .map_err(|e| {
                        AppError::StorageError(format!(
                            "Failed to save run to {}: {}",
                            self.table, e
                        ))
                    })?;

                Ok(())
            }
        }
    }
}

fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

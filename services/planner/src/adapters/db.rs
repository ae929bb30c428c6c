//! services/planner/src/adapters/db.rs
//!
//! This module contains the document store adapter, the concrete implementation
//! of the `DocumentStore` port from the `core` crate. Documents are kept as JSON
//! rows in SQLite via `sqlx`; every write publishes the collection name on a
//! broadcast channel, which is what drives live queries.

use async_stream::stream;
use async_trait::async_trait;
use planner_core::{
    merge_fields, Document, DocumentStore, PortError, PortResult, Query, SetOptions,
    SnapshotStream, WatchTarget,
};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};
use uuid::Uuid;

/// How many change notifications a slow live query may fall behind before it
/// is told it lagged (it then simply re-reads).
const CHANGE_FEED_CAPACITY: usize = 256;

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A document store adapter that implements the `DocumentStore` port on SQLite.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
    changes: broadcast::Sender<String>,
}

impl SqliteDocumentStore {
    /// Creates a new `SqliteDocumentStore` over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    /// Connects to the database at `url`, creating the file if needed.
    /// In-memory URLs get the single-connection store from [`Self::in_memory`],
    /// since every pooled connection would otherwise see its own empty database.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        if is_memory_url(url) {
            info!("Using a private in-memory document database");
            return Self::in_memory().await;
        }
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!("Connected to document database at {}", url);
        Ok(Self::new(pool))
    }

    /// A private in-memory store with migrations applied. A single connection
    /// is kept alive for the lifetime of the pool so the database persists.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn notify(&self, collection: &str) {
        // No receivers just means no live query is open.
        let _ = self.changes.send(collection.to_string());
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: String,
    data: String,
}

impl DocumentRecord {
    fn to_domain(self) -> PortResult<Document> {
        let data: Value = serde_json::from_str(&self.data)
            .map_err(|e| PortError::Decode(format!("document {}: {}", self.id, e)))?;
        Ok(Document::new(self.id, data))
    }
}

fn remote(e: sqlx::Error) -> PortError {
    PortError::Remote(e.to_string())
}

fn encode(data: &Value) -> PortResult<String> {
    serde_json::to_string(data).map_err(|e| PortError::Decode(e.to_string()))
}

async fn scan(pool: &SqlitePool, collection: &str) -> PortResult<Vec<Document>> {
    let records = sqlx::query_as::<_, DocumentRecord>(
        "SELECT id, data FROM documents WHERE collection = ? ORDER BY rowid ASC",
    )
    .bind(collection)
    .fetch_all(pool)
    .await
    .map_err(remote)?;

    records.into_iter().map(DocumentRecord::to_domain).collect()
}

async fn fetch(pool: &SqlitePool, collection: &str, id: &str) -> PortResult<Option<Document>> {
    let record = sqlx::query_as::<_, DocumentRecord>(
        "SELECT id, data FROM documents WHERE collection = ? AND id = ?",
    )
    .bind(collection)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(remote)?;

    record.map(DocumentRecord::to_domain).transpose()
}

async fn snapshot(pool: &SqlitePool, target: &WatchTarget) -> PortResult<Vec<Document>> {
    match target {
        WatchTarget::Query(query) => Ok(query.apply(scan(pool, &query.collection).await?)),
        WatchTarget::Document { collection, id } => {
            Ok(fetch(pool, collection, id).await?.into_iter().collect())
        }
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> PortResult<Option<Document>> {
        fetch(&self.pool, collection, id).await
    }

    async fn query(&self, query: &Query) -> PortResult<Vec<Document>> {
        let docs = scan(&self.pool, &query.collection).await?;
        Ok(query.apply(docs))
    }

    async fn add(&self, collection: &str, data: Value) -> PortResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(encode(&data)?)
            .execute(&self.pool)
            .await
            .map_err(remote)?;

        self.notify(collection);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value, options: SetOptions) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(remote)?;

        let mut merged = data;
        if options.merge {
            let existing = sqlx::query_as::<_, DocumentRecord>(
                "SELECT id, data FROM documents WHERE collection = ? AND id = ?",
            )
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(remote)?;

            if let Some(record) = existing {
                let mut current = record.to_domain()?.data;
                merge_fields(&mut current, &merged);
                merged = current;
            }
        }

        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)
             ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data",
        )
        .bind(collection)
        .bind(id)
        .bind(encode(&merged)?)
        .execute(&mut *tx)
        .await
        .map_err(remote)?;

        tx.commit().await.map_err(remote)?;
        self.notify(collection);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(remote)?;

        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, data FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(remote)?
        .ok_or_else(|| PortError::NotFound(format!("{}/{}", collection, id)))?;

        let mut current = record.to_domain()?.data;
        merge_fields(&mut current, &partial);

        sqlx::query("UPDATE documents SET data = ? WHERE collection = ? AND id = ?")
            .bind(encode(&current)?)
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(remote)?;

        tx.commit().await.map_err(remote)?;
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(remote)?;

        self.notify(collection);
        Ok(())
    }

    fn watch(&self, target: &WatchTarget) -> PortResult<SnapshotStream> {
        // Subscribe before the first read so no change can slip in between.
        let mut changes = self.changes.subscribe();
        let pool = self.pool.clone();
        let target = target.clone();

        let live = stream! {
            let mut last: Option<Vec<Document>> = None;
            let mut refresh = true;
            loop {
                if refresh {
                    match snapshot(&pool, &target).await {
                        Ok(docs) => {
                            if last.as_ref() != Some(&docs) {
                                last = Some(docs.clone());
                                yield Ok(docs);
                            }
                        }
                        Err(e) => yield Err(e),
                    }
                }
                refresh = match changes.recv().await {
                    Ok(collection) => collection == target.collection(),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Live query on {} lagged by {} changes", target.collection(), skipped);
                        true
                    }
                    Err(RecvError::Closed) => break,
                };
            }
        };

        Ok(Box::pin(live))
    }
}

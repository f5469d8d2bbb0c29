//! libSQL backend — async `ProfileStore` implementation.
//!
//! Profiles are stored as one JSON document per user. Merges run in a
//! transaction: read the current document, merge in Rust, write it back.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::onboarding::model::OnboardingRecord;
use crate::store::traits::{ProfileStore, merged_document};

/// One row per user. `document` is the merged JSON profile.
const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS profiles (
        user_id TEXT PRIMARY KEY,
        document TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL
    );
"#;

/// libSQL profile store.
///
/// Stores a single connection that is reused for all operations. Writers
/// take `write_lock` so two merges never interleave their transactions on
/// that connection.
pub struct LibSqlProfileStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlProfileStore {
    /// Open (or create) a local database file and make sure the schema exists.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db)?;
        store.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let store = Self::from_database(db)?;
        store.init_schema().await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Read-merge-write inside one transaction. Any error rolls it back.
    async fn merge(&self, key: &str, patch: &serde_json::Value) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("merge: begin: {e}")))?;

        match write_merged(&tx, key, patch).await {
            Ok(()) => tx
                .commit()
                .await
                .map_err(|e| DatabaseError::Query(format!("merge: commit: {e}")))?,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(key, "Failed to roll back profile merge: {}", rollback);
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Merge `patch` into the stored document and write it back.
async fn write_merged(
    conn: &Connection,
    key: &str,
    patch: &serde_json::Value,
) -> Result<(), DatabaseError> {
    let existing = read_document(conn, key).await?;
    let merged = merged_document(key, existing, patch)?;
    let document =
        serde_json::to_string(&merged).map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO profiles (user_id, document, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (user_id) DO UPDATE SET document = ?2, updated_at = ?3",
        params![key, document, now],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("merge: write: {e}")))?;
    Ok(())
}

/// Load and parse the stored document for `key`.
async fn read_document(
    conn: &Connection,
    key: &str,
) -> Result<Option<serde_json::Value>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT document FROM profiles WHERE user_id = ?1",
            params![key],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => {
            let raw: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;
            let value = serde_json::from_str(&raw)
                .map_err(|e| DatabaseError::Serialization(format!("profile {key}: {e}")))?;
            Ok(Some(value))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl ProfileStore for LibSqlProfileStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.conn()
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Schema(format!("profiles table: {e}")))?;
        debug!("Profile schema ready");
        Ok(())
    }

    async fn merge_write(
        &self,
        key: &str,
        record: &OnboardingRecord,
    ) -> Result<DateTime<Utc>, DatabaseError> {
        let completed_at = Utc::now();
        self.merge(key, &record.to_patch(completed_at)).await?;
        debug!(key, role = %record.role, "Onboarding record merged");
        Ok(completed_at)
    }

    async fn merge_profile(
        &self,
        key: &str,
        patch: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        self.merge(key, patch).await
    }

    async fn get_profile(&self, key: &str) -> Result<Option<serde_json::Value>, DatabaseError> {
        read_document(self.conn(), key).await
    }
}

//! In-memory profile store. Nothing survives a restart; used for tests and
//! local runs without a database file.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::DatabaseError;
use crate::onboarding::model::OnboardingRecord;
use crate::store::traits::{ProfileStore, merged_document};

#[derive(Default)]
pub struct MemoryProfileStore {
    documents: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Merge under the write lock so readers never see a half-applied patch.
    async fn merge(&self, key: &str, patch: &serde_json::Value) -> Result<(), DatabaseError> {
        let mut documents = self.documents.write().await;
        let merged = merged_document(key, documents.get(key).cloned(), patch)?;
        documents.insert(key.to_string(), merged);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn merge_write(
        &self,
        key: &str,
        record: &OnboardingRecord,
    ) -> Result<DateTime<Utc>, DatabaseError> {
        let completed_at = Utc::now();
        self.merge(key, &record.to_patch(completed_at)).await?;
        debug!(key, "Onboarding record merged");
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
        Ok(self.documents.read().await.get(key).cloned())
    }
}

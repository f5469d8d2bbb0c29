//! `ProfileStore` trait — async interface over per-user profile documents.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::onboarding::model::OnboardingRecord;

/// Key-value document store keyed by principal id.
///
/// Every write is a merge: fields already on the document that the write
/// doesn't mention are left alone. A write either applies fully or not at
/// all.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Create tables or other backing structures. Safe to call repeatedly.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Merge an onboarding record into the profile at `key`.
    ///
    /// The store stamps `completedAt` with its own clock and returns the
    /// value it used; any `completed_at` on the record is ignored.
    async fn merge_write(
        &self,
        key: &str,
        record: &OnboardingRecord,
    ) -> Result<DateTime<Utc>, DatabaseError>;

    /// Merge an arbitrary JSON object into the profile at `key`, creating the
    /// document if needed. Used for registration data.
    async fn merge_profile(&self, key: &str, patch: &serde_json::Value)
    -> Result<(), DatabaseError>;

    /// Fetch the full profile document at `key`.
    async fn get_profile(&self, key: &str) -> Result<Option<serde_json::Value>, DatabaseError>;
}

/// Apply `patch` to an existing document (or an empty one).
///
/// Both sides must be JSON objects; a scalar document would be clobbered by
/// the merge, so it is reported instead.
pub(crate) fn merged_document(
    key: &str,
    existing: Option<serde_json::Value>,
    patch: &serde_json::Value,
) -> Result<serde_json::Value, DatabaseError> {
    if !patch.is_object() {
        return Err(DatabaseError::Serialization(format!(
            "patch for {key} is not a JSON object"
        )));
    }
    let mut doc = existing.unwrap_or_else(|| serde_json::json!({}));
    if !doc.is_object() {
        return Err(DatabaseError::NotAnObject {
            key: key.to_string(),
        });
    }
    crate::onboarding::model::merge_json(&mut doc, patch);
    Ok(doc)
}

//! Onboarding data models: the persisted record, the profile read model,
//! and the catalog of choices offered by each step.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Highest self-assessed skill level.
pub const MAX_SKILL_LEVEL: u8 = 5;

/// What the wizard hands to the profile store on completion.
///
/// `completed_at` is always `None` on the way in; the store stamps it with
/// its own clock when the write is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRecord {
    pub role: String,
    pub skills: BTreeMap<String, u8>,
    pub time_commitment: String,
    pub onboarding_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl OnboardingRecord {
    pub fn new(
        role: impl Into<String>,
        skills: BTreeMap<String, u8>,
        time_commitment: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            skills,
            time_commitment: time_commitment.into(),
            onboarding_completed: true,
            completed_at: None,
        }
    }

    /// Render the merge patch applied to the profile document.
    ///
    /// The completion flag sits at the top level; the answers go under
    /// `onboarding` together with the store-assigned timestamp.
    pub fn to_patch(&self, completed_at: DateTime<Utc>) -> Value {
        serde_json::json!({
            "onboardingCompleted": self.onboarding_completed,
            "onboarding": {
                "role": self.role,
                "skills": self.skills,
                "timeCommitment": self.time_commitment,
                "completedAt": completed_at,
            },
        })
    }
}

/// Merge `patch` into `target`.
///
/// Objects merge key by key, recursively. Anything else in the patch
/// replaces what was there. Keys the patch does not mention are kept.
pub fn merge_json(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                let slot = target.entry(key.clone()).or_insert(Value::Null);
                if slot.is_object() && value.is_object() {
                    merge_json(slot, value);
                } else {
                    *slot = value.clone();
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// The onboarding section as read back from a profile document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingSummary {
    pub role: String,
    #[serde(default)]
    pub skills: BTreeMap<String, u8>,
    pub time_commitment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Read model over a stored profile document.
///
/// Only the fields this crate cares about are typed; registration data
/// written elsewhere is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding: Option<OnboardingSummary>,
}

impl UserProfile {
    /// Parse a stored document. Returns `None` if it doesn't have the
    /// expected shape.
    pub fn from_document(doc: &Value) -> Option<Self> {
        match serde_json::from_value(doc.clone()) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("Failed to parse profile document: {}", e);
                None
            }
        }
    }

    /// Whether the user should be sent to the onboarding flow.
    pub fn needs_onboarding(&self) -> bool {
        !self.onboarding_completed
    }
}

/// One selectable entry in a wizard step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogOption {
    pub id: String,
    pub label: String,
}

impl CatalogOption {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
        }
    }
}

/// The choices offered by the three wizard steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub roles: Vec<CatalogOption>,
    pub skills: Vec<CatalogOption>,
    pub time_commitments: Vec<CatalogOption>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            roles: vec![
                CatalogOption::new("frontend", "Frontend Engineer"),
                CatalogOption::new("backend", "Backend Engineer"),
                CatalogOption::new("fullstack", "Full-Stack Engineer"),
                CatalogOption::new("devops", "DevOps Engineer"),
                CatalogOption::new("data", "Data Engineer"),
            ],
            skills: vec![
                CatalogOption::new("react", "React"),
                CatalogOption::new("css", "CSS"),
                CatalogOption::new("js", "JavaScript"),
                CatalogOption::new("html", "HTML"),
                CatalogOption::new("node", "Node.js"),
                CatalogOption::new("python", "Python"),
                CatalogOption::new("api-design", "API Design"),
                CatalogOption::new("docker", "Docker"),
            ],
            time_commitments: vec![
                CatalogOption::new("5h/week", "Casual (5 hours a week)"),
                CatalogOption::new("10h/week", "Steady (10 hours a week)"),
                CatalogOption::new("20h/week", "Focused (20 hours a week)"),
                CatalogOption::new("30h/week", "Intensive (30+ hours a week)"),
            ],
        }
    }
}

impl Catalog {
    pub fn has_role(&self, id: &str) -> bool {
        self.roles.iter().any(|o| o.id == id)
    }

    pub fn has_skill(&self, id: &str) -> bool {
        self.skills.iter().any(|o| o.id == id)
    }

    pub fn has_time_commitment(&self, id: &str) -> bool {
        self.time_commitments.iter().any(|o| o.id == id)
    }
}

//! Error types for SkillForge.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Schema setup failed: {0}")]
    Schema(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Document for {key} is not a JSON object")]
    NotAnObject { key: String },
}

/// Onboarding wizard errors.
///
/// `Precondition`, `Persistence` and `Timeout` come out of a failed commit
/// and leave the wizard back on the time-commitment step. The rest are
/// rejected user actions that leave the state untouched.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Failed to save onboarding: {0}")]
    Persistence(#[from] DatabaseError),

    #[error("Saving onboarding timed out after {0:?}")]
    Timeout(Duration),

    #[error("A submission is already in progress")]
    SubmissionInFlight,

    #[error("Cannot {action} while at step {step}")]
    InvalidTransition { action: String, step: String },

    #[error("Step {step} is not complete")]
    StepIncomplete { step: String },

    #[error("Unknown {kind}: {id}")]
    UnknownOption { kind: String, id: String },

    #[error("Skill level {level} out of range (max {max})")]
    InvalidLevel { level: i64, max: u8 },
}

impl WizardError {
    /// Whether this error came out of a commit attempt (the user may retry).
    pub fn is_commit_failure(&self) -> bool {
        matches!(
            self,
            Self::Precondition(_) | Self::Persistence(_) | Self::Timeout(_)
        )
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

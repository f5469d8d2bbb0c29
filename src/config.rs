//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Wizard behaviour knobs.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Number of distinct skills that must be assessed before leaving the
    /// skills step. Capped at the number of skills the catalog offers.
    pub min_assessed_skills: usize,
    /// Upper bound on a single profile write.
    pub commit_timeout: Duration,
    /// Where the host page should navigate once onboarding is complete.
    pub completion_redirect: String,
    /// How long an untouched session is kept before it is dropped.
    pub session_ttl: Duration,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            min_assessed_skills: 4,
            commit_timeout: Duration::from_secs(10),
            completion_redirect: "/dashboard".to_string(),
            session_ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port for the HTTP server.
    pub port: u16,
    /// Path of the libSQL database file holding profile documents.
    pub db_path: PathBuf,
    pub wizard: WizardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/skillforge.db"),
            wizard: WizardConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build config from `SKILLFORGE_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = parse_env("SKILLFORGE_PORT")?.unwrap_or(defaults.port);

        let db_path = std::env::var("SKILLFORGE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let commit_timeout = parse_env::<u64>("SKILLFORGE_COMMIT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.wizard.commit_timeout);

        let session_ttl = parse_env::<u64>("SKILLFORGE_SESSION_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.wizard.session_ttl);

        let min_assessed_skills = parse_env("SKILLFORGE_MIN_SKILLS")?
            .unwrap_or(defaults.wizard.min_assessed_skills);
        if min_assessed_skills == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SKILLFORGE_MIN_SKILLS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            port,
            db_path,
            wizard: WizardConfig {
                min_assessed_skills,
                commit_timeout,
                session_ttl,
                ..defaults.wizard
            },
        })
    }
}

/// Read and parse an optional env var. Unset is `Ok(None)`, unparsable is an error.
fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

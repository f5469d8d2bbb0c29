//! OnboardingWizard — drives the three onboarding steps and performs the
//! single profile write at the end.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, error, info, warn};

use crate::config::WizardConfig;
use crate::error::WizardError;
use crate::identity::IdentityProvider;
use crate::store::ProfileStore;

use super::model::{Catalog, MAX_SKILL_LEVEL, OnboardingRecord};
use super::state::{StepProgress, WizardState, WizardStep};

/// Broadcast channel capacity for wizard events.
const EVENT_CAPACITY: usize = 16;

/// Notifications for whoever hosts the wizard (a page, a socket, a test).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardEvent {
    StepChanged { step: WizardStep },
    /// Emitted once, when the profile write succeeds.
    Completed { redirect_to: String },
    SubmissionFailed { message: String },
}

/// Result of a successful `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to another data step.
    Moved(WizardStep),
    /// The profile was written and the wizard is complete.
    Completed {
        redirect_to: String,
        completed_at: DateTime<Utc>,
    },
}

/// Point-in-time view of the wizard, for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct WizardSnapshot {
    pub step: WizardStep,
    pub step_number: Option<u8>,
    pub progress: Vec<StepProgress>,
    pub selected_role: Option<String>,
    pub skill_levels: BTreeMap<String, u8>,
    pub selected_time_commitment: Option<String>,
    pub required_skills: usize,
    pub can_proceed: bool,
    pub can_go_back: bool,
    pub submitting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

/// Coordinates one user's pass through onboarding: step validation, the
/// in-flight guard, and the commit to the profile store.
pub struct OnboardingWizard {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    catalog: Arc<Catalog>,
    config: WizardConfig,
    state: RwLock<WizardState>,
    events: broadcast::Sender<WizardEvent>,
}

impl OnboardingWizard {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn ProfileStore>,
        catalog: Arc<Catalog>,
        config: WizardConfig,
    ) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            identity,
            store,
            catalog,
            config,
            state: RwLock::new(WizardState::default()),
            events,
        }
    }

    /// Wizard over the default catalog and config.
    pub fn with_defaults(identity: Arc<dyn IdentityProvider>, store: Arc<dyn ProfileStore>) -> Self {
        Self::new(
            identity,
            store,
            Arc::new(Catalog::default()),
            WizardConfig::default(),
        )
    }

    /// Subscribe to step changes and the completion signal.
    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    /// Distinct skills needed to leave the skills step.
    ///
    /// Never more than the catalog offers, otherwise the step could not be
    /// completed.
    pub fn required_skills(&self) -> usize {
        self.config.min_assessed_skills.min(self.catalog.skills.len())
    }

    pub async fn current_step(&self) -> WizardStep {
        self.state.read().await.step
    }

    /// Whether "continue" is enabled. Derived from the live state each time.
    pub async fn can_proceed(&self) -> bool {
        self.state.read().await.can_proceed(self.required_skills())
    }

    pub async fn snapshot(&self) -> WizardSnapshot {
        let state = self.state.read().await;
        let required_skills = self.required_skills();
        WizardSnapshot {
            step: state.step,
            step_number: state.step.number(),
            progress: state.progress(),
            selected_role: state.selected_role.clone(),
            skill_levels: state.skill_levels.clone(),
            selected_time_commitment: state.selected_time_commitment.clone(),
            required_skills,
            can_proceed: state.can_proceed(required_skills),
            can_go_back: state.can_go_back(),
            submitting: state.submission_in_flight(),
            last_error: state.last_error.clone(),
            redirect_to: state
                .step
                .is_terminal()
                .then(|| self.config.completion_redirect.clone()),
        }
    }

    pub async fn select_role(&self, role: &str) -> Result<(), WizardError> {
        if !self.catalog.has_role(role) {
            return Err(unknown("role", role));
        }
        self.state.write().await.select_role(role.to_string())
    }

    /// Record (or overwrite) the user's level for one skill.
    ///
    /// Takes a wide integer so out-of-range input from callers is reported
    /// as `InvalidLevel` rather than failing to parse.
    pub async fn assess_skill(&self, skill: &str, level: i64) -> Result<(), WizardError> {
        let level = u8::try_from(level)
            .ok()
            .filter(|l| *l <= MAX_SKILL_LEVEL)
            .ok_or(WizardError::InvalidLevel {
                level,
                max: MAX_SKILL_LEVEL,
            })?;
        if !self.catalog.has_skill(skill) {
            return Err(unknown("skill", skill));
        }
        let mut state = self.state.write().await;
        state.assess(skill.to_string(), level)?;
        debug!(skill, level, assessed = state.skill_levels.len(), "Skill assessed");
        Ok(())
    }

    pub async fn select_time_commitment(&self, time: &str) -> Result<(), WizardError> {
        if !self.catalog.has_time_commitment(time) {
            return Err(unknown("time commitment", time));
        }
        self.state
            .write()
            .await
            .select_time_commitment(time.to_string())
    }

    /// Go back one step. A no-op on the first step.
    pub async fn retreat(&self) -> Result<WizardStep, WizardError> {
        let (before, after) = {
            let mut state = self.state.write().await;
            let before = state.step;
            (before, state.retreat()?)
        };
        if before != after {
            debug!(from = %before, to = %after, "Onboarding step retreated");
            self.emit(WizardEvent::StepChanged { step: after });
        }
        Ok(after)
    }

    /// Go forward one step, or submit from the last one.
    ///
    /// Submitting flips the state to `Submitting` under the lock, so a
    /// second call while the write is pending is rejected with
    /// `SubmissionInFlight` and never reaches the store. A failed write
    /// returns the wizard to the time-commitment step with everything the
    /// user entered intact. So does dropping this future before the write
    /// resolves, although the write itself may still have landed.
    pub async fn advance(&self) -> Result<AdvanceOutcome, WizardError> {
        let record = {
            let mut state = self.state.write().await;
            let next = state.advance(self.required_skills())?;
            if next != WizardStep::Submitting {
                drop(state);
                debug!(step = %next, "Onboarding step advanced");
                self.emit(WizardEvent::StepChanged { step: next });
                return Ok(AdvanceOutcome::Moved(next));
            }
            record_from(&state)
        };
        self.emit(WizardEvent::StepChanged {
            step: WizardStep::Submitting,
        });
        let mut cancelled = CancelledSubmission::new(&self.state);

        let result = match record {
            Ok(record) => self.commit(record).await,
            Err(e) => Err(e),
        };

        let mut state = self.state.write().await;
        cancelled.disarm();
        match result {
            Ok(completed_at) => {
                state.submission_succeeded()?;
                drop(state);
                let redirect_to = self.config.completion_redirect.clone();
                info!(redirect_to = %redirect_to, "Onboarding complete");
                self.emit(WizardEvent::StepChanged {
                    step: WizardStep::Complete,
                });
                self.emit(WizardEvent::Completed {
                    redirect_to: redirect_to.clone(),
                });
                Ok(AdvanceOutcome::Completed {
                    redirect_to,
                    completed_at,
                })
            }
            Err(e) => {
                let message = e.to_string();
                state.submission_failed(message.clone())?;
                drop(state);
                warn!("Onboarding submission failed: {}", message);
                self.emit(WizardEvent::SubmissionFailed { message });
                Err(e)
            }
        }
    }

    /// Write the onboarding record for the current principal. Called at
    /// most once per submission, bounded by `commit_timeout`.
    async fn commit(&self, record: OnboardingRecord) -> Result<DateTime<Utc>, WizardError> {
        let principal = self.identity.current_principal_id().ok_or_else(|| {
            WizardError::Precondition("no authenticated user to save onboarding for".to_string())
        })?;

        info!(
            principal = %principal,
            role = %record.role,
            skills = record.skills.len(),
            time_commitment = %record.time_commitment,
            "Saving onboarding"
        );

        let timeout = self.config.commit_timeout;
        match tokio::time::timeout(timeout, self.store.merge_write(&principal, &record)).await {
            Ok(Ok(completed_at)) => Ok(completed_at),
            Ok(Err(e)) => Err(WizardError::Persistence(e)),
            Err(_) => Err(WizardError::Timeout(timeout)),
        }
    }

    fn emit(&self, event: WizardEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Puts the wizard back on the last data step if an `advance` future is
/// dropped while its write is pending.
struct CancelledSubmission<'a> {
    state: Option<&'a RwLock<WizardState>>,
}

impl<'a> CancelledSubmission<'a> {
    fn new(state: &'a RwLock<WizardState>) -> Self {
        Self { state: Some(state) }
    }

    fn disarm(&mut self) {
        self.state = None;
    }
}

impl Drop for CancelledSubmission<'_> {
    fn drop(&mut self) {
        let Some(state) = self.state else { return };
        match state.try_write() {
            Ok(mut state) if state.submission_in_flight() => {
                warn!("Onboarding submission cancelled before the write resolved");
                let _ = state.submission_failed("submission was cancelled, please try again");
            }
            Ok(_) => {}
            Err(_) => warn!("Could not reset cancelled onboarding submission"),
        }
    }
}

/// Snapshot the collected answers into the record to persist.
fn record_from(state: &WizardState) -> Result<OnboardingRecord, WizardError> {
    match (&state.selected_role, &state.selected_time_commitment) {
        (Some(role), Some(time)) => Ok(OnboardingRecord::new(
            role.clone(),
            state.skill_levels.clone(),
            time.clone(),
        )),
        _ => {
            error!(
                role = ?state.selected_role,
                time_commitment = ?state.selected_time_commitment,
                "Reached submission with missing answers"
            );
            Err(WizardError::Precondition(
                "role and time commitment must be selected".to_string(),
            ))
        }
    }
}

fn unknown(kind: &str, id: &str) -> WizardError {
    WizardError::UnknownOption {
        kind: kind.to_string(),
        id: id.to_string(),
    }
}

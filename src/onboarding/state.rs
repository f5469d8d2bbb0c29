//! Wizard state machine — tracks which step the user is on and what they
//! have entered so far.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::WizardError;

/// The steps of the onboarding wizard.
///
/// Progresses linearly: Role → Skills → TimeCommitment → Submitting →
/// Complete. A failed submission drops back to TimeCommitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Role,
    Skills,
    TimeCommitment,
    Submitting,
    Complete,
}

impl WizardStep {
    /// The three steps the user fills in, in order.
    pub const DATA_STEPS: [WizardStep; 3] = [Self::Role, Self::Skills, Self::TimeCommitment];

    /// 1-based position among the data steps.
    pub fn number(&self) -> Option<u8> {
        match self {
            Self::Role => Some(1),
            Self::Skills => Some(2),
            Self::TimeCommitment => Some(3),
            Self::Submitting | Self::Complete => None,
        }
    }

    /// Short name shown in the step header.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Role => "Role",
            Self::Skills => "Skills",
            Self::TimeCommitment => "Time",
            Self::Submitting => "Saving",
            Self::Complete => "Done",
        }
    }

    /// Next step on a successful advance, if any.
    pub fn next(&self) -> Option<WizardStep> {
        match self {
            Self::Role => Some(Self::Skills),
            Self::Skills => Some(Self::TimeCommitment),
            Self::TimeCommitment => Some(Self::Submitting),
            Self::Submitting => Some(Self::Complete),
            Self::Complete => None,
        }
    }

    /// Previous step on retreat. Only the second and third data steps have one.
    pub fn previous(&self) -> Option<WizardStep> {
        match self {
            Self::Skills => Some(Self::Role),
            Self::TimeCommitment => Some(Self::Skills),
            Self::Role | Self::Submitting | Self::Complete => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Position used to order steps when rendering progress.
    fn ordinal(&self) -> u8 {
        match self {
            Self::Role => 1,
            Self::Skills => 2,
            Self::TimeCommitment => 3,
            Self::Submitting => 4,
            Self::Complete => 5,
        }
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Role => "role",
            Self::Skills => "skills",
            Self::TimeCommitment => "time_commitment",
            Self::Submitting => "submitting",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// How a data step is drawn in the progress header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Current,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepProgress {
    pub number: u8,
    pub name: &'static str,
    pub status: StepStatus,
}

/// In-memory wizard state. Lives as long as the onboarding flow and is
/// dropped afterwards; only the final record is persisted.
#[derive(Debug, Clone, Default)]
pub struct WizardState {
    pub step: WizardStep,
    pub selected_role: Option<String>,
    pub skill_levels: BTreeMap<String, u8>,
    pub selected_time_commitment: Option<String>,
    /// Message from the last failed submission, cleared on the next transition.
    pub last_error: Option<String>,
}

impl WizardState {
    /// Whether a profile write is pending.
    pub fn submission_in_flight(&self) -> bool {
        self.step == WizardStep::Submitting
    }

    /// Completeness predicate for the current step.
    pub fn is_step_complete(&self, min_skills: usize) -> bool {
        match self.step {
            WizardStep::Role => self.selected_role.is_some(),
            WizardStep::Skills => self.skill_levels.len() >= min_skills,
            WizardStep::TimeCommitment => self.selected_time_commitment.is_some(),
            WizardStep::Submitting | WizardStep::Complete => false,
        }
    }

    /// Whether the "continue" action is enabled right now.
    pub fn can_proceed(&self, min_skills: usize) -> bool {
        !self.submission_in_flight() && self.is_step_complete(min_skills)
    }

    /// Whether the "back" action is enabled right now.
    pub fn can_go_back(&self) -> bool {
        self.step.previous().is_some()
    }

    pub fn select_role(&mut self, role: String) -> Result<(), WizardError> {
        self.require_step(WizardStep::Role, "select a role")?;
        self.selected_role = Some(role);
        Ok(())
    }

    /// Record a level for a skill. Re-assessing overwrites the old level.
    pub fn assess(&mut self, skill: String, level: u8) -> Result<(), WizardError> {
        self.require_step(WizardStep::Skills, "assess a skill")?;
        self.skill_levels.insert(skill, level);
        Ok(())
    }

    pub fn select_time_commitment(&mut self, time: String) -> Result<(), WizardError> {
        self.require_step(WizardStep::TimeCommitment, "select a time commitment")?;
        self.selected_time_commitment = Some(time);
        Ok(())
    }

    /// Move forward one step. From the last data step this enters
    /// `Submitting`; the caller is then responsible for the commit.
    pub fn advance(&mut self, min_skills: usize) -> Result<WizardStep, WizardError> {
        match self.step {
            WizardStep::Submitting => return Err(WizardError::SubmissionInFlight),
            WizardStep::Complete => return Err(self.invalid("advance")),
            _ => {}
        }
        if !self.is_step_complete(min_skills) {
            return Err(WizardError::StepIncomplete {
                step: self.step.to_string(),
            });
        }
        let next = self.step.next().ok_or_else(|| self.invalid("advance"))?;
        self.step = next;
        self.last_error = None;
        Ok(next)
    }

    /// Move back one step. A no-op on the first step; never clears data.
    pub fn retreat(&mut self) -> Result<WizardStep, WizardError> {
        match self.step {
            WizardStep::Role => Ok(WizardStep::Role),
            WizardStep::Submitting => Err(WizardError::SubmissionInFlight),
            WizardStep::Complete => Err(self.invalid("go back")),
            step => {
                let previous = step.previous().ok_or_else(|| self.invalid("go back"))?;
                self.step = previous;
                Ok(previous)
            }
        }
    }

    /// `Submitting → Complete`.
    pub fn submission_succeeded(&mut self) -> Result<(), WizardError> {
        self.require_step(WizardStep::Submitting, "complete")?;
        self.step = WizardStep::Complete;
        self.last_error = None;
        Ok(())
    }

    /// `Submitting → TimeCommitment`, keeping everything entered so far.
    pub fn submission_failed(&mut self, message: impl Into<String>) -> Result<(), WizardError> {
        self.require_step(WizardStep::Submitting, "fail a submission")?;
        self.step = WizardStep::TimeCommitment;
        self.last_error = Some(message.into());
        Ok(())
    }

    /// Progress header for the three data steps.
    pub fn progress(&self) -> Vec<StepProgress> {
        let current = self.step.ordinal();
        WizardStep::DATA_STEPS
            .iter()
            .map(|step| {
                let status = match step.ordinal().cmp(&current) {
                    std::cmp::Ordering::Less => StepStatus::Done,
                    std::cmp::Ordering::Equal => StepStatus::Current,
                    std::cmp::Ordering::Greater => StepStatus::Pending,
                };
                StepProgress {
                    number: step.ordinal(),
                    name: step.label(),
                    status,
                }
            })
            .collect()
    }

    fn require_step(&self, expected: WizardStep, action: &str) -> Result<(), WizardError> {
        if self.step == expected {
            Ok(())
        } else if self.submission_in_flight() {
            Err(WizardError::SubmissionInFlight)
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &str) -> WizardError {
        WizardError::InvalidTransition {
            action: action.to_string(),
            step: self.step.to_string(),
        }
    }
}

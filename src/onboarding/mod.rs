//! Onboarding — the three-step wizard new users go through.
//!
//! The wizard collects a role, self-assessed skill levels and a weekly time
//! commitment, validating each step before moving on. On the final step it
//! merges a single `OnboardingRecord` into the user's profile document; the
//! `onboardingCompleted` flag on that document tells the rest of the
//! application to stop routing the user here.

pub mod model;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod wizard;

pub use model::{Catalog, CatalogOption, OnboardingRecord, UserProfile};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use sessions::WizardSessions;
pub use state::{WizardState, WizardStep};
pub use wizard::{AdvanceOutcome, OnboardingWizard, WizardEvent, WizardSnapshot};

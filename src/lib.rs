//! SkillForge — onboarding wizard and profile persistence.

pub mod config;
pub mod error;
pub mod identity;
pub mod onboarding;
pub mod store;
pub mod server;

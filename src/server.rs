//! Wires config, store and routes into the service's router.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::error::Result;
use crate::onboarding::sessions::spawn_expiry_task;
use crate::onboarding::{Catalog, OnboardingRouteState, WizardSessions, onboarding_routes};
use crate::store::{LibSqlProfileStore, ProfileStore};

/// Open the profile database named by `config` and build the router.
pub async fn build_app(config: &AppConfig) -> Result<Router> {
    let store: Arc<dyn ProfileStore> = Arc::new(LibSqlProfileStore::new_local(&config.db_path).await?);
    Ok(router(store, config))
}

/// Router over an already-open store. The browser front-end is served from
/// another origin, hence the permissive CORS layer.
///
/// Must be called inside a Tokio runtime: it starts the idle-session sweep.
pub fn router(store: Arc<dyn ProfileStore>, config: &AppConfig) -> Router {
    let sessions = WizardSessions::new(store, Arc::new(Catalog::default()), config.wizard.clone());
    spawn_expiry_task(&sessions);
    onboarding_routes(OnboardingRouteState { sessions }).layer(CorsLayer::permissive())
}

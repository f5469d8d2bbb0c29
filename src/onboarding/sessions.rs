//! Wizard sessions — one live `OnboardingWizard` per browser flow.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::WizardConfig;
use crate::identity::StaticIdentity;
use crate::store::ProfileStore;

use super::model::Catalog;
use super::wizard::OnboardingWizard;

/// A live wizard and when it was last used.
struct Session {
    wizard: Arc<OnboardingWizard>,
    last_used: Instant,
}

/// Registry of in-progress wizards, keyed by session id.
///
/// Each session gets its own wizard (and so its own state). All of them
/// share the store, catalog and config. Sessions idle for longer than
/// `WizardConfig::session_ttl` are dropped by `expire_idle`.
pub struct WizardSessions {
    sessions: RwLock<HashMap<Uuid, Session>>,
    store: Arc<dyn ProfileStore>,
    catalog: Arc<Catalog>,
    config: WizardConfig,
}

impl WizardSessions {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        catalog: Arc<Catalog>,
        config: WizardConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            catalog,
            config,
        })
    }

    /// Start a wizard for `principal` (None if the request was anonymous).
    pub async fn create(&self, principal: Option<String>) -> (Uuid, Arc<OnboardingWizard>) {
        let id = Uuid::new_v4();
        let authenticated = principal.is_some();
        let wizard = Arc::new(OnboardingWizard::new(
            Arc::new(StaticIdentity::from(principal)),
            Arc::clone(&self.store),
            Arc::clone(&self.catalog),
            self.config.clone(),
        ));
        self.expire_idle().await;
        self.sessions.write().await.insert(
            id,
            Session {
                wizard: Arc::clone(&wizard),
                last_used: Instant::now(),
            },
        );
        info!(session_id = %id, authenticated, "Onboarding session started");
        (id, wizard)
    }

    /// Look up a session and mark it as used.
    pub async fn get(&self, id: Uuid) -> Option<Arc<OnboardingWizard>> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id)?;
        session.last_used = Instant::now();
        Some(Arc::clone(&session.wizard))
    }

    /// Drop sessions idle for longer than the configured TTL.
    /// Returns the number dropped.
    pub async fn expire_idle(&self) -> usize {
        let ttl = self.config.session_ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.last_used.elapsed() < ttl;
            if !keep {
                debug!(session_id = %id, "Onboarding session expired");
            }
            keep
        });
        let expired = before - sessions.len();
        if expired > 0 {
            info!(count = expired, "Expired idle onboarding sessions");
        }
        expired
    }

    /// Drop a session. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Onboarding session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }
}

/// Spawn a background task that periodically drops idle sessions. It
/// stops once the registry itself is dropped.
pub fn spawn_expiry_task(sessions: &Arc<WizardSessions>) -> tokio::task::JoinHandle<()> {
    let sessions = Arc::downgrade(sessions);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let Some(sessions) = sessions.upgrade() else {
                return;
            };
            sessions.expire_idle().await;
        }
    })
}

//! Identity provider — who the wizard is acting for.

/// Supplies the authenticated principal, if any.
///
/// Authentication itself lives outside this crate. The wizard only asks for
/// a stable user id at commit time; `None` means nobody is signed in.
pub trait IdentityProvider: Send + Sync {
    fn current_principal_id(&self) -> Option<String>;
}

/// Identity fixed at construction. Used for request-scoped principals
/// (one per HTTP session) and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    principal: Option<String>,
}

impl StaticIdentity {
    /// A blank id is treated as no signed-in user.
    pub fn new(principal: impl Into<String>) -> Self {
        Self::from(Some(principal.into()))
    }

    /// No signed-in user.
    pub fn anonymous() -> Self {
        Self { principal: None }
    }
}

impl From<Option<String>> for StaticIdentity {
    fn from(principal: Option<String>) -> Self {
        // Blank ids are treated as absent.
        Self {
            principal: principal.filter(|p| !p.trim().is_empty()),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_principal_id(&self) -> Option<String> {
        self.principal.clone()
    }
}

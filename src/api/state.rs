use crate::account::{AccountConfig, Backend, CsrfTokenService};

/// Shared by every handler through an `Extension<Arc<AppState>>`.
pub struct AppState {
    store: Backend,
    csrf: CsrfTokenService,
    config: AccountConfig,
}

impl AppState {
    #[must_use]
    pub fn new(store: Backend, config: AccountConfig) -> Self {
        Self {
            store,
            csrf: config.csrf(),
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Backend {
        &self.store
    }

    #[must_use]
    pub fn csrf(&self) -> &CsrfTokenService {
        &self.csrf
    }

    #[must_use]
    pub fn config(&self) -> &AccountConfig {
        &self.config
    }
}

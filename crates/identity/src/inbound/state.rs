use std::sync::Arc;

use app_core::config::Config;
use tower_cookies::Key;

use crate::usecase::authn::AuthnUseCase;
use crate::usecase::reconcile::ReconcilerUseCase;

#[derive(Clone)]
pub struct IdentityState {
    pub cookie_key: Key,
    pub config: Arc<Config>,
    pub authn: Arc<dyn AuthnUseCase>,
    pub reconciler: Arc<dyn ReconcilerUseCase>,
}

impl IdentityState {
    pub fn new(
        cookie_key: Key,
        config: Arc<Config>,
        authn: Arc<dyn AuthnUseCase>,
        reconciler: Arc<dyn ReconcilerUseCase>,
    ) -> Self {
        Self { cookie_key, config, authn, reconciler }
    }
}

#[cfg(test)]
mod tests {
    use app_core::config::test_utils::TestConfigBuilder;

    use super::*;
    use crate::usecase::authn::MockAuthnUseCase;
    use crate::usecase::reconcile::MockReconcilerUseCase;

    #[test]
    fn test_identity_state_new() {
        let cookie_key = Key::generate();
        let authn: Arc<dyn AuthnUseCase> = Arc::new(MockAuthnUseCase::new());
        let reconciler: Arc<dyn ReconcilerUseCase> = Arc::new(MockReconcilerUseCase::new());
        let config = Arc::new(TestConfigBuilder::new().build());

        let state = IdentityState::new(cookie_key.clone(), config, authn.clone(), reconciler.clone());

        assert!(Arc::ptr_eq(&state.authn, &authn));
        assert!(Arc::ptr_eq(&state.reconciler, &reconciler));
        assert_eq!(state.cookie_key.master(), cookie_key.master());
    }
}

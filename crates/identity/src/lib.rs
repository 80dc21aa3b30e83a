mod domain;
mod inbound;
mod outbound;
mod usecase;

use std::sync::Arc;

use app_core::config::Config;
use app_core::oauth::OAuthManager;
use app_core::password::Hasher;
use app_core::uid::Generator;
pub use inbound::router::create_router;
use sea_orm::DatabaseConnection;
use tower_cookies::Key;

use crate::inbound::state::IdentityState;
use crate::outbound::orm::IdentityORM;
use crate::usecase::authn::AuthnService;
use crate::usecase::reconcile::{ReconcilerService, ReconcilerUseCase};

pub struct Dependency {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
    pub uid: Arc<dyn Generator>,
    pub hasher: Arc<dyn Hasher>,
    pub oauth: OAuthManager,
    pub cookie_key: Key,
}

pub fn new(dep: Dependency) -> IdentityState {
    let store = Arc::new(IdentityORM::new(dep.db));

    let reconciler: Arc<dyn ReconcilerUseCase> =
        Arc::new(ReconcilerService::new(dep.uid.clone(), store.clone()));
    let authn_svc = Arc::new(AuthnService::new(
        dep.hasher,
        dep.uid,
        dep.oauth,
        store,
        reconciler.clone(),
    ));

    IdentityState::new(dep.cookie_key, dep.config, authn_svc, reconciler)
}

//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::session::{SessionRegistry, SessionService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub sessions: Arc<SessionService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let registry = Arc::new(SessionRegistry::new());
        let sessions = Arc::new(SessionService::new(
            registry.clone(),
            config.session_config(),
        ));

        Self {
            config,
            registry,
            sessions,
        }
    }
}

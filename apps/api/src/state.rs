use std::sync::Arc;

use crate::config::Config;
use crate::session::SessionService;
use crate::stores::KvStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionService>,
    pub store: Arc<dyn KvStore>,
    /// Startup configuration, kept for handlers that need tuning knobs.
    #[allow(dead_code)]
    pub config: Config,
}

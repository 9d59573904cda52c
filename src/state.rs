// src/state.rs
use std::sync::Arc;
use std::time::Duration;

use crate::prompts::Prompts;
use crate::services::classifier::EscalationClassifier;
use crate::services::completion::CompletionService;
use crate::services::metrics_manager::MetricsManager;
use crate::services::persistence::PersistenceSink;
use crate::services::session_manager::SessionManager;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub sessions: SessionManager,
    pub metrics: MetricsManager,
    pub classifier: EscalationClassifier,
    pub completion: Arc<dyn CompletionService>,
    pub sink: Arc<dyn PersistenceSink>,
    pub admin_key: Option<String>,
}

impl AppState {
    pub fn new(
        session_ttl: Duration,
        classifier: EscalationClassifier,
        completion: Arc<dyn CompletionService>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            sessions: SessionManager::new(session_ttl, Prompts::default()),
            metrics: MetricsManager::new(),
            classifier,
            completion,
            sink,
            admin_key: None,
        }
    }

    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.admin_key = Some(key.into());
        self
    }
}

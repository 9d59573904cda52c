use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::classifier::Escalation;
use super::session_manager::Rating;

#[derive(Debug, Default, Clone, Serialize)]
pub struct MetricsData {
    pub escalation_usage: HashMap<String, u64>,
    pub feedback_usage: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct MetricsManager {
    inner: Arc<RwLock<MetricsData>>,
}

impl Default for MetricsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsData::default())),
        }
    }

    // One count per classified user message.
    pub async fn increment_escalation(&self, escalation: &Escalation) {
        let mut data = self.inner.write().await;
        *data
            .escalation_usage
            .entry(escalation.label().to_string())
            .or_insert(0) += 1;
    }

    pub async fn increment_feedback(&self, rating: Rating) {
        let mut data = self.inner.write().await;
        *data.feedback_usage.entry(rating.label().to_string()).or_insert(0) += 1;
    }

    pub async fn get_metrics(&self) -> MetricsData {
        self.inner.read().await.clone()
    }
}

use std::sync::Arc;

use crate::config::ReviserConfig;
use crate::revision::{HttpRevisionModel, RevisionError, RevisionModel, RevisionOrchestrator};

pub type SharedOrchestrator = RevisionOrchestrator<Arc<dyn RevisionModel>>;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ReviserConfig,
    orchestrator: Option<SharedOrchestrator>,
}

impl AppState {
    pub fn new(config: ReviserConfig, model: Option<Arc<dyn RevisionModel>>) -> Self {
        let orchestrator =
            model.map(|model| RevisionOrchestrator::new(model).with_budgets(config.budgets));
        Self {
            inner: Arc::new(AppStateInner {
                config,
                orchestrator,
            }),
        }
    }

    /// Build state from config, wiring the HTTP model when an endpoint is set.
    pub fn from_config(config: ReviserConfig) -> Result<Self, RevisionError> {
        let model: Option<Arc<dyn RevisionModel>> = if config.ai.url.is_some() {
            let model = HttpRevisionModel::from_config(&config.ai)?;
            tracing::info!(endpoint = %model.endpoint(), "AI revision endpoint configured");
            Some(Arc::new(model))
        } else {
            tracing::warn!("No AI endpoint configured; /revision/revise will be unavailable");
            None
        };
        Ok(Self::new(config, model))
    }

    pub fn config(&self) -> &ReviserConfig {
        &self.inner.config
    }

    pub fn orchestrator(&self) -> Option<&SharedOrchestrator> {
        self.inner.orchestrator.as_ref()
    }
}

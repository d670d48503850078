use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::controller::JobController;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub controller: Arc<JobController>,
}

impl AppState {
    pub fn new(config: AppConfig, controller: JobController) -> Self {
        Self {
            config: Arc::new(config),
            controller: Arc::new(controller),
        }
    }
}

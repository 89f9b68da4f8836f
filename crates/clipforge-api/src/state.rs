//! Shared application state.

use std::sync::Arc;

use clipforge_hub::ProgressHub;
use clipforge_worker::{Worker, WorkerConfig};

use crate::config::ApiConfig;

/// State threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub worker_config: WorkerConfig,
    pub hub: Arc<ProgressHub>,
    pub worker: Arc<Worker>,
}

impl AppState {
    pub fn new(config: ApiConfig, worker_config: WorkerConfig) -> Self {
        let hub = Arc::new(ProgressHub::new());
        let worker = Arc::new(Worker::new(worker_config.clone(), hub.clone()));
        Self {
            config,
            worker_config,
            hub,
            worker,
        }
    }
}

pub mod config;
pub mod domain;
pub mod error;
pub mod policy;
pub mod rest;
pub mod service;
pub mod storage;

use std::sync::Arc;

use config::DaemonConfig;
use storage::Storage;

/// Shared application state passed to every route handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    pub storage: Arc<Storage>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub fn new(config: Arc<DaemonConfig>, storage: Arc<Storage>) -> Self {
        Self {
            config,
            storage,
            started_at: std::time::Instant::now(),
        }
    }
}

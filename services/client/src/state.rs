//! Shared Application State
//!
//! Built once at startup from the [`Config`]: the configuration itself and
//! the tutoring service every view talks to.

use crate::config::{Backend, Config};
use crate::http::HttpTutorService;
use std::sync::Arc;
use teachit_core::error::Result;
use teachit_core::offline::OfflineTutorService;
use teachit_core::service::TutorService;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn TutorService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Selects the backend named by `config.backend`.
    pub fn from_config(config: Config) -> Result<Self> {
        let service: Arc<dyn TutorService> = match config.backend {
            Backend::Http => {
                let http = HttpTutorService::from_config(&config)?;
                info!(base_url = %http.base_url(), "Using HTTP backend.");
                Arc::new(http)
            }
            Backend::Offline => {
                info!("Using offline backend.");
                Arc::new(OfflineTutorService::new())
            }
        };
        Ok(Self {
            service,
            config: Arc::new(config),
        })
    }
}

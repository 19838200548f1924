use std::sync::Arc;

use tracing::{error, info, warn};

use super::{
    config::Config,
    database::prepare_storage,
    grouping::{Completions, OpenAiClient},
};

pub struct AppState {
    pub config: Config,
    pub completions: Option<Arc<dyn Completions>>,
}

impl AppState {
    /// Dependencies that fail to initialise are logged and left out, the
    /// requests that need them fail on their own.
    pub fn new() -> Arc<Self> {
        let config = Config::load();

        match prepare_storage(&config.db_dir) {
            Ok(()) => info!("Database directory ready at {}", config.db_dir.display()),
            Err(e) => error!("Error preparing database directory: {e}"),
        }

        let completions: Option<Arc<dyn Completions>> = match OpenAiClient::from_config(&config) {
            Some(client) => {
                info!("Completion client initialized ({})", config.openai_model);
                Some(Arc::new(client))
            }
            None => {
                warn!("OPENAI_API_KEY not set, word grouping disabled");
                None
            }
        };

        Self::with_parts(config, completions)
    }

    pub fn with_parts(config: Config, completions: Option<Arc<dyn Completions>>) -> Arc<Self> {
        Arc::new(Self {
            config,
            completions,
        })
    }
}

use std::sync::Arc;

use mongodb::{Client as MongoClient, Database};

use crate::config::Config;
use crate::store::{
    AttemptStore, ExamCatalog, FileCatalog, MemoryAttemptStore, MongoAttemptStore, MongoCatalog,
};

use self::notifier::{LogNotifier, Notifier, WebhookNotifier};

pub struct AppState {
    pub config: Config,
    /// Present only when MongoDB backs the store or the catalog; health
    /// checks ping it when it exists.
    pub mongo: Option<Database>,
    pub store: Arc<dyn AttemptStore>,
    pub catalog: Arc<dyn ExamCatalog>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: Option<MongoClient>) -> anyhow::Result<Self> {
        let mongo = mongo_client.map(|client| client.database(&config.mongo_database));

        let store: Arc<dyn AttemptStore> = match config.storage_backend.as_str() {
            "memory" => {
                tracing::warn!("Using in-memory attempt store; all state is lost on restart");
                Arc::new(MemoryAttemptStore::new())
            }
            "mongo" => {
                let db = mongo
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("Mongo storage backend requires a client"))?;
                Arc::new(MongoAttemptStore::new(db))
            }
            other => anyhow::bail!("Unknown storage backend '{}'", other),
        };

        let catalog: Arc<dyn ExamCatalog> = match &config.catalog_file {
            Some(path) => Arc::new(FileCatalog::from_path(path)?),
            None => {
                let db = mongo
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("Mongo exam catalog requires a client"))?;
                Arc::new(MongoCatalog::new(db))
            }
        };

        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
            None => Arc::new(LogNotifier),
        };

        Ok(Self {
            config,
            mongo,
            store,
            catalog,
            notifier,
        })
    }

    /// Assemble a state from pre-built parts; used by tests and by any
    /// embedder that wires its own store.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn AttemptStore>,
        catalog: Arc<dyn ExamCatalog>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            mongo: None,
            store,
            catalog,
            notifier,
        }
    }
}

pub mod attempt_service;
pub mod bootstrap;
pub mod grading_service;
pub mod notifier;
pub mod scoring;

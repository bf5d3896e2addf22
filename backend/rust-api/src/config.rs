use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    /// "mongo" (durable) or "memory" (ephemeral dev mode).
    pub storage_backend: String,
    /// Path to a JSON catalog file; when unset the exam catalog is served
    /// from MongoDB.
    pub catalog_file: Option<String>,
    /// Ingest endpoint of the external notification system; when unset
    /// events are only logged.
    pub notify_webhook_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "examdesk".to_string());

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let storage_backend = settings
            .get_string("storage.backend")
            .or_else(|_| env::var("STORAGE_BACKEND"))
            .unwrap_or_else(|_| "mongo".to_string());

        let catalog_file = settings
            .get_string("catalog.file")
            .or_else(|_| env::var("CATALOG_FILE"))
            .ok();

        let notify_webhook_url = settings
            .get_string("notifications.webhook_url")
            .or_else(|_| env::var("NOTIFY_WEBHOOK_URL"))
            .ok();

        Ok(Config {
            mongo_uri,
            mongo_database,
            jwt_secret,
            storage_backend,
            catalog_file,
            notify_webhook_url,
        })
    }

    /// Minimal config for tests: memory store, fixed secret, no webhook.
    pub fn for_tests() -> Self {
        Config {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "examdesk_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            storage_backend: "memory".to_string(),
            catalog_file: None,
            notify_webhook_url: None,
        }
    }
}

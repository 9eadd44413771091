//! Connection settings for the MongoDB backend.
//!
//! Reading the settings from a file or the environment is left to the application;
//! this struct only fixes their shape and defaults.
//!
//! ```ignore
//! let config: MongoDbConfig = serde_json::from_str(r#"{ "database": "app" }"#)?;
//! let store = MongoDbStoreBuilder::from_config(&config).build().await?;
//! ```

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MongoDbConfig {
    /// Connection string.
    pub dsn: String,
    pub database: String,
    /// Default server-side time limit of multi-document reads, in milliseconds.
    pub query_timeout_ms: Option<u64>,
}

impl MongoDbConfig {
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            dsn: "mongodb://localhost:27017".to_string(),
            database: "docent".to_string(),
            query_timeout_ms: None,
        }
    }
}

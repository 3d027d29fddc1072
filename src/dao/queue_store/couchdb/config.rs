use std::time::Duration;

use super::error::{CouchDaoError, CouchResult};
use crate::dao::queue_store::{GAMES_TABLE, QUEUE_TABLE};

/// Default long-poll window used by the change feed.
const DEFAULT_CHANGES_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime configuration describing how to connect to CouchDB.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    /// Database holding the queue rows.
    pub queue_database: String,
    /// Database holding the game rows.
    pub games_database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// How long a single `_changes` long-poll request may stay open.
    pub changes_timeout: Duration,
}

impl CouchConfig {
    /// Construct a configuration from an explicit base URL using the default database names.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            queue_database: QUEUE_TABLE.to_owned(),
            games_database: GAMES_TABLE.to_owned(),
            username: None,
            password: None,
            changes_timeout: DEFAULT_CHANGES_TIMEOUT,
        }
    }

    /// Override the database names.
    pub fn with_databases(
        mut self,
        queue_database: impl Into<String>,
        games_database: impl Into<String>,
    ) -> Self {
        self.queue_database = queue_database.into();
        self.games_database = games_database.into();
        self
    }

    /// Attach basic-auth credentials to the configuration.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;

        let mut config = Self::new(base_url);

        let queue_database =
            std::env::var("COUCH_QUEUE_DB").unwrap_or_else(|_| config.queue_database.clone());
        let games_database =
            std::env::var("COUCH_GAMES_DB").unwrap_or_else(|_| config.games_database.clone());
        config = config.with_databases(queue_database, games_database);

        if let (Some(username), Some(password)) = (
            std::env::var("COUCH_USERNAME").ok(),
            std::env::var("COUCH_PASSWORD").ok(),
        ) {
            config = config.with_credentials(username, password);
        }

        Ok(config)
    }
}

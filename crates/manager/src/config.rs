//! CouchDB connection configuration loaded from environment variables.

/// Default server URL when `COUCHDB_SERVER` is unset.
pub const DEFAULT_SERVER: &str = "http://localhost:5984/";

/// Default database name when `COUCHDB_DATABASE` is unset.
pub const DEFAULT_DATABASE: &str = "couchdb";

/// Where the manager connects and whether it may sync per request.
///
/// Reads from environment variables:
/// - `COUCHDB_SERVER`: server URL, credentials allowed (default: `"http://localhost:5984/"`)
/// - `COUCHDB_DATABASE`: database name (default: `"couchdb"`)
/// - `COUCHDB_DISABLE_AUTO_SYNC`: set to `1`, `true`, `yes` or `on` to turn
///   off per-request syncing regardless of the manager's own setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouchConfig {
    pub server_url: String,
    pub database: String,
    pub disable_auto_sync: bool,
}

impl CouchConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CouchConfig::from_env`] with a different default database.
    pub fn from_env_or(database: &str) -> Self {
        let mut config = Self::from_env();
        if std::env::var("COUCHDB_DATABASE").is_err() {
            config.database = database.to_string();
        }
        config
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            server_url: lookup("COUCHDB_SERVER").unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            database: lookup("COUCHDB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            disable_auto_sync: lookup("COUCHDB_DISABLE_AUTO_SYNC")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
        }
    }

    /// Sets the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the process-wide auto-sync override.
    pub fn with_disable_auto_sync(mut self, disable: bool) -> Self {
        self.disable_auto_sync = disable;
        self
    }
}

impl Default for CouchConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            disable_auto_sync: false,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

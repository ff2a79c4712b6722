use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Default connection (busy) timeout, in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default number of pooled connections
pub const DEFAULT_POOL_SIZE: u32 = 4;

/// Default session lifetime (2 hours)
pub const DEFAULT_SESSION_LIFETIME_SECS: u64 = 7200;

/// Default retention of login attempts before maintenance removes them (24 hours)
pub const DEFAULT_LOGIN_ATTEMPT_RETENTION_SECS: u64 = 86400;

/// Default maximum upload size (5 MiB)
pub const DEFAULT_UPLOAD_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Default location of the schema script, relative to the working directory
pub const DEFAULT_SCHEMA_PATH: &str = "schema/schema.sql";

#[derive(Debug, Clone, Serialize)]
pub struct EventdbConfig {
    /// Path to the directory holding eventdb's data
    pub data_dir: String,

    /// Path to the SQLite database file (default: `{data_dir}/eventdb.sqlite3`)
    pub database_path: String,

    /// Path to the schema script executed on first bootstrap
    pub schema_path: String,

    /// Maximum number of pooled connections
    pub pool_size: u32,

    /// Bound on connection attempts and lock waits, in seconds
    pub connect_timeout_secs: u64,

    /// Verbose diagnostics, including full connection error detail
    pub debug: bool,

    /// Application timezone name, e.g. "Europe/Berlin"
    pub timezone: String,

    /// Session lifetime in seconds
    pub session_lifetime_secs: u64,

    /// Directory where uploaded event images are stored
    pub upload_dir: String,

    /// Maximum accepted upload size in bytes
    pub upload_max_bytes: u64,

    /// How long login attempts are kept before maintenance removes them
    pub login_attempt_retention_secs: u64,

    /// Append log output to this file instead of stderr
    pub log_file: Option<String>,
}

const EMPTY_CONFIG: &str = r#"### eventdb configuration file

### directory for data used by eventdb
# data_dir = "~/.eventdb"

### database settings
# database_path = "~/.eventdb/eventdb.sqlite3"
# schema_path = "schema/schema.sql"
# pool_size = 4
# connect_timeout_secs = 30

### application settings
# debug = false
# timezone = "UTC"
# session_lifetime_secs = 7200          # 2 hours
# upload_dir = "~/.eventdb/uploads"
# upload_max_bytes = 5242880            # 5 MiB

### maintenance
# login_attempt_retention_secs = 86400  # 24 hours

### logging (stderr when unset)
# log_file = "~/.eventdb/eventdb.log"
"#;

/// Database-related subset of the configuration, consumed by the pool
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub schema_path: String,
    pub pool_size: u32,
    pub connect_timeout_secs: u64,
    pub debug: bool,
}

impl DatabaseConfig {
    /// Database settings for a file path with all other values at their defaults
    pub fn for_path(path: &str) -> Self {
        Self {
            path: path.to_string(),
            schema_path: DEFAULT_SCHEMA_PATH.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            debug: false,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for EventdbConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self::with_data_dir(format!("{}/.eventdb", home_dir))
    }
}

impl EventdbConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<EventdbConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.eventdb/eventdb.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let eventdb_dir = format!("{}/.eventdb", home_dir.as_str());

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(eventdb_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create eventdb directory: {}", e))?;
                let p = format!("{}/eventdb.toml", eventdb_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // E.g., `EVENTDB_DEBUG=true eventdb status` turns on verbose diagnostics
        builder = builder.add_source(config::Environment::with_prefix("EVENTDB"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let values = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let config = Self::from_map(&values, &eventdb_dir);
        std::fs::create_dir_all(config.data_dir.as_str())
            .map_err(|e| anyhow!("Unable to create data directory: {}", e))?;

        Ok(config)
    }

    /// Build a configuration from flat key/value settings
    ///
    /// Missing or unparseable values fall back to their defaults.
    pub fn from_map(values: &HashMap<String, String>, default_data_dir: &str) -> EventdbConfig {
        let data_dir = values
            .get("data_dir")
            .map(|p| expand_home(p))
            .unwrap_or_else(|| default_data_dir.to_string());

        let mut config = Self::with_data_dir(data_dir);

        if let Some(p) = values.get("database_path") {
            config.database_path = expand_home(p);
        }
        if let Some(p) = values.get("schema_path") {
            config.schema_path = expand_home(p);
        }
        if let Some(p) = values.get("upload_dir") {
            config.upload_dir = expand_home(p);
        }
        if let Some(tz) = values.get("timezone") {
            config.timezone = tz.clone();
        }
        config.log_file = values.get("log_file").map(|p| expand_home(p));

        config.debug = values
            .get("debug")
            .and_then(|s| parse_bool(s))
            .unwrap_or(false);
        config.pool_size = values
            .get("pool_size")
            .and_then(|s| s.parse().ok())
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_POOL_SIZE);
        config.connect_timeout_secs = values
            .get("connect_timeout_secs")
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
        config.session_lifetime_secs = values
            .get("session_lifetime_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SESSION_LIFETIME_SECS);
        config.upload_max_bytes = values
            .get("upload_max_bytes")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_UPLOAD_MAX_BYTES);
        config.login_attempt_retention_secs = values
            .get("login_attempt_retention_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LOGIN_ATTEMPT_RETENTION_SECS);

        config
    }

    fn with_data_dir(data_dir: String) -> EventdbConfig {
        let base = data_dir.trim_end_matches('/').to_string();
        EventdbConfig {
            database_path: format!("{}/eventdb.sqlite3", base),
            schema_path: DEFAULT_SCHEMA_PATH.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            debug: false,
            timezone: "UTC".to_string(),
            session_lifetime_secs: DEFAULT_SESSION_LIFETIME_SECS,
            upload_dir: format!("{}/uploads", base),
            upload_max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
            login_attempt_retention_secs: DEFAULT_LOGIN_ATTEMPT_RETENTION_SECS,
            log_file: None,
            data_dir,
        }
    }

    /// Database settings handed to the connection pool
    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig {
            path: self.database_path.clone(),
            schema_path: self.schema_path.clone(),
            pool_size: self.pool_size,
            connect_timeout_secs: self.connect_timeout_secs,
            debug: self.debug,
        }
    }

    /// Get session lifetime as Duration
    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_lifetime_secs)
    }

    /// Get login attempt retention as Duration
    pub fn login_attempt_retention(&self) -> Duration {
        Duration::from_secs(self.login_attempt_retention_secs)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let lines = vec![
            format!("Data Directory:     {}", self.data_dir),
            format!("Database Path:      {}", self.database_path),
            format!("Schema Script:      {}", self.schema_path),
            format!("Pool Size:          {}", self.pool_size),
            format!("Connect Timeout:    {} seconds", self.connect_timeout_secs),
            format!("Debug:              {}", self.debug),
            format!("Timezone:           {}", self.timezone),
            format!("Session Lifetime:   {} seconds", self.session_lifetime_secs),
            format!("Upload Directory:   {}", self.upload_dir),
            format!("Upload Limit:       {}", format_size(self.upload_max_bytes)),
            format!(
                "Login Retention:    {} seconds",
                self.login_attempt_retention_secs
            ),
            format!(
                "Log File:           {}",
                self.log_file.as_deref().unwrap_or("(stderr)")
            ),
        ];

        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.eventdb/eventdb.toml", home_dir)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Expand a leading `~` to the user's home directory
fn expand_home(path: &str) -> String {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}

/// Format a byte count as a human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_from_empty_map() {
        let config = EventdbConfig::from_map(&HashMap::new(), "/tmp/eventdb");

        assert_eq!(config.data_dir, "/tmp/eventdb");
        assert_eq!(config.database_path, "/tmp/eventdb/eventdb.sqlite3");
        assert_eq!(config.schema_path, DEFAULT_SCHEMA_PATH);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.connect_timeout_secs, 30);
        assert!(!config.debug);
        assert_eq!(config.timezone, "UTC");
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_values_override_defaults() {
        let values = map(&[
            ("data_dir", "/srv/app/"),
            ("database_path", "/srv/app/db.sqlite3"),
            ("debug", "true"),
            ("pool_size", "8"),
            ("connect_timeout_secs", "5"),
            ("timezone", "Europe/Berlin"),
            ("log_file", "/var/log/app.log"),
        ]);
        let config = EventdbConfig::from_map(&values, "/unused");

        assert_eq!(config.data_dir, "/srv/app/");
        assert_eq!(config.database_path, "/srv/app/db.sqlite3");
        assert_eq!(config.upload_dir, "/srv/app/uploads");
        assert!(config.debug);
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.timezone, "Europe/Berlin");
        assert_eq!(config.log_file.as_deref(), Some("/var/log/app.log"));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let values = map(&[
            ("debug", "maybe"),
            ("pool_size", "0"),
            ("connect_timeout_secs", "soon"),
            ("session_lifetime_secs", "-1"),
        ]);
        let config = EventdbConfig::from_map(&values, "/tmp/eventdb");

        assert!(!config.debug);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(config.session_lifetime_secs, DEFAULT_SESSION_LIFETIME_SECS);
    }

    #[test]
    fn test_database_subset() {
        let values = map(&[("debug", "yes"), ("connect_timeout_secs", "2")]);
        let config = EventdbConfig::from_map(&values, "/tmp/eventdb");
        let db = config.database();

        assert_eq!(db.path, config.database_path);
        assert!(db.debug);
        assert_eq!(db.connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}

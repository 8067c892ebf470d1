//! Runtime configuration
//!
//! Values come from defaults overridden by environment variables
//! (`LEARNINGS_*` prefix). The CLI loads a `.env` file first, so either
//! source works.

use std::path::PathBuf;

/// Environment variable prefix
const ENV_PREFIX: &str = "LEARNINGS";

/// Log filter used when `LEARNINGS_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive string
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_database_path(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Builds a configuration from defaults and environment overrides.
    ///
    /// - `LEARNINGS_DB`: database path
    /// - `LEARNINGS_LOG`: log filter, e.g. `debug` or `learnings=info`
    ///
    /// Empty values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_value("DB") {
            self.db_path = PathBuf::from(val);
        }

        if let Some(val) = env_value("LOG") {
            self.log_filter = val;
        }
    }

    /// Replaces the database path, e.g. from a command line flag.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Default database location: `~/.mcp/mcp.db`.
///
/// Falls back to the current directory when no home directory is known.
pub fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcp")
        .join("mcp.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 2] = ["LEARNINGS_DB", "LEARNINGS_LOG"];

    fn clear_vars() {
        for name in VARS {
            // SAFETY: env tests are serialized with #[serial]
            unsafe { env::remove_var(name) };
        }
    }

    #[test]
    fn default_path_ends_in_mcp_db() {
        let path = default_database_path();
        assert!(path.ends_with(".mcp/mcp.db"), "got {}", path.display());
    }

    #[test]
    #[serial]
    fn from_env_uses_defaults_when_unset() {
        clear_vars();

        let config = Config::from_env();

        assert_eq!(config, Config::default());
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    #[serial]
    fn from_env_applies_overrides() {
        clear_vars();
        // SAFETY: env tests are serialized with #[serial]
        unsafe {
            env::set_var("LEARNINGS_DB", "/tmp/learnings-test/notes.db");
            env::set_var("LEARNINGS_LOG", "learnings=debug");
        }

        let config = Config::from_env();
        clear_vars();

        assert_eq!(config.db_path, PathBuf::from("/tmp/learnings-test/notes.db"));
        assert_eq!(config.log_filter, "learnings=debug");
    }

    #[test]
    #[serial]
    fn from_env_ignores_empty_values() {
        clear_vars();
        // SAFETY: env tests are serialized with #[serial]
        unsafe { env::set_var("LEARNINGS_DB", "  ") };

        let config = Config::from_env();
        clear_vars();

        assert_eq!(config.db_path, default_database_path());
    }

    #[test]
    fn with_db_path_overrides() {
        let config = Config::default().with_db_path("custom.db");
        assert_eq!(config.db_path, PathBuf::from("custom.db"));
    }
}

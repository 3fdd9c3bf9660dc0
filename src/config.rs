//! Configuration (sqlcell.toml).
//!
//! ```toml
//! default_connection = "local"
//!
//! [connections]
//! local = "sqlite://local.db"
//!
//! [dsn.warehouse]
//! url = "postgresql://analyst@warehouse/prod"
//!
//! [snippets.recent]
//! sql = "SELECT * FROM orders WHERE day > current_date - 7"
//! with = []
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{SqlCellError, SqlCellResult};

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "sqlcell.toml";

/// A named connection string, selected with `[name]` or `--section name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsnSection {
    pub url: String,
}

/// A snippet defined in the config file, loaded at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetConfig {
    pub sql: String,
    #[serde(default)]
    pub with: Vec<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Connection made current at session start
    #[serde(default)]
    pub default_connection: Option<String>,

    /// Connections bound by name at session start
    #[serde(default)]
    pub connections: BTreeMap<String, String>,

    /// DSN sections
    #[serde(default)]
    pub dsn: BTreeMap<String, DsnSection>,

    /// Preloaded snippets
    #[serde(default)]
    pub snippets: BTreeMap<String, SnippetConfig>,

    /// Where this config was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load config from a TOML file.
    pub fn from_file(path: &Path) -> SqlCellResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SqlCellError::Config(format!("{}: {}", path.display(), e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| SqlCellError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load config from a TOML string.
    pub fn from_toml(toml: &str) -> SqlCellResult<Self> {
        let config: Config =
            toml::from_str(toml).map_err(|e| SqlCellError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the explicit path if given, otherwise the first config found in
    /// the working directory or the user config directory. No file at all
    /// yields the defaults.
    pub fn load(explicit: Option<&Path>) -> SqlCellResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        for candidate in Self::search_paths() {
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "loading config");
                return Self::from_file(&candidate);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sqlcell").join("config.toml"));
        }
        paths
    }

    fn validate(&self) -> SqlCellResult<()> {
        if let Some(name) = &self.default_connection {
            if !self.connections.contains_key(name) {
                return Err(SqlCellError::Config(format!(
                    "default_connection '{}' is not listed under [connections]",
                    name
                )));
            }
        }
        Ok(())
    }

    /// URL of a DSN section.
    pub fn dsn_url(&self, section: &str) -> SqlCellResult<&str> {
        self.dsn
            .get(section)
            .map(|s| s.url.as_str())
            .ok_or_else(|| SqlCellError::Config(format!("no DSN section '{}'", section)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_connection = "local"

[connections]
local = "sqlite://local.db"

[dsn.warehouse]
url = "postgresql://analyst@warehouse/prod"

[snippets.recent]
sql = "SELECT * FROM orders"

[snippets.big]
sql = "SELECT * FROM recent WHERE total > 100"
with = ["recent"]
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.default_connection.as_deref(), Some("local"));
        assert_eq!(config.connections["local"], "sqlite://local.db");
        assert_eq!(
            config.dsn_url("warehouse").unwrap(),
            "postgresql://analyst@warehouse/prod"
        );
        assert!(config.snippets["recent"].with.is_empty());
        assert_eq!(config.snippets["big"].with, vec!["recent".to_string()]);
    }

    #[test]
    fn test_empty_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_dsn_section() {
        let config = Config::default();
        assert!(matches!(
            config.dsn_url("nope"),
            Err(SqlCellError::Config(msg)) if msg.contains("nope")
        ));
    }

    #[test]
    fn test_default_connection_must_exist() {
        let err = Config::from_toml("default_connection = \"ghost\"").unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_from_file_sets_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_explicit_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(SqlCellError::Config(_))
        ));
    }
}

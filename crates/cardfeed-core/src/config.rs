//! Config file loading and saving.

use std::fs;
use std::path::{Path, PathBuf};

use cardfeed_types::{ConfigError, FeedConfig};

const CONFIG_DIR: &str = "cardfeed";
const CONFIG_FILE: &str = "config.json";

/// `<platform config dir>/cardfeed/config.json`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<FeedConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound { path: path.display().to_string() });
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::read_failed(path, &e))?;
    let config: FeedConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::parse_failed(path, &e))?;
    config.validate()?;
    Ok(config)
}

/// Load `path` when given, else the default location; a missing file yields defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<FeedConfig, ConfigError> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => return Ok(FeedConfig::default()),
    };

    match load_config(&path) {
        Err(ConfigError::NotFound { .. }) => {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(FeedConfig::default())
        },
        other => other,
    }
}

/// Save a config file atomically (temp file + rename).
pub fn save_config(path: &Path, config: &FeedConfig) -> Result<(), ConfigError> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::write_failed(parent, &e))?;
    }

    let content =
        serde_json::to_string_pretty(config).map_err(|e| ConfigError::write_failed(path, &e))?;
    let temp_path = path.with_extension("json.tmp");

    fs::write(&temp_path, content).map_err(|e| ConfigError::write_failed(&temp_path, &e))?;
    fs::rename(&temp_path, path).map_err(|e| ConfigError::write_failed(path, &e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cardfeed_types::models::SourceEndpointConfig;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = FeedConfig::default();
        config.queue_capacity = 32;
        config.sources.push(SourceEndpointConfig {
            source_id: "com.example.feed".to_string(),
            base_url: "http://127.0.0.1:9000".to_string(),
            read_permission: None,
            write_permission: None,
        });

        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        assert!(matches!(load_config(&path), Err(ConfigError::NotFound { .. })));
        assert_eq!(load_or_default(Some(&path)).unwrap(), FeedConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"fetch_timeout_secs": 0}"#).unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_garbage_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert_eq!(err.path(), Some(path.display().to_string().as_str()));
    }

    #[test]
    fn test_write_failure_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let path = blocker.join("config.json");

        let err = save_config(&path, &FeedConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::WriteFailed { .. }));
        assert!(err.to_string().contains("blocker"));
    }
}

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config_schema::{defaults, parse_str, to_string_pretty, validate};
use crate::config_types::Config;

/// Loads the configuration at `path`, or the defaults when no file exists yet.
pub fn load(path: &Path) -> Result<Config> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(defaults());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read config file {}", path.display()));
        }
    };

    let config = parse_str(&json)
        .with_context(|| format!("Invalid config file {}", path.display()))?;

    info!(
        path = %path.display(),
        osc_target = %config.osc_target(),
        actions = config.actions.len(),
        "loaded config"
    );
    Ok(config)
}

/// Validates and writes `config` as pretty JSON. The document is written to
/// a sibling temporary file first and renamed over `path`.
pub fn save(path: &Path, config: &Config) -> Result<()> {
    validate(config).with_context(|| format!("Refusing to save invalid config to {}", path.display()))?;
    let json = to_string_pretty(config).with_context(|| "Failed to serialize config")?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes())
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        // keep the rename error
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }

    debug!(bytes = json.len(), "config written");
    info!(path = %path.display(), actions = config.actions.len(), "saved config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, defaults());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = defaults();
        config.left_thumb = true;
        config.extra.insert("localization".into(), json!([{ "language_tag": "en_US" }]));
        save(&path, &config).unwrap();

        assert_eq!(load(&path).unwrap(), config);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn invalid_config_is_not_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = defaults();
        config.polling_rate = 0;
        let err = save(&path, &config).unwrap_err();
        assert!(matches!(err.downcast_ref::<SchemaError>(), Some(SchemaError::OutOfRange { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn failed_replace_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        // renaming a file over a non-empty directory fails
        let path = dir.path().join("config");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        let err = save(&path, &defaults()).unwrap_err();
        assert!(err.to_string().contains("Failed to replace"));
        assert!(!path.with_extension("json.tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn load_reports_schema_errors_with_path_context() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "IP": "127.0.0.1", "Port": 0, "PollingRate": 50, "StickMoveTolerance": 0 }"#).unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
        assert!(matches!(err.downcast_ref::<SchemaError>(), Some(SchemaError::OutOfRange { .. })));
    }
}

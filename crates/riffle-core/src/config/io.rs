//! YAML persistence for configuration types

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a configuration value from a YAML file
///
/// A missing file is not an error: the type's defaults are returned. An
/// unreadable or malformed file is logged and also falls back to defaults,
/// so a broken config never prevents the player from starting.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    log::info!("load_config: Loading from {:?}", path);

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("load_config: No config at {:?}, using defaults", path);
            return T::default();
        }
        Err(e) => {
            log::warn!("load_config: Failed to read {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    serde_yaml::from_str::<T>(&contents).unwrap_or_else(|e| {
        log::warn!("load_config: Failed to parse {:?}: {}, using defaults", path, e);
        T::default()
    })
}

/// Save a configuration value as YAML, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config: EngineConfig = load_config(Path::new("/nonexistent/riffle/engine.yaml"));
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.crossfade_secs, 5.0);
    }

    #[test]
    fn test_engine_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.yaml");

        let config = EngineConfig {
            crossfade_secs: 8.0,
            start_suspended: false,
            ..Default::default()
        };

        save_config(&config, &path).unwrap();
        let loaded: EngineConfig = load_config(&path);

        assert_eq!(loaded.crossfade_secs, 8.0);
        assert!(!loaded.start_suspended);
        assert_eq!(loaded.limiter.ratio, config.limiter.ratio);
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "sample_rate: [not, a, number]").unwrap();

        let config: EngineConfig = load_config(&path);
        assert_eq!(config.sample_rate, 48000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "crossfade_secs: 2.5\n").unwrap();

        let config: EngineConfig = load_config(&path);
        assert_eq!(config.crossfade_secs, 2.5);
        assert_eq!(config.ready_timeout_ms, 3000);
    }
}

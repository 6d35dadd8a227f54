//! Standard locations of Riffle's persisted files

use std::path::PathBuf;

/// Riffle's configuration directory
///
/// Returns: `<platform config dir>/riffle`, falling back to `./riffle` when the
/// platform has no notion of a config directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("riffle")
}

/// Default location of the engine YAML config
pub fn default_engine_config_path() -> PathBuf {
    config_dir().join("engine.yaml")
}

/// Default location of the device profile store
pub fn default_profiles_path() -> PathBuf {
    config_dir().join("device_profiles.json")
}

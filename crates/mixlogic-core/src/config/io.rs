//! YAML configuration I/O
//!
//! Loading never fails: a missing or unreadable file yields the type's
//! default so the mixer can always start.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a YAML configuration file, falling back to `T::default()`
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} not found, using defaults", path);
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("load_config: could not read {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("load_config: loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: invalid YAML in {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Write a configuration as YAML, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: wrote {:?}", path);
    Ok(())
}

/// Load a configuration, writing the defaults out if the file is missing
///
/// Gives users a file to edit on first run. A failed write is logged and
/// the defaults are still returned.
pub fn load_or_create_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Serialize + Default,
{
    if path.exists() {
        return load_config(path);
    }
    let config = T::default();
    if let Err(e) = save_config(&config, path) {
        log::warn!("load_or_create_config: {:#}", e);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config: EngineConfig = load_config(Path::new("/nonexistent/mixlogic/config.yaml"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_invalid_yaml_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "sample_rate: [not, a, number").unwrap();

        let config: EngineConfig = load_config(&path);
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("config.yaml");

        let mut config = EngineConfig::default();
        config.sample_rate = 44100;
        config.smoothing.eq_time_constant = 0.25;

        save_config(&config, &path).unwrap();
        let loaded: EngineConfig = load_config(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixlogic").join("config.yaml");

        let config: EngineConfig = load_or_create_config(&path);
        assert_eq!(config, EngineConfig::default());
        assert!(path.exists());

        // An existing file is read, not overwritten
        std::fs::write(&path, "buffer_size: 256\n").unwrap();
        let config: EngineConfig = load_or_create_config(&path);
        assert_eq!(config.buffer_size, 256);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "buffer_size: 256\n");
    }
}

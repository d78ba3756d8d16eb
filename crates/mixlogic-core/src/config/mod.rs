//! Engine configuration
//!
//! Render settings and parameter smoothing time constants, stored as YAML.
//!
//! ```ignore
//! use mixlogic_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path());
//! ```

mod io;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::SAMPLE_RATE;

pub use io::{load_config, load_or_create_config, save_config};

/// Default render block size in frames
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Largest render block the engine pre-allocates for
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Smoothing time constants, in seconds
///
/// Parameter changes approach their target exponentially; after one time
/// constant ~63% of the step has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// EQ gain changes (knobs)
    pub eq_time_constant: f32,
    /// Channel, crossfade and master gain changes (faders)
    pub gain_time_constant: f32,
    /// Playback rate changes (tempo glides)
    pub speed_time_constant: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            eq_time_constant: 0.1,
            gain_time_constant: 0.01,
            speed_time_constant: 0.1,
        }
    }
}

/// Text generation service used by "explain the mix"
///
/// The API key itself is never stored in the file, only the name of the
/// environment variable that holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Base URL of the generateContent API
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "API_KEY".to_string(),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Preferred output sample rate in Hz
    pub sample_rate: u32,
    /// Preferred render block size in frames
    pub buffer_size: u32,
    /// Output device name (None = system default)
    pub output_device: Option<String>,
    /// Parameter smoothing
    pub smoothing: SmoothingConfig,
    /// Mix explanation service
    pub explain: ExplainConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            output_device: None,
            smoothing: SmoothingConfig::default(),
            explain: ExplainConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Copy with the same settings at a different sample rate
    pub fn with_sample_rate(&self, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..self.clone()
        }
    }

    /// Block size clamped to what the renderer pre-allocates
    pub fn clamped_buffer_size(&self) -> usize {
        (self.buffer_size as usize).clamp(64, MAX_BUFFER_SIZE)
    }
}

/// Default config file location
///
/// Returns: `{config_dir}/mixlogic/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mixlogic")
        .join("config.yaml")
}

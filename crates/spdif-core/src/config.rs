//! Configuration system for spdif-out

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SpdifError};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub session: SessionConfig,
    pub tone: ToneConfig,
}

/// Output backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub backend: Backend,
}

/// Transfer backend type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum Backend {
    /// Default audio output device at 4x the audio rate.
    #[default]
    Auto,
    /// Inert sink, pumped at wall-clock pace (headless runs).
    Null,
}

/// PCM session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub rate: u32,
    pub format: SampleFormatConfig,
    /// Valid most-significant bits per sample; 0 uses the format width.
    pub msbits: u8,
    pub ring_frames: usize,
    pub period_frames: usize,
    pub copy_permitted: bool,
    pub preemphasis: bool,
}

/// PCM sample format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum SampleFormatConfig {
    #[default]
    S16Le,
    S24In32Le,
    S24PackedLe,
    S32Le,
}

/// Demo tone settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub frequency_hz: f32,
    pub amplitude: f32,
    pub duration_secs: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rate: 48_000,
            format: SampleFormatConfig::default(),
            msbits: 0,
            ring_frames: 1536,
            period_frames: 192,
            copy_permitted: true,
            preemphasis: false,
        }
    }
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            amplitude: 0.25,
            duration_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from the default path, or create it if missing.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SpdifError::Config(e.to_string()))
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| SpdifError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spdif-out")
            .join("config.toml")
    }
}

use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use vibe_emu_output::config::PipelineConfig;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Simulated host settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HostConfig {
    /// Capacity of the host audio queue in stereo pairs.
    pub queue_frames: usize,
    /// Pairs the simulated device consumes per tick. `None` follows the
    /// current AV info (sample rate / fps).
    pub device_frames_per_tick: Option<usize>,
    /// Whether the host understands the repeat-previous-frame sentinel.
    pub can_dupe: bool,
    /// Stretch every Nth frame of the tone core to 1.5x its length.
    pub long_frame_every: Option<u32>,
    pub tone_hz: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            queue_frames: 8192,
            device_frames_per_tick: None,
            can_dupe: true,
            long_frame_every: None,
            tone_hz: 440,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunnerConfig {
    pub host: HostConfig,
    pub pipeline: PipelineConfig,
}

pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("vibeemu").join("runner.toml");
        }
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("vibeemu").join("runner.toml");
    }

    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("vibeemu")
            .join("runner.toml");
    }

    PathBuf::from("runner.toml")
}

/// Missing files give defaults silently; unparsable files warn and give
/// defaults.
pub fn load_from_file(path: &Path) -> RunnerConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return RunnerConfig::default(),
    };

    match toml::from_str::<RunnerConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse runner config {}: {e}; using defaults",
                path.display()
            );
            RunnerConfig::default()
        }
    }
}

pub fn save_to_file(path: &Path, cfg: &RunnerConfig) -> Result<(), SaveError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let text = toml::to_string_pretty(cfg)?;
    std::fs::write(path, text)?;
    Ok(())
}

//! Persisted audio volume preferences.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Volume preferences restored between sessions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AudioSettings {
    /// Music volume in `[0, 1]`.
    pub(crate) music_volume: f32,
    /// Sound effect volume in `[0, 1]`.
    pub(crate) sfx_volume: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            music_volume: 0.5,
            sfx_volume: 0.5,
        }
    }
}

impl AudioSettings {
    /// Returns the default settings path relative to the working directory.
    #[must_use]
    pub(crate) fn default_path() -> PathBuf {
        PathBuf::from("network-defence-settings.toml")
    }

    /// Loads settings from `path`, falling back to defaults when the file is absent.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("no settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read settings {}", path.display()))
            }
        };
        let settings: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse settings {}", path.display()))?;
        Ok(settings.clamped())
    }

    /// Writes the settings to `path`.
    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string(self).context("failed to serialise settings")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write settings {}", path.display()))
    }

    /// Replaces the music volume, clamped to `[0, 1]`.
    pub(crate) fn set_music_volume(&mut self, volume: f32) {
        self.music_volume = clamp_volume(volume);
    }

    /// Replaces the sound effect volume, clamped to `[0, 1]`.
    pub(crate) fn set_sfx_volume(&mut self, volume: f32) {
        self.sfx_volume = clamp_volume(volume);
    }

    fn clamped(mut self) -> Self {
        self.set_music_volume(self.music_volume);
        self.set_sfx_volume(self.sfx_volume);
        self
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

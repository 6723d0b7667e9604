//! User settings, stored as TOML beside the host executable.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fg_interop::FrameOptions;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const SETTINGS_FILE: &str = "framegen.toml";

/// Presentation rate cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameLimit {
    #[default]
    Off,
    /// Cap just below the display refresh rate.
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub frame_generation: bool,
    pub frame_limit: FrameLimit,
    /// Substitute the swap chain even on displays below 119 Hz.
    pub force_enable: bool,
    /// Sharpening of the native anti-aliasing pass, 0 to 1.
    pub sharpness: f32,
    pub allow_async_workloads: bool,
    /// Camera movement in world units between two frames treated as a cut.
    pub camera_cut_distance: f32,
    pub warmup_frames: u32,
}

impl Default for Settings {
    fn default() -> Self {
        let options = FrameOptions::default();
        Self {
            frame_generation: options.frame_generation,
            frame_limit: FrameLimit::Off,
            force_enable: false,
            sharpness: options.sharpness,
            allow_async_workloads: options.allow_async_workloads,
            camera_cut_distance: options.camera_cut_distance,
            warmup_frames: options.warmup_frames,
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing file yields the defaults; a file
    /// that does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        let mut settings: Self =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        settings.sanitize();
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write settings to `path` through a temporary file in the same
    /// directory, so readers never see a partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("serializing settings")?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("creating temporary file in {}", dir.display()))?;
        file.write_all(text.as_bytes()).context("writing settings")?;
        file.persist(path)
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    /// The subset the frame orchestrator reads every present.
    pub fn frame_options(&self) -> FrameOptions {
        FrameOptions {
            frame_generation: self.frame_generation,
            sharpness: self.sharpness,
            allow_async_workloads: self.allow_async_workloads,
            camera_cut_distance: self.camera_cut_distance,
            warmup_frames: self.warmup_frames,
        }
    }

    fn sanitize(&mut self) {
        if !(0.0..=1.0).contains(&self.sharpness) {
            let clamped = if self.sharpness.is_nan() {
                0.0
            } else {
                self.sharpness.clamp(0.0, 1.0)
            };
            warn!(sharpness = self.sharpness, "Sharpness out of range, using {clamped}");
            self.sharpness = clamped;
        }
        if self.camera_cut_distance.is_nan() || self.camera_cut_distance <= 0.0 {
            warn!(
                distance = self.camera_cut_distance,
                "Camera cut distance must be positive, using the default"
            );
            self.camera_cut_distance = FrameOptions::default().camera_cut_distance;
        }
    }
}

/// `framegen.toml` in the directory of `module_path`.
pub fn default_path(module_path: &Path) -> PathBuf {
    module_path
        .parent()
        .map(|dir| dir.join(SETTINGS_FILE))
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.frame_generation);
        assert_eq!(settings.frame_limit, FrameLimit::Off);
        assert_eq!(settings.sharpness, 0.5);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let settings = Settings {
            frame_generation: false,
            frame_limit: FrameLimit::Refresh,
            force_enable: true,
            sharpness: 0.8,
            warmup_frames: 5,
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "force_enable = true\nframe_limit = \"refresh\"\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert!(settings.force_enable);
        assert_eq!(settings.frame_limit, FrameLimit::Refresh);
        assert!(settings.frame_generation);
        assert_eq!(settings.warmup_frames, 3);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "sharpness = \"very\"\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "sharpness = 3.0\ncamera_cut_distance = -1.0\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.sharpness, 1.0);
        assert_eq!(settings.camera_cut_distance, 1000.0);
    }

    #[test]
    fn frame_options_projection() {
        let settings = Settings {
            frame_generation: false,
            sharpness: 0.0,
            allow_async_workloads: false,
            camera_cut_distance: 250.0,
            warmup_frames: 1,
            ..Settings::default()
        };
        let options = settings.frame_options();
        assert!(!options.frame_generation);
        assert_eq!(options.sharpness, 0.0);
        assert!(!options.allow_async_workloads);
        assert_eq!(options.camera_cut_distance, 250.0);
        assert_eq!(options.warmup_frames, 1);
    }

    #[test]
    fn default_path_is_beside_the_module() {
        assert_eq!(
            default_path(Path::new("/games/title/bin/game.exe")),
            PathBuf::from("/games/title/bin").join(SETTINGS_FILE)
        );
    }
}

//! Viewer configuration loaded from the user config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::DEFAULT_SOURCES;
use crate::util::Result;

/// Configuration read at startup. Nothing here is written back by the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Data
    pub data_root: Option<PathBuf>,
    pub data_sources: Vec<String>,

    // Window
    pub window_width: f32,
    pub window_height: f32,
    pub pixel_ratio_cap: f32,

    // Model controls
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,

    // Video decoding
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,

    // Logging (overridden by RUST_LOG)
    pub log_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_root: None,
            data_sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            window_width: 1280.0,
            window_height: 800.0,
            pixel_ratio_cap: 1.25,
            rotate_speed: 4.2,
            pan_speed: 0.9,
            zoom_speed: 1.15,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            log_filter: None,
        }
    }
}

impl Settings {
    /// Settings file location: `<config dir>/monospec/settings.json`.
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("monospec");
            p.push("settings.json");
            p
        })
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::path()
            .filter(|p| p.exists())
            .and_then(|p| match Self::load_from(&p) {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "ignoring unreadable settings");
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        Ok(settings.sanitized())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Catalog root: explicit argument, then configured root, then the working directory.
    pub fn resolve_root(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.data_root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Replace out-of-range values with defaults.
    fn sanitized(mut self) -> Self {
        let d = Self::default();
        let positive = |v: f32, fallback: f32| if v.is_finite() && v > 0.0 { v } else { fallback };
        self.pixel_ratio_cap = positive(self.pixel_ratio_cap, d.pixel_ratio_cap);
        self.rotate_speed = positive(self.rotate_speed, d.rotate_speed);
        self.pan_speed = positive(self.pan_speed, d.pan_speed);
        self.zoom_speed = positive(self.zoom_speed, d.zoom_speed);
        self.window_width = positive(self.window_width, d.window_width);
        self.window_height = positive(self.window_height, d.window_height);
        if self.data_sources.is_empty() {
            self.data_sources = d.data_sources;
        }
        self
    }
}

//! Session configuration.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::binding::CameraConfig;

/// Default decode attempts per second in camera mode.
pub const DEFAULT_FPS: u32 = 5;

/// Default scan box edge, in pixels.
pub const DEFAULT_SCAN_EDGE: u32 = 250;

/// Bounding box passed to the decoder to limit the scan area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRegion {
    pub width: u32,
    pub height: u32,
}

impl Default for ScanRegion {
    fn default() -> Self {
        Self {
            width: DEFAULT_SCAN_EDGE,
            height: DEFAULT_SCAN_EDGE,
        }
    }
}

/// Configuration for a scanning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Decode attempts per second for camera mode.
    pub fps: u32,
    /// Scan box handed to the decoder in camera mode.
    pub scan_region: ScanRegion,
    /// Directory holding one sub-directory per virtual camera.
    pub camera_root: Option<PathBuf>,
    /// Sound played when a new code is scanned.
    pub audio_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            scan_region: ScanRegion::default(),
            camera_root: None,
            audio_path: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override file values with whatever was given on the command line.
    pub fn merge(
        mut self,
        fps: Option<u32>,
        scan_region: Option<ScanRegion>,
        camera_root: Option<PathBuf>,
        audio_path: Option<PathBuf>,
    ) -> Self {
        if let Some(fps) = fps {
            self.fps = fps;
        }
        if let Some(region) = scan_region {
            self.scan_region = region;
        }
        if camera_root.is_some() {
            self.camera_root = camera_root;
        }
        if audio_path.is_some() {
            self.audio_path = audio_path;
        }
        self
    }

    /// Settings handed to the decoder on every camera bind.
    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            fps: self.fps.max(1),
            scan_region: Some(self.scan_region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.fps, 5);
        assert_eq!(
            config.scan_region,
            ScanRegion {
                width: 250,
                height: 250
            }
        );
        assert!(config.camera_root.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SessionConfig = toml::from_str("fps = 10\n").unwrap();
        assert_eq!(config.fps, 10);
        assert_eq!(config.scan_region, ScanRegion::default());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("qrscan-config-{}.toml", uuid::Uuid::new_v4()));
        let config = SessionConfig {
            fps: 12,
            scan_region: ScanRegion {
                width: 300,
                height: 200,
            },
            camera_root: Some(PathBuf::from("/tmp/cameras")),
            audio_path: None,
        };

        config.save_to_file(&path).unwrap();
        let loaded = SessionConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_merge_overrides_only_given_values() {
        let merged = SessionConfig::default().merge(Some(8), None, Some(PathBuf::from("cams")), None);
        assert_eq!(merged.fps, 8);
        assert_eq!(merged.scan_region, ScanRegion::default());
        assert_eq!(merged.camera_root, Some(PathBuf::from("cams")));
    }

    #[test]
    fn test_camera_config_never_zero_fps() {
        let config = SessionConfig {
            fps: 0,
            ..Default::default()
        };
        assert_eq!(config.camera_config().fps, 1);
    }
}

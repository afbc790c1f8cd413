//! Virtual cameras backed by a directory tree.
//!
//! Every sub-directory of the camera root is one camera. The directory
//! name is the device id; an optional `label` file inside it holds the
//! human-readable label. Frames are read by
//! [`crate::binding::RqrrBinding`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use super::traits::{CameraPlatform, PlatformError};
use crate::device::CameraDescriptor;

/// Name of the optional file carrying a camera's label.
pub const LABEL_FILE: &str = "label";

pub struct DirectoryPlatform {
    root: PathBuf,
}

impl DirectoryPlatform {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn map_io(root: &Path, err: std::io::Error) -> PlatformError {
    match err.kind() {
        ErrorKind::PermissionDenied => PlatformError::PermissionDenied,
        ErrorKind::NotFound => {
            PlatformError::Unavailable(format!("camera root {} not found", root.display()))
        }
        _ => PlatformError::Io(err),
    }
}

fn scan_root(root: &Path) -> Result<Vec<CameraDescriptor>, PlatformError> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root).map_err(|e| map_io(root, e))? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let devices = dirs
        .into_iter()
        .filter_map(|dir| {
            let id = dir.file_name()?.to_string_lossy().into_owned();
            let label = std::fs::read_to_string(dir.join(LABEL_FILE))
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            debug!(id = %id, label = %label, "Found camera");
            Some(CameraDescriptor::new(id, label))
        })
        .collect();

    Ok(devices)
}

impl CameraPlatform for DirectoryPlatform {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn request_permission(&self) -> Result<(), PlatformError> {
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| map_io(&self.root, e))?;
        if !metadata.is_dir() {
            return Err(PlatformError::Unavailable(format!(
                "camera root {} is not a directory",
                self.root.display()
            )));
        }

        // Reading the directory is the access check.
        let _entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| map_io(&self.root, e))?;

        info!("Camera access granted");
        Ok(())
    }

    async fn enumerate(&self) -> Result<Vec<CameraDescriptor>, PlatformError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan_root(&root))
            .await
            .map_err(|e| PlatformError::EnumerationFailed(e.to_string()))?
    }
}

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{JimengError, Result};

/// Dimensions reported when a video cannot be probed
pub const DEFAULT_DIMENSIONS: (u32, u32) = (1280, 720);

/// Capabilities a host's downstream save nodes rely on
#[async_trait]
pub trait VideoOutput: Send + Sync {
    /// Width and height of the encoded video
    async fn probe_dimensions(&self) -> (u32, u32);

    /// Copy the video to `destination`
    async fn copy_to(&self, destination: &Path) -> Result<()>;
}

/// A downloaded video on local disk. Empty when generation failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoHandle {
    path: Option<PathBuf>,
}

impl VideoHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            path: (!path.as_os_str().is_empty()).then_some(path),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_none()
    }

    fn existing_path(&self) -> Option<&Path> {
        self.path.as_deref().filter(|path| path.exists())
    }
}

#[async_trait]
impl VideoOutput for VideoHandle {
    async fn probe_dimensions(&self) -> (u32, u32) {
        let Some(path) = self.existing_path() else {
            return DEFAULT_DIMENSIONS;
        };

        match ffprobe_dimensions(path).await {
            Ok(dimensions) => dimensions,
            Err(e) => {
                warn!("Failed to probe video dimensions for {}: {}", path.display(), e);
                DEFAULT_DIMENSIONS
            }
        }
    }

    async fn copy_to(&self, destination: &Path) -> Result<()> {
        let source = self.existing_path().ok_or_else(|| {
            JimengError::MissingVideo(
                self.path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            )
        })?;

        tokio::fs::copy(source, destination).await?;
        info!("💾 Copied video to {}", destination.display());
        Ok(())
    }
}

/// Read the first video stream's size with ffprobe
async fn ffprobe_dimensions(path: &Path) -> Result<(u32, u32)> {
    let output = tokio::process::Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height")
        .arg("-of")
        .arg("json")
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(JimengError::Probe(format!(
            "ffprobe failed for {}",
            path.display()
        )));
    }

    let probe: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let stream = &probe["streams"][0];

    match (stream["width"].as_u64(), stream["height"].as_u64()) {
        (Some(width), Some(height)) => Ok((width as u32, height as u32)),
        _ => Err(JimengError::Probe(format!(
            "No video stream found in {}",
            path.display()
        ))),
    }
}

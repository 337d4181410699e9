//! Anchor frames: host image tensors encoded to PNG and staged as temporary files
//! for multipart upload.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{JimengError, Result};

/// First image of a host image batch, HWC layout, channel values in 0..=1
#[derive(Debug, Clone, PartialEq)]
pub struct FrameImage {
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<f32>,
}

impl FrameImage {
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<f32>) -> Result<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(JimengError::InvalidFrame(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        if width == 0 || height == 0 {
            return Err(JimengError::InvalidFrame("empty image".to_string()));
        }

        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(JimengError::InvalidFrame(format!(
                "expected {} values for {}x{}x{}, got {}",
                expected,
                width,
                height,
                channels,
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Load an image file from disk as an RGB frame
    pub fn from_path(path: &Path) -> Result<Self> {
        let rgb = image::open(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let data = rgb.into_raw().into_iter().map(|v| v as f32 / 255.0).collect();
        Self::new(width, height, 3, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    fn to_dynamic(&self) -> Result<DynamicImage> {
        // Scale then truncate, clamped so out-of-range tensor values cannot wrap.
        let raw: Vec<u8> = self
            .data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8)
            .collect();

        let image = match self.channels {
            1 => GrayImage::from_raw(self.width, self.height, raw).map(DynamicImage::ImageLuma8),
            3 => RgbImage::from_raw(self.width, self.height, raw).map(DynamicImage::ImageRgb8),
            _ => RgbaImage::from_raw(self.width, self.height, raw).map(DynamicImage::ImageRgba8),
        };

        image.ok_or_else(|| JimengError::InvalidFrame("buffer does not match dimensions".to_string()))
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.to_dynamic()?.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

/// Which anchor a frame is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSlot {
    First,
    End,
}

impl FrameSlot {
    /// Multipart field name
    pub fn field_name(&self) -> &'static str {
        match self {
            FrameSlot::First => "image1",
            FrameSlot::End => "image2",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            FrameSlot::First => "first_frame.png",
            FrameSlot::End => "end_frame.png",
        }
    }
}

/// A frame written to a temporary PNG. The file is removed on `close` or drop.
#[derive(Debug)]
pub struct FrameUpload {
    slot: FrameSlot,
    file: NamedTempFile,
    png: Vec<u8>,
}

impl FrameUpload {
    pub async fn stage(
        slot: FrameSlot,
        frame: &FrameImage,
        temp_dir: Option<&Path>,
    ) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("jimeng_frame_").suffix(".png");
        let file = match temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let png = frame.to_png_bytes()?;
        tokio::fs::write(file.path(), &png).await?;
        debug!("Staged {} at {}", slot.file_name(), file.path().display());

        Ok(Self { slot, file, png })
    }

    pub fn slot(&self) -> FrameSlot {
        self.slot
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Encoded PNG, identical to the staged file's contents
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn close(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!("⚠️ Failed to remove temporary frame {}: {}", path.display(), e);
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::JimengError;
use crate::frames::FrameImage;

/// Generation model tiers offered by the Jimeng service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Model {
    #[serde(rename = "jimeng-video-3.0-pro")]
    Video30Pro,
    #[serde(rename = "jimeng-video-3.0")]
    #[default]
    Video30,
    #[serde(rename = "jimeng-video-2.0-pro")]
    Video20Pro,
    #[serde(rename = "jimeng-video-2.0")]
    Video20,
}

impl Model {
    pub const ALL: [Model; 4] = [
        Model::Video30Pro,
        Model::Video30,
        Model::Video20Pro,
        Model::Video20,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Model::Video30Pro => "jimeng-video-3.0-pro",
            Model::Video30 => "jimeng-video-3.0",
            Model::Video20Pro => "jimeng-video-2.0-pro",
            Model::Video20 => "jimeng-video-2.0",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[serde(rename = "21:9")]
    Ultrawide,
    #[serde(rename = "16:9")]
    Widescreen,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "9:16")]
    #[default]
    Vertical,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 6] = [
        AspectRatio::Ultrawide,
        AspectRatio::Widescreen,
        AspectRatio::Standard,
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Vertical,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Ultrawide => "21:9",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Standard => "4:3",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Vertical => "9:16",
        }
    }

    /// (width, height) components of the ratio
    pub fn components(&self) -> (u32, u32) {
        match self {
            AspectRatio::Ultrawide => (21, 9),
            AspectRatio::Widescreen => (16, 9),
            AspectRatio::Standard => (4, 3),
            AspectRatio::Square => (1, 1),
            AspectRatio::Portrait => (3, 4),
            AspectRatio::Vertical => (9, 16),
        }
    }

    /// Parse a host label. Unknown labels fall back to 16:9.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.label() == label.trim())
            .unwrap_or(AspectRatio::Widescreen)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Resolution {
    #[serde(rename = "720p")]
    #[default]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub const ALL: [Resolution; 2] = [Resolution::P720, Resolution::P1080];

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }

    pub fn base_height(&self) -> u32 {
        match self {
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
        }
    }

    /// Anything other than "720p" selects the 1080 tier.
    pub fn from_label(label: &str) -> Self {
        if label.trim() == "720p" {
            Resolution::P720
        } else {
            Resolution::P1080
        }
    }
}

/// Clip length tier. Each tier implies a minimum credit balance for the session
/// the service picks; the check itself happens server-side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DurationTier {
    #[serde(rename = "5s")]
    #[default]
    Short,
    #[serde(rename = "10s")]
    Long,
}

impl DurationTier {
    pub const ALL: [DurationTier; 2] = [DurationTier::Short, DurationTier::Long];

    pub fn label(&self) -> &'static str {
        match self {
            DurationTier::Short => "5s",
            DurationTier::Long => "10s",
        }
    }

    pub fn min_credits(&self) -> u32 {
        match self {
            DurationTier::Long => 90,
            DurationTier::Short => 45,
        }
    }
}

macro_rules! label_impls {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = JimengError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .into_iter()
                    .find(|v| v.label() == s.trim())
                    .ok_or_else(|| JimengError::Config(format!("Unknown {}: {}", $what, s)))
            }
        }
    };
}

label_impls!(Model, "model");
label_impls!(AspectRatio, "aspect ratio");
label_impls!(Resolution, "resolution");
label_impls!(DurationTier, "duration");

/// Pixel dimensions sent to the generation endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedDimensions {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for ResolvedDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Compute width/height from ratio and resolution tier.
///
/// Square and portrait ratios keep the tier height. Landscape ratios start from the
/// 16:9 width of the tier whatever the requested ratio is, then derive the height.
/// Both sides are floored to a multiple of 64.
pub fn compute_dimensions(aspect_ratio: AspectRatio, resolution: Resolution) -> ResolvedDimensions {
    let base_height = resolution.base_height();
    let (w_ratio, h_ratio) = aspect_ratio.components();

    let (width, height) = if h_ratio >= w_ratio {
        (base_height * w_ratio / h_ratio, base_height)
    } else {
        let width = base_height * 16 / 9;
        (width, width * h_ratio / w_ratio)
    };

    ResolvedDimensions {
        width: width / 64 * 64,
        height: height / 64 * 64,
    }
}

/// Generation mode, picked from the presence of anchor frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    TextToVideo,
    ImageToVideo { frames: usize },
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::TextToVideo => f.write_str("Text to Video"),
            GenerationMode::ImageToVideo { .. } => f.write_str("Image to Video"),
        }
    }
}

/// One node invocation's inputs
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: Model,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub duration: DurationTier,
    pub first_frame: Option<FrameImage>,
    pub end_frame: Option<FrameImage>,
    /// Falls back to `api.base_url` from the configuration when unset
    pub api_url: Option<String>,
    pub manual_session: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_duration(mut self, duration: DurationTier) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_first_frame(mut self, frame: FrameImage) -> Self {
        self.first_frame = Some(frame);
        self
    }

    pub fn with_end_frame(mut self, frame: FrameImage) -> Self {
        self.end_frame = Some(frame);
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    pub fn with_manual_session(mut self, session: impl Into<String>) -> Self {
        self.manual_session = Some(session.into());
        self
    }

    pub fn mode(&self) -> GenerationMode {
        let frames = [self.first_frame.is_some(), self.end_frame.is_some()]
            .iter()
            .filter(|present| **present)
            .count();

        if frames == 0 {
            GenerationMode::TextToVideo
        } else {
            GenerationMode::ImageToVideo { frames }
        }
    }

    pub fn dimensions(&self) -> ResolvedDimensions {
        compute_dimensions(self.aspect_ratio, self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_table() {
        let expected = [
            (AspectRatio::Ultrawide, Resolution::P720, (1280, 512)),
            (AspectRatio::Widescreen, Resolution::P720, (1280, 704)),
            (AspectRatio::Standard, Resolution::P720, (1280, 960)),
            (AspectRatio::Square, Resolution::P720, (704, 704)),
            (AspectRatio::Portrait, Resolution::P720, (512, 704)),
            (AspectRatio::Vertical, Resolution::P720, (384, 704)),
            (AspectRatio::Ultrawide, Resolution::P1080, (1920, 768)),
            (AspectRatio::Widescreen, Resolution::P1080, (1920, 1024)),
            (AspectRatio::Standard, Resolution::P1080, (1920, 1408)),
            (AspectRatio::Square, Resolution::P1080, (1024, 1024)),
            (AspectRatio::Portrait, Resolution::P1080, (768, 1024)),
            (AspectRatio::Vertical, Resolution::P1080, (576, 1024)),
        ];

        for (ratio, resolution, (width, height)) in expected {
            let dims = compute_dimensions(ratio, resolution);
            assert_eq!(
                (dims.width, dims.height),
                (width, height),
                "{} @ {}",
                ratio,
                resolution
            );
        }
    }

    #[test]
    fn test_dimensions_are_multiples_of_64() {
        for ratio in AspectRatio::ALL {
            for resolution in Resolution::ALL {
                let dims = compute_dimensions(ratio, resolution);
                assert_eq!(dims.width % 64, 0);
                assert_eq!(dims.height % 64, 0);
                assert!(dims.width > 0 && dims.height > 0);
            }
        }
    }

    #[test]
    fn test_vertical_720p() {
        let dims = compute_dimensions(AspectRatio::Vertical, Resolution::P720);
        assert_eq!(dims, ResolvedDimensions { width: 384, height: 704 });
        assert_eq!(dims.to_string(), "384x704");
    }

    #[test]
    fn test_landscape_ratios_share_width() {
        for resolution in Resolution::ALL {
            let wide = compute_dimensions(AspectRatio::Widescreen, resolution);
            let ultra = compute_dimensions(AspectRatio::Ultrawide, resolution);
            let standard = compute_dimensions(AspectRatio::Standard, resolution);
            assert_eq!(wide.width, ultra.width);
            assert_eq!(wide.width, standard.width);
        }
    }

    #[test]
    fn test_lenient_labels() {
        assert_eq!(AspectRatio::from_label("5:4"), AspectRatio::Widescreen);
        assert_eq!(AspectRatio::from_label("9:16"), AspectRatio::Vertical);
        assert_eq!(Resolution::from_label("720p"), Resolution::P720);
        assert_eq!(Resolution::from_label("4k"), Resolution::P1080);
    }

    #[test]
    fn test_strict_labels() {
        assert_eq!("jimeng-video-2.0-pro".parse::<Model>().unwrap(), Model::Video20Pro);
        assert_eq!("10s".parse::<DurationTier>().unwrap(), DurationTier::Long);
        assert!("jimeng-video-9".parse::<Model>().is_err());
        assert_eq!(Model::Video30.to_string(), "jimeng-video-3.0");
    }

    #[test]
    fn test_min_credits() {
        assert_eq!(DurationTier::Long.min_credits(), 90);
        assert_eq!(DurationTier::Short.min_credits(), 45);
    }

    #[test]
    fn test_mode_selection() {
        let frame = FrameImage::new(1, 1, 3, vec![0.0; 3]).unwrap();

        let request = GenerationRequest::new("a cat");
        assert_eq!(request.mode(), GenerationMode::TextToVideo);

        let request = GenerationRequest::new("a cat").with_end_frame(frame.clone());
        assert_eq!(request.mode(), GenerationMode::ImageToVideo { frames: 1 });

        let request = GenerationRequest::new("a cat")
            .with_first_frame(frame.clone())
            .with_end_frame(frame);
        assert_eq!(request.mode(), GenerationMode::ImageToVideo { frames: 2 });
    }

    #[test]
    fn test_serde_labels() {
        let json = serde_json::to_string(&AspectRatio::Ultrawide).unwrap();
        assert_eq!(json, "\"21:9\"");
        let model: Model = serde_json::from_str("\"jimeng-video-3.0-pro\"").unwrap();
        assert_eq!(model, Model::Video30Pro);
    }
}

use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tracing::{error, info};

use crate::client::JimengClient;
use crate::config::Config;
use crate::credentials::CredentialResolver;
use crate::error::{FailureKind, JimengError, Result};
use crate::frames::FrameImage;
use crate::params::{
    AspectRatio, DurationTier, GenerationRequest, Model, Resolution, ResolvedDimensions,
};
use crate::video::VideoHandle;

pub const NODE_ID: &str = "Jimeng_Video";
pub const NODE_DISPLAY_NAME: &str = "Jimeng Video (即梦-智能视频)";
pub const NODE_CATEGORY: &str = "Jimeng API";
pub const NODE_FUNCTION: &str = "generate";
pub const RETURN_NAMES: [&str; 3] = ["video", "video_url", "info"];

pub const ERROR_PREFIX: &str = "Error: ";
pub const TIMEOUT_MESSAGE: &str =
    "request timed out; video generation takes a long time, check the Jimeng website later";
pub const CONNECTION_MESSAGE: &str = "connection failed; make sure the API service is running";

const DEFAULT_PROMPT: &str = "a cat walking in the street";

/// Host-provided settings, injected instead of looked up globally
#[derive(Debug, Clone)]
pub struct HostContext {
    pub output_dir: PathBuf,
    pub media_type: String,
}

impl HostContext {
    pub fn new(output_dir: impl Into<PathBuf>, media_type: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            media_type: media_type.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.output.output_dir.clone(), config.output.media_type.clone())
    }
}

/// (width, height, channels, HWC values in 0..=1) of the first image in a host batch
pub type RawFrame = (u32, u32, u32, Vec<f32>);

/// Node inputs as the host hands them over: labels and raw frame buffers
#[derive(Debug, Clone, Default)]
pub struct HostInputs {
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
    pub resolution: String,
    pub duration: String,
    pub first_frame: Option<RawFrame>,
    pub end_frame: Option<RawFrame>,
    pub api_url: String,
    pub manual_session: String,
}

impl HostInputs {
    /// Ratio and resolution labels are lenient, model and duration labels strict
    pub fn into_request(self) -> Result<GenerationRequest> {
        let frame = |raw: Option<RawFrame>| {
            raw.map(|(width, height, channels, data)| FrameImage::new(width, height, channels, data))
                .transpose()
        };

        let mut request = GenerationRequest::new(self.prompt)
            .with_model(self.model.parse::<Model>()?)
            .with_aspect_ratio(AspectRatio::from_label(&self.aspect_ratio))
            .with_resolution(Resolution::from_label(&self.resolution))
            .with_duration(self.duration.parse::<DurationTier>()?)
            .with_api_url(self.api_url)
            .with_manual_session(self.manual_session);
        request.first_frame = frame(self.first_frame)?;
        request.end_frame = frame(self.end_frame)?;
        Ok(request)
    }
}

/// Outputs of one invocation, in host order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub video: VideoHandle,
    pub video_url: String,
    pub info: String,
}

impl GenerationResult {
    pub fn failure(err: &JimengError) -> Self {
        Self {
            video: VideoHandle::empty(),
            video_url: String::new(),
            info: failure_summary(err),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.video.is_empty() && !self.video_url.is_empty()
    }

    pub fn into_outputs(self) -> (VideoHandle, String, String) {
        (self.video, self.video_url, self.info)
    }
}

/// Summary text for a failed run, keyed by failure category
pub fn failure_summary(err: &JimengError) -> String {
    match err.failure_kind() {
        FailureKind::Timeout => format!("{}{}", ERROR_PREFIX, TIMEOUT_MESSAGE),
        FailureKind::Connection => format!("{}{} ({})", ERROR_PREFIX, CONNECTION_MESSAGE, err),
        FailureKind::Generic => format!("{}{}", ERROR_PREFIX, err),
    }
}

fn success_summary(
    request: &GenerationRequest,
    dimensions: ResolvedDimensions,
    filename: &str,
) -> String {
    format!(
        "🎬 Mode: {}\n\
        🎭 Model: {}\n\
        📐 Size: {}\n\
        📺 Resolution: {}\n\
        ⏰ Duration: {}\n\
        📁 File: {}\n\
        💬 Prompt: {}",
        request.mode(),
        request.model,
        dimensions,
        request.resolution,
        request.duration,
        filename,
        request.prompt
    )
}

/// The Jimeng video node: text and/or anchor frames in, downloaded clip out
#[derive(Debug, Clone)]
pub struct JimengVideoNode {
    config: Config,
    host: HostContext,
    resolver: CredentialResolver,
    client: JimengClient,
}

impl JimengVideoNode {
    pub fn new(config: Config, host: HostContext) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("jimeng-video-node/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let resolver = CredentialResolver::new(http.clone(), config.api.pool_timeout());
        let client = JimengClient::new(http, &config.api, config.output.clone());

        Ok(Self {
            config,
            host,
            resolver,
            client,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn host(&self) -> &HostContext {
        &self.host
    }

    /// Run the whole pipeline. Failures are reported in the result, never returned.
    pub async fn orchestrate(&self, request: &GenerationRequest) -> GenerationResult {
        info!("{}", "=".repeat(60));
        info!("🎬 Jimeng API - video generation node");

        let result = match self.run(request).await {
            Ok(result) => result,
            Err(e) => {
                error!("❌ Generation failed: {}", e);
                GenerationResult::failure(&e)
            }
        };

        info!("{}", "=".repeat(60));
        result
    }

    /// Same as `orchestrate`, for inputs that still need validating
    pub async fn generate(&self, inputs: HostInputs) -> GenerationResult {
        match inputs.into_request() {
            Ok(request) => self.orchestrate(&request).await,
            Err(e) => {
                error!("❌ Invalid node inputs: {}", e);
                GenerationResult::failure(&e)
            }
        }
    }

    async fn run(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let dimensions = request.dimensions();
        info!("📐 Ratio: {} → size: {}", request.aspect_ratio, dimensions);

        let api_url = self.api_url(request)?;
        let credential = self
            .resolver
            .resolve(request.manual_session.as_deref(), request.duration, &api_url)
            .await?;

        info!("📝 Prompt: {}...", request.prompt.chars().take(50).collect::<String>());
        info!("🎭 Model: {}", request.model);
        info!("📺 Resolution: {}", request.resolution);
        info!("⏰ Duration: {}", request.duration);
        info!("⏳ Generating with {}, this can take 3-15 minutes...", credential);

        let video_url = self
            .client
            .submit(&api_url, &credential, request, dimensions)
            .await?;
        info!("✅ Video generated");
        info!("🔗 Video URL: {}", video_url);

        let filename = self
            .client
            .fetch_and_store(&video_url, &request.prompt, &self.host.output_dir)
            .await?;
        let video_path = self.host.output_dir.join(&filename);
        info!("✨ Done! File: {}", filename);

        Ok(GenerationResult {
            video: VideoHandle::new(video_path),
            video_url,
            info: success_summary(request, dimensions, &filename),
        })
    }

    fn api_url(&self, request: &GenerationRequest) -> Result<String> {
        let raw = request
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(&self.config.api.base_url);

        url::Url::parse(raw).map_err(|source| JimengError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;

        Ok(raw.trim_end_matches('/').to_string())
    }

    /// Return types in host order
    pub fn return_types(&self) -> [String; 3] {
        return_types(&self.host.media_type)
    }

    /// Input declaration in the host's INPUT_TYPES shape
    pub fn input_types(&self) -> Value {
        input_types(&self.config.api.base_url)
    }

    /// Full node definition: inputs, outputs and registration metadata
    pub fn definition(&self) -> Value {
        let mut definition = Map::new();
        definition.insert("node_id".into(), NODE_ID.into());
        definition.insert("display_name".into(), NODE_DISPLAY_NAME.into());
        definition.insert("category".into(), NODE_CATEGORY.into());
        definition.insert("function".into(), NODE_FUNCTION.into());
        definition.insert("output_node".into(), false.into());
        definition.insert("input_types".into(), self.input_types());
        definition.insert("return_types".into(), json!(self.return_types()));
        definition.insert("return_names".into(), json!(RETURN_NAMES));
        Value::Object(definition)
    }
}

/// Return types in host order for the given video media type
pub fn return_types(media_type: &str) -> [String; 3] {
    [
        media_type.to_string(),
        "STRING".to_string(),
        "STRING".to_string(),
    ]
}

/// Input declaration in the host's INPUT_TYPES shape
pub fn input_types(default_api_url: &str) -> Value {
    fn choices(labels: impl IntoIterator<Item = &'static str>) -> Value {
        Value::Array(labels.into_iter().map(Value::from).collect())
    }

    json!({
        "required": {
            "prompt": ["STRING", {
                "default": DEFAULT_PROMPT,
                "multiline": true,
                "forceInput": false,
                "tooltip": "Video description text"
            }],
            "model": [choices(Model::ALL.iter().map(Model::label)), {
                "default": Model::default().label(),
                "forceInput": false,
                "tooltip": "Generation model"
            }],
            "aspect_ratio": [choices(AspectRatio::ALL.iter().map(AspectRatio::label)), {
                "default": AspectRatio::default().label(),
                "forceInput": false,
                "tooltip": "Video aspect ratio"
            }],
            "resolution": [choices(Resolution::ALL.iter().map(Resolution::label)), {
                "default": Resolution::default().label(),
                "forceInput": false,
                "tooltip": "Video resolution"
            }],
            "duration": [choices(DurationTier::ALL.iter().map(DurationTier::label)), {
                "default": DurationTier::default().label(),
                "forceInput": false,
                "tooltip": format!(
                    "Video duration (10s needs >= {} credits)",
                    DurationTier::Long.min_credits()
                )
            }],
        },
        "optional": {
            "first_frame": ["IMAGE", {
                "tooltip": "Optional first frame; leave empty for text to video"
            }],
            "end_frame": ["IMAGE", {
                "tooltip": "Optional end frame"
            }],
            "api_url": ["STRING", {
                "default": default_api_url,
                "multiline": false,
                "forceInput": false,
                "tooltip": "API service address"
            }],
            "manual_session": ["STRING", {
                "default": "",
                "multiline": false,
                "forceInput": false,
                "tooltip": "Manual session (empty reads the session pool)"
            }],
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    fn node() -> JimengVideoNode {
        let config = ConfigBuilder::new().build();
        JimengVideoNode::new(config, HostContext::new("/tmp/out", "VIDEO")).unwrap()
    }

    #[test]
    fn test_failure_summaries() {
        let timeout = JimengError::Timeout {
            operation: "Video generation",
            after: std::time::Duration::from_secs(900),
        };
        assert_eq!(failure_summary(&timeout), format!("{}{}", ERROR_PREFIX, TIMEOUT_MESSAGE));

        let generic = failure_summary(&JimengError::EmptyPool);
        assert!(generic.starts_with(ERROR_PREFIX));
        assert!(generic.contains("Session pool is empty"));

        let result = GenerationResult::failure(&JimengError::EmptyPool);
        assert!(!result.is_success());
        let (video, url, info) = result.into_outputs();
        assert!(video.is_empty());
        assert!(url.is_empty());
        assert!(info.starts_with(ERROR_PREFIX));
    }

    #[test]
    fn test_success_summary_lines() {
        let request = GenerationRequest::new("a cat").with_duration(DurationTier::Long);
        let summary = success_summary(&request, request.dimensions(), "clip.mp4");
        let lines: Vec<&str> = summary.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "🎬 Mode: Text to Video");
        assert_eq!(lines[2], "📐 Size: 384x704");
        assert_eq!(lines[4], "⏰ Duration: 10s");
        assert_eq!(lines[6], "💬 Prompt: a cat");
    }

    #[test]
    fn test_api_url_fallback_and_trailing_slash() {
        let node = node();
        let request = GenerationRequest::new("x");
        assert_eq!(node.api_url(&request).unwrap(), "http://localhost:5566");

        let request = GenerationRequest::new("x").with_api_url("http://10.0.0.2:5566/");
        assert_eq!(node.api_url(&request).unwrap(), "http://10.0.0.2:5566");

        let request = GenerationRequest::new("x").with_api_url("localhost 5566");
        assert!(matches!(node.api_url(&request), Err(JimengError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_invalid_host_inputs_become_failure_results() {
        let node = node();
        let valid = HostInputs {
            prompt: "a cat".to_string(),
            model: "jimeng-video-3.0".to_string(),
            aspect_ratio: "16:9".to_string(),
            resolution: "720p".to_string(),
            duration: "5s".to_string(),
            ..HostInputs::default()
        };

        let unknown_model = HostInputs {
            model: "jimeng-video-9.9".to_string(),
            ..valid.clone()
        };
        let result = node.generate(unknown_model).await;
        assert!(!result.is_success());
        assert!(result.video.is_empty());
        assert!(result.video_url.is_empty());
        assert!(result.info.starts_with(ERROR_PREFIX));
        assert!(result.info.contains("jimeng-video-9.9"));

        let unknown_duration = HostInputs {
            duration: "7s".to_string(),
            ..valid.clone()
        };
        assert!(node.generate(unknown_duration).await.info.starts_with(ERROR_PREFIX));

        let bad_frame = HostInputs {
            first_frame: Some((2, 2, 3, vec![0.0; 5])),
            ..valid
        };
        let result = node.generate(bad_frame).await;
        assert!(result.video.is_empty());
        assert!(result.info.starts_with(ERROR_PREFIX));
    }

    #[test]
    fn test_host_inputs_into_request() {
        let request = HostInputs {
            prompt: "a cat".to_string(),
            model: "jimeng-video-3.0-pro".to_string(),
            aspect_ratio: "not-a-ratio".to_string(),
            resolution: "1080p".to_string(),
            duration: "10s".to_string(),
            end_frame: Some((1, 1, 3, vec![0.5; 3])),
            ..HostInputs::default()
        }
        .into_request()
        .unwrap();

        assert_eq!(request.model, Model::Video30Pro);
        assert_eq!(request.aspect_ratio, AspectRatio::Widescreen);
        assert_eq!(request.duration, DurationTier::Long);
        assert!(request.first_frame.is_none());
        assert!(request.end_frame.is_some());
    }

    #[test]
    fn test_registration_declarations_without_node() {
        assert_eq!(return_types("VHS_VIDEO"), ["VHS_VIDEO", "STRING", "STRING"]);

        let inputs = input_types("http://10.0.0.2:5566");
        assert_eq!(inputs["optional"]["api_url"][1]["default"], "http://10.0.0.2:5566");
        assert_eq!(inputs["required"]["prompt"][1]["default"], DEFAULT_PROMPT);
        assert_eq!(inputs["required"]["duration"][0], json!(["5s", "10s"]));
    }

    #[test]
    fn test_node_definition() {
        let definition = node().definition();

        assert_eq!(definition["node_id"], NODE_ID);
        assert_eq!(definition["category"], "Jimeng API");
        assert_eq!(definition["display_name"], "Jimeng Video (即梦-智能视频)");
        assert_eq!(definition["return_types"], json!(["VIDEO", "STRING", "STRING"]));
        assert_eq!(definition["return_names"], json!(["video", "video_url", "info"]));

        let inputs = &definition["input_types"];
        assert_eq!(inputs["required"]["model"][0].as_array().unwrap().len(), 4);
        assert_eq!(inputs["required"]["aspect_ratio"][0].as_array().unwrap().len(), 6);
        assert_eq!(inputs["required"]["aspect_ratio"][1]["default"], "9:16");
        assert_eq!(inputs["optional"]["api_url"][1]["default"], "http://localhost:5566");
        assert_eq!(inputs["optional"]["first_frame"][0], "IMAGE");
    }
}

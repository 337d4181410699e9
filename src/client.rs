use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::config::{ApiConfig, OutputConfig};
use crate::credentials::Credential;
use crate::error::{JimengError, Result};
use crate::frames::{FrameSlot, FrameUpload};
use crate::params::{GenerationMode, GenerationRequest, ResolvedDimensions};

/// Longest prompt prefix carried into a file name
const FILENAME_PROMPT_CHARS: usize = 30;

#[derive(Debug, Serialize)]
struct TextToVideoRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    width: u32,
    height: u32,
    resolution: &'a str,
    duration: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedVideo>,
}

#[derive(Debug, Deserialize)]
struct GeneratedVideo {
    url: Option<String>,
}

/// HTTP client for the Jimeng generation and media endpoints
#[derive(Debug, Clone)]
pub struct JimengClient {
    client: reqwest::Client,
    generation_timeout: Duration,
    download_timeout: Duration,
    output: OutputConfig,
}

impl JimengClient {
    pub fn new(client: reqwest::Client, api: &ApiConfig, output: OutputConfig) -> Self {
        Self {
            client,
            generation_timeout: api.generation_timeout(),
            download_timeout: api.download_timeout(),
            output,
        }
    }

    /// Submit a generation request and return the remote media URL
    pub async fn submit(
        &self,
        api_url: &str,
        credential: &Credential,
        request: &GenerationRequest,
        dimensions: ResolvedDimensions,
    ) -> Result<String> {
        let url = format!("{}/v1/videos/generations", api_url);
        let bearer = format!("Bearer {}", credential.header_value());

        let response = match request.mode() {
            GenerationMode::TextToVideo => {
                info!("📝 Mode: Text to Video");
                let payload = TextToVideoRequest {
                    model: request.model.label(),
                    prompt: &request.prompt,
                    width: dimensions.width,
                    height: dimensions.height,
                    resolution: request.resolution.label(),
                    duration: request.duration.label(),
                };

                self.client
                    .post(&url)
                    .header("Authorization", bearer)
                    .json(&payload)
                    .timeout(self.generation_timeout)
                    .send()
                    .await
            }
            GenerationMode::ImageToVideo { frames } => {
                info!("🖼️  Mode: Image to Video ({} frames)", frames);
                let uploads = self.stage_frames(request).await?;
                let outcome = self
                    .post_multipart(&url, bearer, request, dimensions, &uploads)
                    .await;
                for upload in uploads {
                    upload.close();
                }
                outcome?
            }
        }
        .map_err(|e| JimengError::from_transport(e, "Video generation", api_url, self.generation_timeout))?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Generation response {}: {} bytes", status, body.len());

        if status == reqwest::StatusCode::OK {
            if let Some(video_url) = serde_json::from_str::<GenerationResponse>(&body)
                .ok()
                .and_then(|parsed| parsed.data.into_iter().next())
                .and_then(|video| video.url)
                .filter(|url| !url.is_empty())
            {
                return Ok(video_url);
            }
        }

        Err(JimengError::RemoteGeneration {
            status: status.as_u16(),
            body,
        })
    }

    async fn stage_frames(&self, request: &GenerationRequest) -> Result<Vec<FrameUpload>> {
        let temp_dir = self.output.temp_dir.as_deref();
        let mut uploads = Vec::new();
        for (slot, frame) in [
            (FrameSlot::First, request.first_frame.as_ref()),
            (FrameSlot::End, request.end_frame.as_ref()),
        ] {
            if let Some(frame) = frame {
                uploads.push(FrameUpload::stage(slot, frame, temp_dir).await?);
            }
        }
        Ok(uploads)
    }

    /// Outer error carries local failures, inner result the transport outcome.
    async fn post_multipart(
        &self,
        url: &str,
        bearer: String,
        request: &GenerationRequest,
        dimensions: ResolvedDimensions,
        uploads: &[FrameUpload],
    ) -> Result<std::result::Result<reqwest::Response, reqwest::Error>> {
        let mut form = Form::new()
            .text("prompt", request.prompt.clone())
            .text("model", request.model.label())
            .text("width", dimensions.width.to_string())
            .text("height", dimensions.height.to_string())
            .text("resolution", request.resolution.label())
            .text("duration", request.duration.label());

        for upload in uploads {
            let part = Part::bytes(upload.png_bytes().to_vec())
                .file_name(upload.slot().file_name())
                .mime_str("image/png")?;
            form = form.part(upload.slot().field_name(), part);
        }

        info!("🌐 Sending image-to-video request: {}", url);
        Ok(self
            .client
            .post(url)
            .header("Authorization", bearer)
            .multipart(form)
            .timeout(self.generation_timeout)
            .send()
            .await)
    }

    /// Download the generated video into `output_dir`, returning the file name
    pub async fn fetch_and_store(
        &self,
        media_url: &str,
        prompt: &str,
        output_dir: &Path,
    ) -> Result<String> {
        let filename = video_filename(&self.output.filename_prefix, prompt, chrono::Local::now());
        let output_path = output_dir.join(&filename);

        info!("📥 Downloading video...");
        info!("📂 Save path: {}", output_path.display());

        let response = self
            .client
            .get(media_url)
            .timeout(self.download_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(JimengError::Download)?;

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| JimengError::DownloadIo {
                path: output_dir.to_path_buf(),
                source,
            })?;

        match self.write_stream(response, &output_path).await {
            Ok(bytes) => {
                info!(
                    "✅ Video downloaded: {:.2} MB",
                    bytes as f64 / (1024.0 * 1024.0)
                );
                Ok(filename)
            }
            Err(e) => {
                if self.output.cleanup_partial_downloads {
                    if let Err(remove_err) = tokio::fs::remove_file(&output_path).await {
                        if remove_err.kind() != std::io::ErrorKind::NotFound {
                            warn!(
                                "⚠️ Failed to remove partial download {}: {}",
                                output_path.display(),
                                remove_err
                            );
                        }
                    }
                }
                Err(e)
            }
        }
    }

    async fn write_stream(&self, response: reqwest::Response, path: &Path) -> Result<u64> {
        let io_err = |source| JimengError::DownloadIo {
            path: path.to_path_buf(),
            source,
        };

        let file = tokio::fs::File::create(path).await.map_err(io_err)?;
        let mut writer = BufWriter::with_capacity(self.output.chunk_size, file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(JimengError::Download)?;
            writer.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }

        writer.flush().await.map_err(io_err)?;
        Ok(written)
    }
}

/// Keep alphanumerics, spaces, hyphens and underscores of the first prompt
/// characters, trimmed, with spaces turned into underscores.
pub fn sanitize_prompt(prompt: &str) -> String {
    let kept: String = prompt
        .chars()
        .take(FILENAME_PROMPT_CHARS)
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim().replace(' ', "_")
}

/// `{prefix}_{YYYYMMDD_HHMMSS}_{sanitized prompt}.mp4`
pub fn video_filename<Tz: chrono::TimeZone>(
    prefix: &str,
    prompt: &str,
    timestamp: chrono::DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}_{}.mp4",
        prefix,
        timestamp.format("%Y%m%d_%H%M%S"),
        sanitize_prompt(prompt)
    )
}

// Remote video-indexing collaborator: transcription + on-screen OCR
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use std::path::Path;
use tokio_util::io::ReaderStream;

use crate::ytdlp_client::{MediaScratch, YtDlpClient};

/// Terminal and non-terminal states of a remote indexing job.
/// Failure always surfaces as a status value, never as a silent
/// empty result.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexingStatus {
    Pending,
    Complete,
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct IndexingResult {
    pub transcript: String,
    pub on_screen_text: String,
}

/// Video download + remote indexing service, consumed by the
/// extraction node. `submit` owns resolving the URL to local media
/// and shipping it to the provider; callers never see the artifacts.
#[async_trait]
pub trait VideoIndexer: Send + Sync {
    async fn submit(&self, video_url: &str) -> Result<String, String>;
    async fn poll_status(&self, job_id: &str) -> Result<IndexingStatus, String>;
    async fn fetch_result(&self, job_id: &str) -> Result<IndexingResult, String>;
}

pub struct HttpVideoIndexer {
    client: Client,
    base_url: String,
    api_key: String,
    media_dir: std::path::PathBuf,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    state: String,
    failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InsightsResponse {
    transcript: String,
    on_screen_text: String,
}

impl HttpVideoIndexer {
    pub fn new(base_url: String, api_key: String, media_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            media_dir: media_dir.into(),
        }
    }

    async fn upload_media(&self, media_path: &Path, source_url: &str) -> Result<String, String> {
        let file = tokio::fs::File::open(media_path)
            .await
            .map_err(|e| format!("Failed to open media file: {}", e))?;

        let file_name = media_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "media.mp4".to_string());

        let part = Part::stream(Body::wrap_stream(ReaderStream::new(file)))
            .file_name(file_name)
            .mime_str("video/mp4")
            .map_err(|e| format!("Invalid media mime type: {}", e))?;

        let form = Form::new()
            .part("media", part)
            .text("source_url", source_url.to_string());

        let response = self
            .client
            .post(format!("{}/videos", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Indexer submit request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("Indexer submit error ({}): {}", status, error_text));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse indexer submit response: {}", e))?;

        Ok(submitted.id)
    }
}

#[async_trait]
impl VideoIndexer for HttpVideoIndexer {
    async fn submit(&self, video_url: &str) -> Result<String, String> {
        // Scratch dir is dropped (and removed) once the provider owns
        // the media, whether upload succeeded or not.
        let scratch = MediaScratch::create(&self.media_dir)?;
        let media = YtDlpClient::download_media(video_url, scratch.dir()).await?;

        tracing::info!("⬆️ Uploading {} to indexing provider", media.title);
        let job_id = self.upload_media(&media.file_path, video_url).await?;
        tracing::info!("Indexing job submitted: {}", job_id);

        Ok(job_id)
    }

    async fn poll_status(&self, job_id: &str) -> Result<IndexingStatus, String> {
        let response = self
            .client
            .get(format!("{}/videos/{}/status", self.base_url, job_id))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| format!("Indexer status request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("Indexer status error ({}): {}", status, error_text));
        }

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse indexer status response: {}", e))?;

        match parsed.state.as_str() {
            "uploaded" | "queued" | "processing" => Ok(IndexingStatus::Pending),
            "processed" => Ok(IndexingStatus::Complete),
            "failed" => Ok(IndexingStatus::Failed {
                reason: parsed
                    .failure_reason
                    .unwrap_or_else(|| "no failure reason given".to_string()),
            }),
            other => Err(format!("Unknown indexing state: {}", other)),
        }
    }

    async fn fetch_result(&self, job_id: &str) -> Result<IndexingResult, String> {
        let response = self
            .client
            .get(format!("{}/videos/{}/insights", self.base_url, job_id))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| format!("Indexer insights request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("Indexer insights error ({}): {}", status, error_text));
        }

        let insights: InsightsResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse indexer insights response: {}", e))?;

        Ok(IndexingResult {
            transcript: insights.transcript,
            on_screen_text: insights.on_screen_text,
        })
    }
}

// yt-dlp wrapper - resolves a video URL to locally fetchable media
//
// Calls the yt-dlp executable directly to avoid dependency conflicts.
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use uuid::Uuid;

/// Per-audit scratch directory for downloaded media. Removed on drop,
/// success or failure, so concurrent audits never share artifacts and
/// nothing leaks on an error path.
pub struct MediaScratch {
    dir: PathBuf,
}

impl MediaScratch {
    pub fn create(root: &Path) -> Result<Self, String> {
        let dir = root.join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create scratch directory: {}", e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for MediaScratch {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            tracing::warn!("Failed to clean up scratch dir {}: {}", self.dir.display(), e);
        }
    }
}

/// Result of a media download
#[derive(Debug)]
pub struct DownloadedMedia {
    pub file_path: PathBuf,
    pub title: String,
}

pub struct YtDlpClient;

impl YtDlpClient {
    /// Download the media for `video_url` into `output_dir`.
    pub async fn download_media(
        video_url: &str,
        output_dir: &Path,
    ) -> Result<DownloadedMedia, String> {
        tracing::info!("📥 Downloading media: {}", video_url);

        Self::check_ytdlp_installed().await?;

        let output_template = output_dir.join("media.%(ext)s");
        let output = Command::new("yt-dlp")
            .arg("--format")
            .arg("bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best")
            .arg("--output")
            .arg(&output_template)
            .arg("--no-playlist")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--print")
            .arg("after_move:title")
            .arg("--no-simulate")
            .arg(video_url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                format!("Failed to execute yt-dlp: {}. Make sure yt-dlp is installed.", e)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!("yt-dlp error: {}", stderr);
            return Err(format!("yt-dlp download failed: {}", stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = stdout.lines().collect();

        let file_path = lines
            .first()
            .map(PathBuf::from)
            .ok_or_else(|| "yt-dlp produced no output path".to_string())?;

        Ok(DownloadedMedia {
            file_path,
            title: lines.get(1).unwrap_or(&"Unknown Title").to_string(),
        })
    }

    /// Check if yt-dlp is installed
    async fn check_ytdlp_installed() -> Result<(), String> {
        let output = Command::new("yt-dlp")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(
                "yt-dlp is not installed. Install it with: pip install yt-dlp OR apt install yt-dlp"
                    .to_string(),
            ),
        }
    }
}

/// Failure-reason markers that indicate the input URL itself is bad,
/// as opposed to a transient provider condition. yt-dlp and the
/// indexing provider both embed these in their error strings.
pub fn is_invalid_input_failure(reason: &str) -> bool {
    const MARKERS: &[&str] = &[
        "Unsupported URL",
        "is not a valid URL",
        "Video unavailable",
        "HTTP Error 404",
        "unsupported media",
        "unreachable",
    ];
    MARKERS.iter().any(|m| reason.contains(m))
}

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use tubegrab_core::core::format::DownloadConfig;
use tubegrab_core::core::progress::RawSample;
use tubegrab_core::fs_paths::{AppPaths, DesktopPaths};

use crate::core::process;
use crate::platforms::traits::MediaEngine;

const PROGRESS_PREFIX: &str = "tubegrab:";
const PROGRESS_TEMPLATE: &str = "download:tubegrab:%(info.id)s|%(progress.status)s|%(progress._percent_str)s|%(progress.total_bytes,progress.total_bytes_estimate)s";
const STDERR_TAIL: usize = 20;

fn bin_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

pub async fn find_ytdlp() -> Option<PathBuf> {
    let bin_name = bin_name();

    if let Ok(status) = process::command(bin_name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        if status.success() {
            return Some(PathBuf::from(bin_name));
        }
    }

    let managed = managed_ytdlp_path()?;
    if managed.exists() {
        return Some(managed);
    }

    None
}

fn managed_ytdlp_path() -> Option<PathBuf> {
    Some(DesktopPaths.bin_dir()?.join(bin_name()))
}

/// Locates the engine, installing the release binary into the managed bin
/// directory when it is nowhere to be found.
pub async fn ensure_ytdlp(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!("yt-dlp not found at {}", path.display()));
    }

    if let Some(path) = find_ytdlp().await {
        tracing::debug!("using yt-dlp at {}", path.display());
        return Ok(path);
    }

    tracing::info!("yt-dlp not found, installing the latest release");
    download_ytdlp_binary().await
}

async fn download_ytdlp_binary() -> anyhow::Result<PathBuf> {
    let target = managed_ytdlp_path()
        .ok_or_else(|| anyhow!("could not determine the data directory"))?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let download_url = if cfg!(target_os = "windows") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos"
    } else {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?;

    let response = client.get(download_url).send().await?;

    if !response.status().is_success() {
        return Err(anyhow!("failed to download yt-dlp: HTTP {}", response.status()));
    }

    let bytes = response.bytes().await?;
    tokio::fs::write(&target, &bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(&target, perms).await?;
    }

    tracing::info!("installed yt-dlp to {}", target.display());
    Ok(target)
}

pub async fn get_info(ytdlp: &Path, url: &str, flat: bool) -> anyhow::Result<serde_json::Value> {
    let mut args = vec!["--dump-single-json", "--no-warnings"];
    if flat {
        args.push("--flat-playlist");
    } else {
        args.push("--no-playlist");
    }
    args.push(url);

    let output = process::command(ytdlp)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| anyhow!("failed to run yt-dlp: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{}", last_error_line(&stderr)));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| anyhow!("yt-dlp returned invalid JSON: {}", e))?;

    Ok(json)
}

pub async fn download(
    ytdlp: &Path,
    url: &str,
    config: &DownloadConfig,
    progress: mpsc::Sender<RawSample>,
) -> anyhow::Result<()> {
    let mut args = config.to_args();
    args.extend([
        "--no-playlist".to_string(),
        "--newline".to_string(),
        "--progress-template".to_string(),
        PROGRESS_TEMPLATE.to_string(),
        url.to_string(),
    ]);

    let mut child = process::command(ytdlp)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow!("failed to start yt-dlp: {}", e))?;

    let stdout = child.stdout.take().ok_or_else(|| anyhow!("yt-dlp has no stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("yt-dlp has no stderr"))?;

    let line_reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(sample) = parse_progress_line(&line) {
                if progress.send(sample).await.is_err() {
                    break;
                }
            }
        }
    });

    let stderr_reader = tokio::spawn(async move {
        let mut tail = VecDeque::with_capacity(STDERR_TAIL);
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tail.len() == STDERR_TAIL {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into_iter().collect::<Vec<_>>().join("\n")
    });

    let status = child
        .wait()
        .await
        .map_err(|e| anyhow!("yt-dlp process failed: {}", e))?;

    if let Err(e) = line_reader.await {
        tracing::error!("yt-dlp progress reader stopped unexpectedly: {}", e);
    }
    let stderr_tail = stderr_reader.await.unwrap_or_default();

    if !status.success() {
        let reason = last_error_line(&stderr_tail);
        if reason.is_empty() {
            return Err(anyhow!("yt-dlp exited with {}", status));
        }
        return Err(anyhow!("yt-dlp exited with {}: {}", status, reason));
    }

    Ok(())
}

/// Parses one `tubegrab:<id>|<status>|<percent>|<total>` progress line.
pub fn parse_progress_line(line: &str) -> Option<RawSample> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.splitn(4, '|');
    let id = fields.next()?.trim();
    let status = fields.next()?.trim();
    let percent = fields.next().unwrap_or("").to_string();
    let total = fields
        .next()
        .and_then(|t| t.trim().parse::<f64>().ok())
        .filter(|t| t.is_finite() && *t >= 0.0)
        .map(|t| t as u64);

    let id = if id == "NA" { "" } else { id };
    Some(RawSample::new(id, status, percent).with_total_bytes(total))
}

fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_default()
}

/// `MediaEngine` backed by a yt-dlp executable.
pub struct YtDlpEngine {
    path: PathBuf,
}

impl YtDlpEngine {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn locate(explicit: Option<&Path>) -> anyhow::Result<Self> {
        Ok(Self::new(ensure_ytdlp(explicit).await?))
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract_metadata(&self, url: &str, flat: bool) -> anyhow::Result<serde_json::Value> {
        get_info(&self.path, url, flat).await
    }

    async fn download(
        &self,
        url: &str,
        config: &DownloadConfig,
        progress: mpsc::Sender<RawSample>,
    ) -> anyhow::Result<()> {
        download(&self.path, url, config, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress_line() {
        let sample =
            parse_progress_line("tubegrab:dQw4w9WgXcQ|downloading| 42.1%|1048576").unwrap();
        assert_eq!(sample.id, "dQw4w9WgXcQ");
        assert_eq!(sample.status, "downloading");
        assert_eq!(sample.percent_text, " 42.1%");
        assert_eq!(sample.total_bytes, Some(1_048_576));
    }

    #[test]
    fn estimate_with_fraction_and_missing_total() {
        let s = parse_progress_line("tubegrab:a|downloading|1.0%|2048.7").unwrap();
        assert_eq!(s.total_bytes, Some(2048));
        let s = parse_progress_line("tubegrab:a|downloading|1.0%|NA").unwrap();
        assert_eq!(s.total_bytes, None);
    }

    #[test]
    fn unknown_id_becomes_empty() {
        let s = parse_progress_line("tubegrab:NA|finished|100%|NA").unwrap();
        assert!(s.id.is_empty());
        assert!(s.is_complete());
    }

    #[test]
    fn ignores_other_output() {
        assert!(parse_progress_line("[download] Destination: x.webm").is_none());
        assert!(parse_progress_line("tubegrab:only-id").is_none());
    }

    #[test]
    fn error_line_prefers_error_prefix() {
        let stderr = "WARNING: something\nERROR: [youtube] abc: Private video\nfoo\n";
        assert_eq!(last_error_line(stderr), "[youtube] abc: Private video");
        assert_eq!(last_error_line("just text\n"), "just text");
        assert_eq!(last_error_line(""), "");
    }
}

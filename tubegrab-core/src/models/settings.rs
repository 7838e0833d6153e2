use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::fs_paths::{AppPaths, DesktopPaths};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub advanced: AdvancedSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            download: DownloadSettings::default(),
            advanced: AdvancedSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_output_dir")]
    pub default_output_dir: PathBuf,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    #[serde(default = "default_video_quality")]
    pub video_quality: String,
    #[serde(default = "default_true")]
    pub embed_thumbnail: bool,
    #[serde(default)]
    pub extra_ytdlp_flags: Vec<String>,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            default_output_dir: default_output_dir(),
            format: default_format(),
            audio_format: default_audio_format(),
            video_quality: default_video_quality(),
            embed_thumbnail: true,
            extra_ytdlp_flags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedSettings {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            ytdlp_path: None,
        }
    }
}

fn default_schema_version() -> u32 {
    1
}

fn default_output_dir() -> PathBuf {
    DesktopPaths.downloads_dir().join("youtube-downloader")
}

fn default_format() -> String {
    "video".into()
}

fn default_audio_format() -> String {
    "mp3".into()
}

fn default_video_quality() -> String {
    "720p".into()
}

pub fn default_max_workers() -> usize {
    4
}

fn default_true() -> bool {
    true
}

use std::path::{Path, PathBuf};

use tubegrab_core::fs_paths::{AppPaths, DesktopPaths};
use tubegrab_core::models::settings::AppSettings;

const STORE_PATH: &str = "settings.json";

pub fn settings_path() -> PathBuf {
    DesktopPaths.data_dir().join(STORE_PATH)
}

/// Missing or unreadable settings fall back to defaults; a broken file never
/// stops a run.
pub fn load_settings_from(path: &Path) -> AppSettings {
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AppSettings::default(),
        Err(e) => {
            tracing::warn!("failed to read settings {}: {}", path.display(), e);
            return AppSettings::default();
        }
    };

    match serde_json::from_str::<AppSettings>(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("ignoring corrupt settings {}: {}", path.display(), e);
            AppSettings::default()
        }
    }
}

pub fn load_settings() -> AppSettings {
    load_settings_from(&settings_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("nope.json"));
        assert_eq!(settings.download.format, "video");
        assert_eq!(settings.advanced.max_workers, 4);
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings_from(&path).download.audio_format, "mp3");
    }

    #[test]
    fn written_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = AppSettings::default();
        settings.download.video_quality = "1080p".into();
        settings.advanced.max_workers = 8;

        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        let loaded = load_settings_from(&path);
        assert_eq!(loaded.download.video_quality, "1080p");
        assert_eq!(loaded.advanced.max_workers, 8);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"download": {"format": "audio"}}"#).unwrap();
        let loaded = load_settings_from(&path);
        assert_eq!(loaded.download.format, "audio");
        assert_eq!(loaded.download.audio_format, "mp3");
        assert!(loaded.download.embed_thumbnail);
    }
}

use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "TUBEGRAB_DATA_DIR";

pub trait AppPaths: Send + Sync {
    fn downloads_dir(&self) -> PathBuf;
    fn data_dir(&self) -> PathBuf;
    fn bin_dir(&self) -> Option<PathBuf>;
}

pub struct DesktopPaths;

impl AppPaths for DesktopPaths {
    fn downloads_dir(&self) -> PathBuf {
        dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn data_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        dirs::data_dir()
            .map(|d| d.join("tubegrab"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn bin_dir(&self) -> Option<PathBuf> {
        Some(self.data_dir().join("bin"))
    }
}

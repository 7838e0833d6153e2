use async_trait::async_trait;
use tokio::sync::mpsc;

use tubegrab_core::core::format::DownloadConfig;
use tubegrab_core::core::progress::RawSample;

/// The external extraction/download engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Raw metadata record for `url`. In flat mode collection entries are
    /// shallow references.
    async fn extract_metadata(&self, url: &str, flat: bool) -> anyhow::Result<serde_json::Value>;

    /// Downloads `url`, pushing progress samples into `progress` until done.
    async fn download(
        &self,
        url: &str,
        config: &DownloadConfig,
        progress: mpsc::Sender<RawSample>,
    ) -> anyhow::Result<()>;
}

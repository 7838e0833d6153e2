use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tubegrab_core::core::events::{EventEmitter, StatusEvent, TotalBytes};
use tubegrab_core::core::format::build_download_config;
use tubegrab_core::core::progress::{ProgressTracker, RawSample};
use tubegrab_core::error::Error;
use tubegrab_core::models::media::{DownloadRequest, FormatKind, FormatOptions, Item};

use crate::core::filename::{escape_template, sanitize_title};
use crate::platforms::traits::MediaEngine;
use crate::platforms::youtube::YouTubeResolver;

const PROGRESS_BUFFER: usize = 64;
const CANCELLED: &str = "download cancelled before start";

#[derive(Debug, Clone, PartialEq)]
pub enum QueueStatus {
    Queued,
    Active,
    Complete { skipped: bool },
    Error { message: String },
}

pub struct QueueItem {
    pub id: u64,
    pub request: DownloadRequest,
    pub status: QueueStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Downloaded,
    Skipped,
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub resolved: usize,
    pub unresolved: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Default)]
pub struct DownloadQueue {
    pub items: Vec<QueueItem>,
    next_id: u64,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, request: DownloadRequest) -> u64 {
        self.next_id += 1;
        self.items.push(QueueItem {
            id: self.next_id,
            request,
            status: QueueStatus::Queued,
        });
        self.next_id
    }

    /// Claims the oldest queued item for a worker.
    pub fn take_next(&mut self) -> Option<(u64, DownloadRequest)> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.status == QueueStatus::Queued)?;
        item.status = QueueStatus::Active;
        Some((item.id, item.request.clone()))
    }

    pub fn mark_complete(&mut self, id: u64, outcome: &ItemOutcome) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.status = match outcome {
                ItemOutcome::Downloaded => QueueStatus::Complete { skipped: false },
                ItemOutcome::Skipped => QueueStatus::Complete { skipped: true },
                ItemOutcome::Failed { message } => QueueStatus::Error {
                    message: message.clone(),
                },
            };
        }
    }

    /// Fails every item that has not started yet and hands them back so the
    /// caller can report them.
    pub fn cancel_pending(&mut self) -> Vec<DownloadRequest> {
        self.items
            .iter_mut()
            .filter(|i| i.status == QueueStatus::Queued)
            .map(|i| {
                i.status = QueueStatus::Error {
                    message: CANCELLED.to_string(),
                };
                i.request.clone()
            })
            .collect()
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for item in &self.items {
            match &item.status {
                QueueStatus::Complete { skipped: false } => summary.downloaded += 1,
                QueueStatus::Complete { skipped: true } => summary.skipped += 1,
                QueueStatus::Error { message } if message == CANCELLED => summary.cancelled += 1,
                QueueStatus::Error { .. } => summary.failed += 1,
                QueueStatus::Queued | QueueStatus::Active => {}
            }
        }
        summary
    }
}

/// Options shared by every download of one invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub format: FormatOptions,
    pub output_dir: PathBuf,
    pub max_workers: usize,
    pub embed_thumbnail: bool,
    pub extra_flags: Vec<String>,
}

pub fn expected_output_path(request: &DownloadRequest) -> PathBuf {
    request.output_directory.join(format!(
        "{}.{}",
        sanitize_title(&request.item.title),
        request.format.extension()
    ))
}

fn output_template(request: &DownloadRequest) -> String {
    let stem = request
        .output_directory
        .join(sanitize_title(&request.item.title));
    format!("{}.%(ext)s", escape_template(&stem.to_string_lossy()))
}

async fn file_size(path: &Path) -> TotalBytes {
    tokio::fs::metadata(path).await.ok().map(|m| m.len()).into()
}

struct WorkerContext<E: EventEmitter> {
    engine: Arc<dyn MediaEngine>,
    emitter: E,
    tracker: Arc<ProgressTracker>,
    options: Arc<RunOptions>,
    cancel: CancellationToken,
    queue: tokio::sync::Mutex<DownloadQueue>,
}

pub struct Orchestrator<E: EventEmitter> {
    engine: Arc<dyn MediaEngine>,
    resolver: YouTubeResolver,
    emitter: E,
    tracker: Arc<ProgressTracker>,
    options: Arc<RunOptions>,
    cancel: CancellationToken,
}

impl<E: EventEmitter> Orchestrator<E> {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        emitter: E,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            resolver: YouTubeResolver::new(engine.clone()),
            engine,
            emitter,
            tracker: Arc::new(ProgressTracker::new()),
            options: Arc::new(options),
            cancel,
        }
    }

    fn workers(&self) -> usize {
        self.options.max_workers.max(1)
    }

    pub async fn run(&self, urls: &[String]) -> RunSummary {
        let (items, resolution) = self.resolve_all(urls).await;

        if self.options.format.format_kind == FormatKind::InfoOnly {
            return resolution;
        }

        let requests = items
            .into_iter()
            .map(|item| DownloadRequest {
                item,
                format: self.options.format.clone(),
                output_directory: self.options.output_dir.clone(),
            })
            .collect();

        let downloads = self.download_all(requests).await;
        RunSummary {
            resolved: resolution.resolved,
            unresolved: resolution.unresolved,
            ..downloads
        }
    }

    /// Resolves every URL with at most `max_workers` engine calls in flight.
    /// Items come back in input order; failed URLs are reported and skipped.
    pub async fn resolve_all(&self, urls: &[String]) -> (Vec<Item>, RunSummary) {
        let resolver = &self.resolver;
        let results: Vec<(String, Result<_, Error>)> = futures::stream::iter(urls.iter().cloned())
            .map(move |url| async move {
                let result = resolver.resolve(&url).await;
                (url, result)
            })
            .buffered(self.workers())
            .collect()
            .await;

        let mut summary = RunSummary::default();
        let mut items = Vec::new();
        for (url, result) in results {
            match result {
                Ok(payload) => {
                    self.emitter.emit_metadata(&payload);
                    summary.resolved += 1;
                    items.extend(payload.into_items());
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    summary.unresolved += 1;
                    let id = e.subject().unwrap_or(&url).to_string();
                    self.emitter
                        .emit_status(&StatusEvent::error(id, e.detail()));
                }
            }
        }
        (items, summary)
    }

    /// Runs `requests` on a fixed pool of workers. Each worker finishes one
    /// item before claiming the next; a failing item never stops the others.
    pub async fn download_all(&self, requests: Vec<DownloadRequest>) -> RunSummary {
        if requests.is_empty() {
            return RunSummary::default();
        }

        // Progress state is keyed by item id, so each id is downloaded once.
        let mut seen = HashSet::new();
        let mut queue = DownloadQueue::new();
        for request in requests {
            if !seen.insert(request.item.id.clone()) {
                tracing::info!("skipping duplicate entry {}", request.item.id);
                continue;
            }
            queue.enqueue(request);
        }
        let workers = self.workers().min(queue.items.len());

        let ctx = Arc::new(WorkerContext {
            engine: self.engine.clone(),
            emitter: self.emitter.clone(),
            tracker: self.tracker.clone(),
            options: self.options.clone(),
            cancel: self.cancel.clone(),
            queue: tokio::sync::Mutex::new(queue),
        });

        let handles: Vec<_> = (0..workers)
            .map(|n| tokio::spawn(worker_loop(ctx.clone(), n)))
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!("download worker stopped unexpectedly: {}", e);
            }
        }

        let summary = ctx.queue.lock().await.summary();
        summary
    }
}

async fn worker_loop<E: EventEmitter>(ctx: Arc<WorkerContext<E>>, worker: usize) {
    loop {
        if ctx.cancel.is_cancelled() {
            let cancelled = ctx.queue.lock().await.cancel_pending();
            for request in cancelled {
                if let Some(ev) = ctx.tracker.fail(&request.item.id, CANCELLED) {
                    ctx.emitter.emit_status(&ev);
                }
                ctx.tracker.forget(&request.item.id);
            }
            break;
        }

        let next = ctx.queue.lock().await.take_next();
        let Some((queue_id, request)) = next else {
            break;
        };

        tracing::debug!(worker, id = %request.item.id, "claimed item");
        let outcome = process_request(&ctx, &request).await;
        ctx.queue.lock().await.mark_complete(queue_id, &outcome);
    }
}

async fn process_request<E: EventEmitter>(
    ctx: &WorkerContext<E>,
    request: &DownloadRequest,
) -> ItemOutcome {
    let outcome = download_item(ctx, request).await;
    ctx.tracker.forget(&request.item.id);
    outcome
}

async fn download_item<E: EventEmitter>(
    ctx: &WorkerContext<E>,
    request: &DownloadRequest,
) -> ItemOutcome {
    let item = &request.item;
    let path = expected_output_path(request);
    let path_str = path.to_string_lossy().to_string();

    // Unlocked check: two workers targeting the same path may both download.
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        tracing::info!("file already exists: {}, skipping download", path_str);
        let size = file_size(&path).await;
        if let Some(ev) = ctx.tracker.finish(&item.id, &path_str, size) {
            ctx.emitter.emit_status(&ev);
        }
        return ItemOutcome::Skipped;
    }

    let Some(config) = build_download_config(&request.format, &output_template(request)) else {
        return ItemOutcome::Skipped;
    };
    let config = config
        .with_embed_thumbnail(ctx.options.embed_thumbnail)
        .with_extra_flags(ctx.options.extra_flags.clone());

    let (tx, mut rx) = mpsc::channel::<RawSample>(PROGRESS_BUFFER);

    let tracker = ctx.tracker.clone();
    let emitter = ctx.emitter.clone();
    let item_id = item.id.clone();
    let forward_path = path_str.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(mut sample) = rx.recv().await {
            if sample.id != item_id {
                sample.id = item_id.clone();
            }
            if let Some(ev) = tracker.observe(&sample, &forward_path) {
                emitter.emit_status(&ev);
            }
        }
    });

    tracing::info!("starting download for {} ({})", item.title, item.source_url);
    let result = ctx.engine.download(&item.source_url, &config, tx).await;
    if let Err(e) = forwarder.await {
        tracing::error!("progress forwarder for {} stopped unexpectedly: {}", item.id, e);
    }

    match result {
        Ok(()) => {
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tracing::warn!("engine succeeded but {} was not found", path_str);
            }
            let size = file_size(&path).await;
            if let Some(ev) = ctx.tracker.finish(&item.id, &path_str, size) {
                ctx.emitter.emit_status(&ev);
            }
            tracing::info!("download completed: {}", path_str);
            ItemOutcome::Downloaded
        }
        Err(e) => {
            let err = Error::DownloadFailure {
                id: item.id.clone(),
                message: e.to_string(),
            };
            tracing::error!("{}", err);
            if let Some(ev) = ctx.tracker.fail(&item.id, &err.detail()) {
                ctx.emitter.emit_status(&ev);
            }
            ItemOutcome::Failed {
                message: err.detail(),
            }
        }
    }
}

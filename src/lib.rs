use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use tubegrab_core::error::Error;

use crate::cli::{CliArgs, USAGE};
use crate::core::events::LineEventEmitter;
use crate::core::queue::{Orchestrator, RunSummary};
use crate::core::ytdlp::YtDlpEngine;
use crate::platforms::traits::MediaEngine;

pub mod cli;
pub mod core;
pub mod platforms;
pub mod storage;

/// Diagnostics go to stderr; stdout carries only framed events.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run(args: CliArgs) -> anyhow::Result<RunSummary> {
    if args.help {
        println!("{USAGE}");
        return Ok(RunSummary::default());
    }

    let settings = storage::config::load_settings();
    let options = args.into_run_options(&settings)?;

    tokio::fs::create_dir_all(&options.output_dir)
        .await
        .map_err(Error::from)
        .with_context(|| format!("cannot create {}", options.output_dir.display()))?;

    let engine_path = args.engine_path(&settings);
    let engine = YtDlpEngine::locate(engine_path.as_deref())
        .await
        .map_err(|e| Error::EngineUnavailable(format!("{e:#}")))?;
    let engine: Arc<dyn MediaEngine> = Arc::new(engine);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing active downloads");
                cancel.cancel();
            }
        })
    };

    tracing::info!(
        "{} url(s), format {}, {} worker(s) via {}, saving to {}",
        args.urls.len(),
        options.format.format_kind,
        options.max_workers,
        engine.name(),
        options.output_dir.display()
    );

    let orchestrator = Orchestrator::new(engine, LineEventEmitter::stdio(), options, cancel);
    let summary = orchestrator.run(&args.urls).await;
    ctrl_c.abort();

    tracing::info!(
        "done: {} downloaded, {} skipped, {} failed, {} cancelled, {} unresolved",
        summary.downloaded,
        summary.skipped,
        summary.failed,
        summary.cancelled,
        summary.unresolved
    );
    Ok(summary)
}

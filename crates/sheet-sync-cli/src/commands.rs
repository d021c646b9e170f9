//! Implementations of the command line subcommands.

use std::future::Future;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::broadcast::error::RecvError;

use sheet_sync::{
    DataFormatter, EndpointStatus, Grid, JobRegistry, JobSnapshot, MemoryStore, RealtimeDbStore,
    RecordStore, SheetsSender, SyncConfig, SyncEvent, SyncOrchestrator, SyncOutcome, SyncTarget,
};

use crate::output::Output;

/// The record store selected by flags and config: a JSON file when given,
/// otherwise the realtime database.
pub fn build_store(config: &SyncConfig, store_file: Option<&Path>) -> anyhow::Result<Arc<dyn RecordStore>> {
    if let Some(path) = store_file {
        return Ok(Arc::new(MemoryStore::from_file(path)?));
    }
    match config.database_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            tracing::debug!("reading records from {url}");
            Ok(Arc::new(RealtimeDbStore::new(url, config.auth_token.clone())))
        }
        _ => bail!("no record store configured (use --database-url, --store-file or SHEET_SYNC_DATABASE_URL)"),
    }
}

pub fn build_sender(config: &SyncConfig) -> anyhow::Result<SheetsSender> {
    Ok(SheetsSender::http(config.require_endpoint()?))
}

pub fn build_orchestrator(config: &SyncConfig, store_file: Option<&Path>) -> anyhow::Result<SyncOrchestrator> {
    Ok(SyncOrchestrator::new(
        build_store(config, store_file)?,
        build_sender(config)?,
    ))
}

/// Run one sync and print its outcome.
pub async fn sync(orchestrator: &SyncOrchestrator, target: &SyncTarget, out: Output) -> anyhow::Result<SyncOutcome> {
    let outcome = SyncOutcome::from(orchestrator.sync_once(target).await);
    out.print(&outcome)?;
    Ok(outcome)
}

/// Sync `target` every `interval` until `shutdown` resolves, printing each
/// attempt. Returns the final snapshot of the job.
pub async fn watch<F>(
    registry: &JobRegistry,
    target: SyncTarget,
    interval: Duration,
    out: Output,
    shutdown: F,
) -> anyhow::Result<Option<JobSnapshot>>
where
    F: Future<Output = ()>,
{
    let mut events = registry.events().subscribe();
    let handle = registry.start_recurring(target, interval)?;
    let job_id = handle.id().to_string();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) if event.job_id() == job_id => {
                    if out.is_json() {
                        out.print(&event)?;
                    } else {
                        println!("{}", describe_event(&event));
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("event stream lagged, {missed} event(s) dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(registry.stop(&handle))
}

/// One-line summary of a job event.
pub fn describe_event(event: &SyncEvent) -> String {
    match event {
        SyncEvent::JobStarted {
            path,
            sheet_id,
            interval_secs,
            ..
        } => format!("watching {path} -> {sheet_id} every {interval_secs}s"),
        SyncEvent::AttemptFinished {
            attempt,
            success: true,
            elapsed_ms,
            ..
        } => format!("attempt {attempt}: ok ({elapsed_ms}ms)"),
        SyncEvent::AttemptFinished { attempt, error, .. } => format!(
            "attempt {attempt}: failed: {}",
            error.as_deref().unwrap_or("unknown error")
        ),
        SyncEvent::AttemptSkipped { tick, .. } => {
            format!("tick {tick}: skipped, previous attempt still running")
        }
        SyncEvent::JobStopped { attempts, .. } => format!("stopped after {attempts} attempt(s)"),
    }
}

/// Read a record from `file`, or from stdin when no file is given.
pub fn read_input(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Parse a JSON record and format it.
pub fn format_record(text: &str) -> anyhow::Result<Grid> {
    let record: serde_json::Value = serde_json::from_str(text).context("record is not valid JSON")?;
    Ok(DataFormatter::format(&record))
}

/// Fetch the endpoint's liveness payload and print it.
pub async fn ping(sender: &SheetsSender, out: Output) -> anyhow::Result<EndpointStatus> {
    let status = sender.status().await?;
    out.print(&status)?;
    Ok(status)
}

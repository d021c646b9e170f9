//! Recurring sync jobs.
//!
//! Each job owns one timer task. Every tick spawns a separate attempt task,
//! so a slow store read or endpoint never delays the timer. Ticks are not
//! caught up: when the runtime falls behind, the next tick is simply delayed.
//!
//! Cancelling a job aborts its timer task and drops it from the registry.
//! An attempt already in flight runs to completion and still reports its
//! outcome on the event bus.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::events::{now_timestamp, EventBus, SyncEvent};
use crate::sync::SyncOrchestrator;
use crate::types::{SyncError, SyncOutcome, SyncResult, SyncTarget};

/// Period of a job configured in whole minutes.
pub fn interval_from_minutes(minutes: u64) -> Duration {
    Duration::from_millis(minutes.saturating_mul(60_000))
}

/// Unique identifier of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque handle returned by [`JobRegistry::start_recurring`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    id: JobId,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }
}

/// What to do when a tick fires while the previous attempt is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the tick.
    #[default]
    Skip,
    /// Start another attempt alongside the running one.
    Allow,
}

impl FromStr for OverlapPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OverlapPolicy::Skip),
            "allow" => Ok(OverlapPolicy::Allow),
            other => Err(SyncError::Config(format!(
                "unknown overlap policy '{other}' (expected skip or allow)"
            ))),
        }
    }
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverlapPolicy::Skip => "skip",
            OverlapPolicy::Allow => "allow",
        })
    }
}

/// Lifecycle of a job: `idle → running → scheduled → running → … → cancelled`.
///
/// Failed attempts do not change the state; the job keeps scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Running,
    Scheduled,
    Cancelled,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: String,
    pub target: SyncTarget,
    pub interval_secs: u64,
    pub policy: OverlapPolicy,
    pub state: JobState,
    pub created_at: String,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub skipped: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<SyncOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<String>,
}

#[derive(Default)]
struct JobStats {
    cancelled: AtomicBool,
    in_flight: AtomicU64,
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
    last: Mutex<Option<(SyncOutcome, DateTime<Utc>)>>,
}

impl JobStats {
    fn state(&self) -> JobState {
        if self.cancelled.load(Ordering::SeqCst) {
            JobState::Cancelled
        } else if self.in_flight.load(Ordering::SeqCst) > 0 {
            JobState::Running
        } else if self.attempts.load(Ordering::SeqCst) == 0 {
            JobState::Idle
        } else {
            JobState::Scheduled
        }
    }

    fn record(&self, outcome: SyncOutcome) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some((outcome, Utc::now()));
    }

    fn last(&self) -> Option<(SyncOutcome, DateTime<Utc>)> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Everything an attempt task needs.
struct JobContext {
    id: JobId,
    target: SyncTarget,
    policy: OverlapPolicy,
    orchestrator: SyncOrchestrator,
    events: EventBus,
    stats: JobStats,
}

struct JobEntry {
    ctx: Arc<JobContext>,
    interval: Duration,
    created_at: DateTime<Utc>,
    timer: JoinHandle<()>,
}

impl JobEntry {
    fn snapshot(&self) -> JobSnapshot {
        let stats = &self.ctx.stats;
        let last = stats.last();
        JobSnapshot {
            id: self.ctx.id.to_string(),
            target: self.ctx.target.clone(),
            interval_secs: self.interval.as_secs(),
            policy: self.ctx.policy,
            state: stats.state(),
            created_at: self.created_at.to_rfc3339(),
            attempts: stats.attempts.load(Ordering::SeqCst),
            successes: stats.successes.load(Ordering::SeqCst),
            failures: stats.failures.load(Ordering::SeqCst),
            skipped: stats.skipped.load(Ordering::SeqCst),
            last_run_at: last.as_ref().map(|(_, at)| at.to_rfc3339()),
            last_outcome: last.map(|(outcome, _)| outcome),
        }
    }
}

/// Registry of recurring sync jobs.
///
/// Jobs live in process memory only. Dropping the registry aborts every timer.
pub struct JobRegistry {
    orchestrator: SyncOrchestrator,
    policy: OverlapPolicy,
    events: EventBus,
    jobs: DashMap<JobId, JobEntry>,
}

impl JobRegistry {
    pub fn new(orchestrator: SyncOrchestrator) -> Self {
        Self {
            orchestrator,
            policy: OverlapPolicy::default(),
            events: EventBus::default(),
            jobs: DashMap::new(),
        }
    }

    /// Overlap policy for jobs started after this call.
    pub fn with_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Sync `target` now, then every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_recurring(&self, target: SyncTarget, interval: Duration) -> SyncResult<JobHandle> {
        if interval.is_zero() {
            return Err(SyncError::InvalidInterval);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Config(format!("no tokio runtime to schedule on: {e}")))?;

        let id = JobId::new();
        let ctx = Arc::new(JobContext {
            id,
            target,
            policy: self.policy,
            orchestrator: self.orchestrator.clone(),
            events: self.events.clone(),
            stats: JobStats::default(),
        });

        tracing::info!(
            "job {id}: syncing {} to sheet {} every {}s ({} overlap)",
            ctx.target.path,
            ctx.target.sheet_id,
            interval.as_secs(),
            ctx.policy
        );
        self.events.emit(SyncEvent::JobStarted {
            job_id: id.to_string(),
            path: ctx.target.path.clone(),
            sheet_id: ctx.target.sheet_id.clone(),
            interval_secs: interval.as_secs(),
            timestamp: now_timestamp(),
        });

        let timer = runtime.spawn(run_timer(ctx.clone(), interval));
        self.jobs.insert(
            id,
            JobEntry {
                ctx,
                interval,
                created_at: Utc::now(),
                timer,
            },
        );

        Ok(JobHandle { id })
    }

    /// Cancel a job and forget it. Returns false for an unknown or
    /// already-stopped handle.
    pub fn stop_recurring(&self, handle: &JobHandle) -> bool {
        self.stop(handle).is_some()
    }

    /// Cancel a job, remove it from the registry and return its final
    /// snapshot, in state [`JobState::Cancelled`].
    pub fn stop(&self, handle: &JobHandle) -> Option<JobSnapshot> {
        let (_, entry) = self.jobs.remove(&handle.id)?;
        entry.ctx.stats.cancelled.store(true, Ordering::SeqCst);
        entry.timer.abort();

        let attempts = entry.ctx.stats.attempts.load(Ordering::SeqCst);
        tracing::info!("job {}: stopped after {attempts} attempt(s)", handle.id);
        self.events.emit(SyncEvent::JobStopped {
            job_id: handle.id.to_string(),
            attempts,
        });
        Some(entry.snapshot())
    }

    /// Cancel every running job; returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let handles: Vec<JobHandle> = self
            .jobs
            .iter()
            .map(|entry| JobHandle { id: *entry.key() })
            .collect();
        handles.iter().filter(|h| self.stop_recurring(h)).count()
    }

    /// State of a live job; `None` once it has been stopped.
    pub fn state(&self, handle: &JobHandle) -> Option<JobState> {
        self.jobs.get(&handle.id).map(|entry| entry.ctx.stats.state())
    }

    pub fn snapshot(&self, handle: &JobHandle) -> Option<JobSnapshot> {
        self.jobs.get(&handle.id).map(|entry| entry.snapshot())
    }

    /// Snapshots of all live jobs, oldest first.
    pub fn list(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self.jobs.iter().map(|entry| entry.snapshot()).collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        jobs
    }

    pub fn active_count(&self) -> usize {
        self.jobs.len()
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        for entry in self.jobs.iter() {
            entry.timer.abort();
        }
    }
}

async fn run_timer(ctx: Arc<JobContext>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick: u64 = 0;

    loop {
        // The first tick completes immediately.
        ticker.tick().await;
        if ctx.stats.cancelled.load(Ordering::SeqCst) {
            break;
        }
        tick += 1;

        if ctx.policy == OverlapPolicy::Skip && ctx.stats.in_flight.load(Ordering::SeqCst) > 0 {
            ctx.stats.skipped.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("job {}: tick {tick} skipped, previous attempt still running", ctx.id);
            ctx.events.emit(SyncEvent::AttemptSkipped {
                job_id: ctx.id.to_string(),
                tick,
            });
            continue;
        }

        spawn_attempt(ctx.clone());
    }
}

fn spawn_attempt(ctx: Arc<JobContext>) {
    ctx.stats.in_flight.fetch_add(1, Ordering::SeqCst);
    let attempt = ctx.stats.attempts.fetch_add(1, Ordering::SeqCst) + 1;

    tokio::spawn(async move {
        let started = Instant::now();
        let result = ctx.orchestrator.sync_once(&ctx.target).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let error = match &result {
            Ok(_) => {
                ctx.stats.successes.fetch_add(1, Ordering::SeqCst);
                tracing::info!("job {}: attempt {attempt} succeeded in {elapsed_ms}ms", ctx.id);
                None
            }
            Err(e) => {
                ctx.stats.failures.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("job {}: attempt {attempt} failed: {e}", ctx.id);
                Some(e.outcome_message())
            }
        };
        ctx.stats.record(SyncOutcome::from_result(&result));
        ctx.stats.in_flight.fetch_sub(1, Ordering::SeqCst);

        ctx.events.emit(SyncEvent::AttemptFinished {
            job_id: ctx.id.to_string(),
            attempt,
            success: error.is_none(),
            error,
            elapsed_ms,
        });
    });
}

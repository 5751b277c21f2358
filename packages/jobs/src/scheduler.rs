//! Job Orchestrator: four named periodic sweeps with single-flight execution.
//!
//! Each job is wrapped by an in-process mutex (prevents overlap on this
//! node) and a leased advisory lock from [`crate::locks::LeaseManager`]
//! (prevents overlap across nodes). A run observes its [`CancelSignal`]
//! at least once a second; on cancellation the partial result is recorded
//! and `Cancelled` becomes the terminal status.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::locks::LeaseManager;
use crate::types::{JobName, JobState, JobStatus};

/// Cooperative cancellation signal checked by long-running sweeps.
#[derive(Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A single named periodic sweep's implementation.
#[async_trait]
pub trait Sweep: Send + Sync {
    async fn run(&self, cancel: &CancelSignal) -> anyhow::Result<()>;
}

struct RegisteredJob {
    sweep: Arc<dyn Sweep>,
    guard: Arc<Mutex<()>>,
}

/// Drives the four named sweeps: `accessAuditor`, `liquidityAnalyzer`,
/// `velocityCalculator`, `cachePruner`.
pub struct JobOrchestrator {
    node_id: String,
    states: Arc<RwLock<HashMap<JobName, JobState>>>,
    leases: LeaseManager,
    jobs: RwLock<HashMap<JobName, RegisteredJob>>,
    cancel_signals: Arc<RwLock<HashMap<JobName, CancelSignal>>>,
}

impl JobOrchestrator {
    pub fn new(node_id: impl Into<String>) -> Self {
        let mut states = HashMap::new();
        for name in JobName::all() {
            states.insert(name, JobState::new(name));
        }
        Self {
            node_id: node_id.into(),
            states: Arc::new(RwLock::new(states)),
            leases: LeaseManager::new(),
            jobs: RwLock::new(HashMap::new()),
            cancel_signals: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, job_name: JobName, sweep: Arc<dyn Sweep>) {
        self.jobs.write().await.insert(
            job_name,
            RegisteredJob {
                sweep,
                guard: Arc::new(Mutex::new(())),
            },
        );
    }

    pub async fn state(&self, job_name: JobName) -> JobState {
        self.states
            .read()
            .await
            .get(&job_name)
            .cloned()
            .unwrap_or_else(|| JobState::new(job_name))
    }

    pub async fn pause(&self, job_name: JobName) {
        if let Some(state) = self.states.write().await.get_mut(&job_name) {
            state.paused = true;
        }
    }

    pub async fn resume(&self, job_name: JobName) {
        if let Some(state) = self.states.write().await.get_mut(&job_name) {
            state.paused = false;
        }
    }

    /// Cancel the in-flight run of `job_name`, if any. Idempotent.
    pub async fn cancel(&self, job_name: JobName) {
        if let Some(signal) = self.cancel_signals.read().await.get(&job_name) {
            signal.cancel();
        }
    }

    /// Manually trigger a job. Returns immediately (the spec's "202
    /// accepted"): the run proceeds on a spawned task.
    pub fn trigger(self: &Arc<Self>, job_name: JobName) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run_once(job_name).await;
        });
    }

    /// Execute one tick for `job_name`: skipped if paused, skipped (without
    /// state mutation) if already running locally or leased elsewhere.
    pub async fn run_once(&self, job_name: JobName) {
        let Some(guard) = self.jobs.read().await.get(&job_name).map(|j| j.guard.clone()) else {
            tracing::warn!(job = %job_name, "no sweep registered for job");
            return;
        };

        let Ok(_permit) = guard.try_lock() else {
            tracing::debug!(job = %job_name, "skipping tick, already running on this node");
            return;
        };

        {
            let states = self.states.read().await;
            if states.get(&job_name).map(|s| s.paused).unwrap_or(false) {
                return;
            }
        }

        let lease = match self
            .leases
            .acquire(job_name, &self.node_id, job_name.period() * 2)
            .await
        {
            Ok(lease) => lease,
            Err(err) => {
                tracing::debug!(job = %job_name, error = %err, "skipping tick, lease held elsewhere");
                return;
            }
        };

        let sweep = {
            let jobs = self.jobs.read().await;
            jobs.get(&job_name).map(|j| j.sweep.clone())
        };
        let Some(sweep) = sweep else { return };

        let signal = CancelSignal::new();
        self.cancel_signals
            .write()
            .await
            .insert(job_name, signal.clone());

        {
            let mut states = self.states.write().await;
            let state = states.entry(job_name).or_insert_with(|| JobState::new(job_name));
            state.attempt_count += 1;
            state.last_run_at = Some(Utc::now());
            state.last_status = JobStatus::Running;
        }

        tracing::info!(job = %job_name, node = %self.node_id, "sweep started");
        let result = sweep.run(&signal).await;

        let final_status = if signal.is_cancelled() {
            JobStatus::Cancelled
        } else {
            match result {
                Ok(()) => JobStatus::Success,
                Err(err) => JobStatus::Failure {
                    error: err.to_string(),
                },
            }
        };

        match &final_status {
            JobStatus::Success => tracing::info!(job = %job_name, "sweep completed"),
            JobStatus::Cancelled => tracing::warn!(job = %job_name, "sweep cancelled"),
            JobStatus::Failure { error } => tracing::error!(job = %job_name, error, "sweep failed"),
            JobStatus::Running | JobStatus::Pending => unreachable!(),
        }

        if let Some(state) = self.states.write().await.get_mut(&job_name) {
            state.last_status = final_status;
        }

        self.cancel_signals.write().await.remove(&job_name);
        let _ = self.leases.release(job_name, &self.node_id).await;
    }

    /// Run one tick for every registered job, concurrently.
    pub async fn tick_all(self: &Arc<Self>) {
        let names: Vec<JobName> = self.jobs.read().await.keys().copied().collect();
        let handles: Vec<_> = names
            .into_iter()
            .map(|name| {
                let orchestrator = Arc::clone(self);
                tokio::spawn(async move { orchestrator.run_once(name).await })
            })
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

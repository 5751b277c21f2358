//! Job Orchestrator: core types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four named periodic sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobName {
    AccessAuditor,
    LiquidityAnalyzer,
    VelocityCalculator,
    CachePruner,
}

impl JobName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessAuditor => "accessAuditor",
            Self::LiquidityAnalyzer => "liquidityAnalyzer",
            Self::VelocityCalculator => "velocityCalculator",
            Self::CachePruner => "cachePruner",
        }
    }

    /// Expected steady-state period, used to size lease TTLs (lease >= 2x period).
    pub fn period(&self) -> chrono::Duration {
        match self {
            Self::AccessAuditor => chrono::Duration::hours(24),
            Self::LiquidityAnalyzer => chrono::Duration::hours(24),
            Self::VelocityCalculator => chrono::Duration::minutes(10),
            Self::CachePruner => chrono::Duration::minutes(10),
        }
    }

    pub fn all() -> [JobName; 4] {
        [
            Self::AccessAuditor,
            Self::LiquidityAnalyzer,
            Self::VelocityCalculator,
            Self::CachePruner,
        ]
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the most recent run of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Never run yet.
    Pending,
    Running,
    Success,
    Failure { error: String },
    /// Terminal status for a run that observed a cancellation signal.
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Persisted state for one job: `{jobName, lastRunAt, lastStatus, paused, attemptCount}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub job_name: JobName,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_status: JobStatus,
    pub paused: bool,
    pub attempt_count: u64,
}

impl JobState {
    pub fn new(job_name: JobName) -> Self {
        Self {
            job_name,
            last_run_at: None,
            last_status: JobStatus::Pending,
            paused: false,
            attempt_count: 0,
        }
    }
}

/// A leased advisory lock granting one process exclusive right to run a job.
///
/// Lease duration must be at least 2x the job's expected runtime; expiry
/// allows any other holder to take over without an explicit release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLease {
    pub id: Uuid,
    pub job_name: JobName,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl JobLease {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn remaining(&self) -> chrono::Duration {
        self.expires_at - Utc::now()
    }
}
